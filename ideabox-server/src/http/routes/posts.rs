//! Post creation and the post page

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{
    Board, BoardRepo, CommentRepo, CommentView, IntegrationRepo, LinkedIssue, NewPost, Post,
    PostRepo, SettingsRepo, Status, StatusRepo, SubscriptionRepo, UserRepo, VoteRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, MaybeUser};
use crate::http::server::AppState;
use crate::jobs::notifications::post_url;
use crate::models::{build_tree, CommentNode, PostBody, PostTitle};
use crate::seo::{meta_tags, MetaTag, PageSubject};

/// Resolve `/b/{board}/p/{post}` to its rows.
pub(crate) async fn load_post(
    state: &AppState,
    board_slug: &str,
    post_slug: &str,
) -> Result<(Board, Post), ApiError> {
    let board = BoardRepo::new(&state.pool).get_by_slug(board_slug).await?;
    let post = PostRepo::new(&state.pool).get_by_slug(board.id, post_slug).await?;
    Ok((board, post))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Where a merged post now lives
#[derive(Serialize)]
pub struct MergedInto {
    pub id: Uuid,
    pub title: String,
    pub board_slug: String,
    pub slug: String,
}

#[derive(Serialize)]
pub struct PostPage {
    pub board: Board,
    pub post: Post,
    pub author_name: Option<String>,
    pub status: Option<Status>,
    pub comments: Vec<CommentNode<CommentView>>,
    pub links: Vec<LinkedIssue>,
    pub merged_into: Option<MergedInto>,
    pub voted: bool,
    pub subscribed: bool,
    pub meta: Vec<MetaTag>,
}

/// POST /b/{board}/posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(board_slug): Path<String>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let title = PostTitle::new(&req.title)?;
    let body = PostBody::new(&req.body)?;

    let board = BoardRepo::new(&state.pool).get_by_slug(&board_slug).await?;
    if !board.allow_posts {
        return Err(ApiError::forbidden("this board does not accept new posts"));
    }

    let post = PostRepo::new(&state.pool)
        .create(NewPost {
            board_id: board.id,
            user_id: user.id,
            title,
            body,
        })
        .await?;
    tracing::info!(post = %post.id, board = %board.slug, user = %user.id, "post created");

    Ok((StatusCode::CREATED, Json(post)))
}

async fn merged_into(state: &AppState, post: &Post) -> Result<Option<MergedInto>, ApiError> {
    let Some(target_id) = post.merged_into_post_id else {
        return Ok(None);
    };
    let target = PostRepo::new(&state.pool).get(target_id).await?;
    let board = BoardRepo::new(&state.pool).get(target.board_id).await?;
    Ok(Some(MergedInto {
        id: target.id,
        title: target.title,
        board_slug: board.slug,
        slug: target.slug,
    }))
}

/// GET /b/{board}/p/{post}
async fn show_post(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path((board_slug, post_slug)): Path<(String, String)>,
) -> Result<Json<PostPage>, ApiError> {
    let (board, post) = load_post(&state, &board_slug, &post_slug).await?;

    let author_name = match post.user_id {
        Some(id) => Some(UserRepo::new(&state.pool).get(id).await?.name),
        None => None,
    };
    let status = match post.status_id {
        Some(id) => Some(StatusRepo::new(&state.pool).get(id).await?),
        None => None,
    };
    let comments = build_tree(CommentRepo::new(&state.pool).list_for_post(post.id).await?);
    let links = IntegrationRepo::new(&state.pool).links_for_post(post.id).await?;
    let merged_into = merged_into(&state, &post).await?;

    let (voted, subscribed) = match &viewer {
        Some(user) => (
            VoteRepo::new(&state.pool).has_voted(post.id, user.id).await?,
            SubscriptionRepo::new(&state.pool).is_subscribed(post.id, user.id).await?,
        ),
        None => (false, false),
    };

    let settings = SettingsRepo::new(&state.pool).site().await?;
    let canonical = post_url(&state.public_url, &board.slug, &post.slug);
    let meta = meta_tags(
        &settings,
        Some(PageSubject {
            title: &post.title,
            body: &post.body,
        }),
        &canonical,
    );

    Ok(Json(PostPage {
        board,
        post,
        author_name,
        status,
        comments,
        links,
        merged_into,
        voted,
        subscribed,
        meta,
    }))
}

/// Post routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/b/{board}/posts", post(create_post))
        .route("/b/{board}/p/{post}", get(show_post))
}
