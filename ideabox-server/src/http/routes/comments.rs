//! Comment creation

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::posts::load_post;
use crate::db::repos::{Comment, CommentRepo};
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::jobs::Job;
use crate::models::CommentBody;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
    pub parent_id: Option<Uuid>,
}

/// POST /b/{board}/p/{post}/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((board_slug, post_slug)): Path<(String, String)>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let body = CommentBody::new(&req.body)?;
    let (_, post) = load_post(&state, &board_slug, &post_slug).await?;

    let comment = CommentRepo::new(&state.pool)
        .create(post.id, user.id, req.parent_id, body)
        .await?;
    state.jobs.enqueue(Job::CommentAdded {
        comment_id: comment.id,
    });
    tracing::info!(post = %post.id, comment = %comment.id, user = %user.id, "comment added");

    Ok((StatusCode::CREATED, Json(comment)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/b/{board}/p/{post}/comments", post(create_comment))
}
