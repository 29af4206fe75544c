//! Public board endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::repos::{Board, BoardRepo, BoardWithCount, PostFilter, PostRepo, PostSummary, SettingsRepo};
use crate::http::error::ApiError;
use crate::http::extractors::parse_uuid;
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams, PostSort};
use crate::seo::{meta_tags, MetaTag};

/// Query string of a board page
#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl BoardQuery {
    fn pagination(&self) -> Pagination {
        Pagination::from(PaginationParams {
            page: self.page,
            per_page: self.per_page,
        })
    }

    fn filter(&self) -> Result<PostFilter, ApiError> {
        let sort = match self.sort.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => PostSort::parse(s)?,
            None => PostSort::default(),
        };
        let status_id = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_uuid(s, "status")?),
            None => None,
        };
        Ok(PostFilter {
            sort,
            search: self.search.clone(),
            status_id,
        })
    }
}

#[derive(Serialize)]
pub struct BoardPage {
    pub board: Board,
    pub posts: Paginated<PostSummary>,
    pub meta: Vec<MetaTag>,
}

/// GET /boards - list all boards with pagination
async fn list_boards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<BoardWithCount>>, ApiError> {
    let page = Pagination::from(params);
    Ok(Json(BoardRepo::new(&state.pool).list(page).await?))
}

/// GET /b/{board} - a board and its posts
async fn show_board(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardPage>, ApiError> {
    let filter = query.filter()?;
    let board = BoardRepo::new(&state.pool).get_by_slug(&slug).await?;
    let posts = PostRepo::new(&state.pool)
        .list_for_board(board.id, &filter, query.pagination())
        .await?;

    let settings = SettingsRepo::new(&state.pool).site().await?;
    let meta = meta_tags(&settings, None, &format!("{}/b/{}", state.public_url, board.slug));

    Ok(Json(BoardPage { board, posts, meta }))
}

/// Board routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/boards", get(list_boards))
        .route("/b/{board}", get(show_board))
}
