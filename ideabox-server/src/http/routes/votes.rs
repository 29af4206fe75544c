//! Vote toggling

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use super::posts::load_post;
use crate::db::repos::{VoteRepo, VoteToggle};
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;

/// POST /b/{board}/p/{post}/vote
async fn toggle_vote(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((board_slug, post_slug)): Path<(String, String)>,
) -> Result<Json<VoteToggle>, ApiError> {
    let (_, post) = load_post(&state, &board_slug, &post_slug).await?;
    let toggle = VoteRepo::new(&state.pool).toggle(post.id, user.id).await?;
    tracing::debug!(post = %post.id, user = %user.id, voted = toggle.voted, "vote toggled");
    Ok(Json(toggle))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/b/{board}/p/{post}/vote", post(toggle_vote))
}
