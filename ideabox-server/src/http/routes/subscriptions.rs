//! Post subscriptions

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::posts::load_post;
use crate::db::repos::SubscriptionRepo;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SubscriptionResponse {
    pub subscribed: bool,
    /// False when the request didn't change anything
    pub changed: bool,
}

/// POST /b/{board}/p/{post}/subscription
async fn subscribe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((board_slug, post_slug)): Path<(String, String)>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let (_, post) = load_post(&state, &board_slug, &post_slug).await?;
    let changed = SubscriptionRepo::new(&state.pool).subscribe(post.id, user.id).await?;
    Ok(Json(SubscriptionResponse {
        subscribed: true,
        changed,
    }))
}

/// DELETE /b/{board}/p/{post}/subscription
async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((board_slug, post_slug)): Path<(String, String)>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let (_, post) = load_post(&state, &board_slug, &post_slug).await?;
    let changed = SubscriptionRepo::new(&state.pool).unsubscribe(post.id, user.id).await?;
    Ok(Json(SubscriptionResponse {
        subscribed: false,
        changed,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/b/{board}/p/{post}/subscription",
        post(subscribe).delete(unsubscribe),
    )
}
