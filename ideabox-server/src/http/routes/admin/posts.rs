//! Post moderation: status changes, deletion, merging

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{Post, PostRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminUser, ValidUuid};
use crate::http::server::AppState;
use crate::jobs::Job;
use crate::services::{MergeOutcome, MergePostService, UnmergeOutcome};

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status_id: Uuid,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub post: Post,
    pub changed: bool,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub target_id: Uuid,
}

/// PUT /admin/posts/{id}/status
async fn set_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let repo = PostRepo::new(&state.pool);
    match repo.set_status(id, req.status_id, admin.id).await? {
        Some(change) => {
            state.jobs.enqueue(Job::StatusChanged {
                post_id: change.post.id,
                status_id: req.status_id,
            });
            tracing::info!(post = %id, status = %req.status_id, admin = %admin.id, "post status changed");
            Ok(Json(StatusResponse {
                post: change.post,
                changed: true,
            }))
        }
        None => Ok(Json(StatusResponse {
            post: repo.get(id).await?,
            changed: false,
        })),
    }
}

/// DELETE /admin/posts/{id}
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    PostRepo::new(&state.pool).delete(id).await?;
    tracing::info!(post = %id, admin = %admin.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/posts/{id}/merge
async fn merge(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidUuid(source_id): ValidUuid,
    Json(req): Json<MergeRequest>,
) -> Result<Json<MergeOutcome>, ApiError> {
    let outcome = MergePostService::new(&state.pool)
        .merge(source_id, req.target_id, admin.id)
        .await?;
    Ok(Json(outcome))
}

/// POST /admin/posts/{id}/unmerge
async fn unmerge(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(source_id): ValidUuid,
) -> Result<Json<UnmergeOutcome>, ApiError> {
    let outcome = MergePostService::new(&state.pool).unmerge(source_id).await?;
    Ok(Json(outcome))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts/{id}", delete(delete_post))
        .route("/posts/{id}/status", put(set_status))
        .route("/posts/{id}/merge", post(merge))
        .route("/posts/{id}/unmerge", post(unmerge))
}
