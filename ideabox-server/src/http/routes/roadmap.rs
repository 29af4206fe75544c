//! Public roadmap

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::repos::{PostRepo, PostSummary, Status, StatusRepo};
use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct RoadmapColumn {
    pub status: Status,
    pub posts: Vec<PostSummary>,
}

/// Put each post under its status, keeping status order.
pub fn group_by_status(statuses: Vec<Status>, posts: Vec<PostSummary>) -> Vec<RoadmapColumn> {
    let mut columns: Vec<RoadmapColumn> = statuses
        .into_iter()
        .map(|status| RoadmapColumn {
            status,
            posts: Vec::new(),
        })
        .collect();

    for post in posts {
        if let Some(column) = columns
            .iter_mut()
            .find(|c| Some(c.status.id) == post.post.status_id)
        {
            column.posts.push(post);
        }
    }
    columns
}

/// GET /roadmap
async fn roadmap(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RoadmapColumn>>, ApiError> {
    let statuses = StatusRepo::new(&state.pool).roadmap().await?;
    let posts = PostRepo::new(&state.pool).roadmap().await?;
    Ok(Json(group_by_status(statuses, posts)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/roadmap", get(roadmap))
}
