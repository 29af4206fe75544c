//! Status administration

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{NewStatus, Status, StatusRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::{HexColor, StatusName};

#[derive(Deserialize)]
pub struct StatusRequest {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub in_roadmap: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl TryFrom<StatusRequest> for NewStatus {
    type Error = ApiError;

    fn try_from(req: StatusRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            name: StatusName::new(&req.name)?,
            color: HexColor::new(&req.color)?,
            in_roadmap: req.in_roadmap,
            is_default: req.is_default,
            sort_order: req.sort_order,
        })
    }
}

/// GET /admin/statuses
async fn list_statuses(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Status>>, ApiError> {
    Ok(Json(StatusRepo::new(&state.pool).list().await?))
}

/// POST /admin/statuses
async fn create_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Json(req): Json<StatusRequest>,
) -> Result<(StatusCode, Json<Status>), ApiError> {
    let status = StatusRepo::new(&state.pool).create(req.try_into()?).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// PUT /admin/statuses/{id}
async fn update_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Status>, ApiError> {
    Ok(Json(StatusRepo::new(&state.pool).update(id, req.try_into()?).await?))
}

/// DELETE /admin/statuses/{id}
async fn delete_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    StatusRepo::new(&state.pool).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/statuses", get(list_statuses).post(create_status))
        .route("/statuses/{id}", put(update_status).delete(delete_status))
}
