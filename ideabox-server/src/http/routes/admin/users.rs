//! User administration

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams, Role};

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// GET /admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<User>>, ApiError> {
    Ok(Json(UserRepo::new(&state.pool).list(Pagination::from(params)).await?))
}

/// PUT /admin/users/{id}/role
async fn set_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    let role = Role::parse(&req.role)?;
    if id == admin.id && !role.is_admin() {
        return Err(ApiError::conflict("admins cannot demote themselves"));
    }
    let user = UserRepo::new(&state.pool).set_role(id, role).await?;
    tracing::info!(user = %user.id, role = role.as_str(), admin = %admin.id, "role changed");
    Ok(Json(user))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/role", put(set_role))
}
