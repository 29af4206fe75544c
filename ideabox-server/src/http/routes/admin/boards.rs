//! Board administration

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{Board, BoardChanges, BoardRepo, BoardWithCount, NewBoard};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::{BoardName, BoardSlug, Paginated, Pagination, PaginationParams};

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
    /// Derived from `name` when absent
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_allow_posts")]
    pub allow_posts: bool,
}

fn default_allow_posts() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateBoardRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub allow_posts: Option<bool>,
}

impl TryFrom<CreateBoardRequest> for NewBoard {
    type Error = ApiError;

    fn try_from(req: CreateBoardRequest) -> Result<Self, Self::Error> {
        let name = BoardName::new(&req.name)?;
        let slug = match req.slug.as_deref() {
            Some(slug) => BoardSlug::new(slug)?,
            None => BoardSlug::from_name(&name)?,
        };
        Ok(Self {
            name,
            slug,
            description: req.description.trim().to_string(),
            allow_posts: req.allow_posts,
        })
    }
}

impl TryFrom<UpdateBoardRequest> for BoardChanges {
    type Error = ApiError;

    fn try_from(req: UpdateBoardRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            name: req.name.as_deref().map(BoardName::new).transpose()?,
            slug: req.slug.as_deref().map(BoardSlug::new).transpose()?,
            description: req.description.map(|d| d.trim().to_string()),
            allow_posts: req.allow_posts,
        })
    }
}

/// GET /admin/boards
async fn list_boards(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<BoardWithCount>>, ApiError> {
    Ok(Json(BoardRepo::new(&state.pool).list(Pagination::from(params)).await?))
}

/// POST /admin/boards
async fn create_board(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<Board>), ApiError> {
    let board = BoardRepo::new(&state.pool).create(req.try_into()?).await?;
    tracing::info!(board = %board.slug, admin = %admin.id, "board created");
    Ok((StatusCode::CREATED, Json(board)))
}

/// PATCH /admin/boards/{id}
async fn update_board(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<UpdateBoardRequest>,
) -> Result<Json<Board>, ApiError> {
    Ok(Json(BoardRepo::new(&state.pool).update(id, req.try_into()?).await?))
}

/// DELETE /admin/boards/{id}
async fn delete_board(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    BoardRepo::new(&state.pool).delete(id).await?;
    tracing::info!(board = %id, admin = %admin.id, "board deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route("/boards/{id}", patch(update_board).delete(delete_board))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::db::testing;
    use crate::http::routes::testing::{app, db_state, request, send};
    use crate::models::Role;

    #[test]
    fn slug_derives_from_name() {
        let req = CreateBoardRequest {
            name: "Feature Requests".into(),
            slug: None,
            description: "  ideas  ".into(),
            allow_posts: true,
        };
        let board = NewBoard::try_from(req).unwrap();
        assert_eq!(board.slug.as_str(), "feature-requests");
        assert_eq!(board.description, "ideas");
    }

    #[test]
    fn bad_slug_is_rejected() {
        let req = UpdateBoardRequest {
            name: None,
            slug: Some("Not A Slug".into()),
            description: None,
            allow_posts: None,
        };
        assert!(BoardChanges::try_from(req).is_err());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn create_update_delete() {
        let state = db_state().await;
        let (_, token) = testing::user_with_role(&state.pool, Role::Admin).await;
        let slug = format!("admin-board-{}", uuid::Uuid::new_v4().simple());

        let (status, board) = send(
            app(state.clone()),
            request("POST", "/admin/boards", Some(&token), Some(json!({"name": "Admin board", "slug": slug}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = board["id"].as_str().unwrap().to_string();

        let (status, updated) = send(
            app(state.clone()),
            request("PATCH", &format!("/admin/boards/{id}"), Some(&token), Some(json!({"allow_posts": false}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["allow_posts"], false);
        assert_eq!(updated["name"], "Admin board");

        let (status, _) = send(
            app(state.clone()),
            request("POST", "/admin/boards", Some(&token), Some(json!({"name": "Dup", "slug": slug}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(app(state), request("DELETE", &format!("/admin/boards/{id}"), Some(&token), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
