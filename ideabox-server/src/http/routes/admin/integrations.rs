//! Issue tracker integrations: providers, OAuth, repositories, issue links

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use ideabox_github::{Issue, Repository};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{
    BoardRepo, IntegrationRepo, IssueLink, NewProvider, PostRepo, Provider, TrackedRepository,
};
use crate::http::error::ApiError;
use crate::http::extractors::{AdminUser, ValidUuid};
use crate::http::server::AppState;
use crate::jobs::notifications::post_url;
use crate::models::RepositoryName;
use crate::services::IntegrationService;

fn service(state: &AppState) -> IntegrationService<'_> {
    IntegrationService::new(&state.pool, &state.integrations, &state.public_url)
}

#[derive(Serialize)]
pub struct ProviderList {
    pub kinds: Vec<&'static str>,
    pub providers: Vec<ProviderView>,
}

#[derive(Serialize)]
pub struct ProviderView {
    #[serde(flatten)]
    pub provider: Provider,
    pub connected: bool,
    pub repositories: Vec<TrackedRepository>,
}

#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub kind: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auto_close_status_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct AutoCloseRequest {
    pub status_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ConnectResponse {
    pub authorize_url: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Deserialize)]
pub struct AddRepositoryRequest {
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct LinkRequest {
    pub repository_id: Uuid,
    pub issue_number: i64,
}

#[derive(Deserialize)]
pub struct CreateIssueRequest {
    pub repository_id: Uuid,
}

fn required(value: &str, field: &'static str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(crate::models::ValidationError::Empty { field }.into());
    }
    Ok(value.to_string())
}

/// GET /admin/integrations
async fn list_providers(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<ProviderList>, ApiError> {
    let repo = IntegrationRepo::new(&state.pool);
    let mut providers = Vec::new();
    for provider in repo.list_providers().await? {
        let repositories = repo.list_repositories(provider.id).await?;
        providers.push(ProviderView {
            connected: provider.is_connected(),
            provider,
            repositories,
        });
    }
    Ok(Json(ProviderList {
        kinds: state.integrations.kinds(),
        providers,
    }))
}

/// POST /admin/integrations
async fn create_provider(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<Provider>), ApiError> {
    let new = NewProvider {
        kind: req.kind.trim().to_lowercase(),
        name: required(&req.name, "name")?,
        client_id: required(&req.client_id, "client_id")?,
        client_secret: required(&req.client_secret, "client_secret")?,
        auto_close_status_id: req.auto_close_status_id,
    };
    let provider = service(&state).create_provider(new).await?;
    tracing::info!(provider = %provider.id, kind = %provider.kind, admin = %admin.id, "integration provider created");
    Ok((StatusCode::CREATED, Json(provider)))
}

/// DELETE /admin/integrations/{id}
async fn delete_provider(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    let provider = IntegrationRepo::new(&state.pool).get_provider(id).await?;
    if provider.is_connected() {
        service(&state).disconnect(id).await?;
    }
    IntegrationRepo::new(&state.pool).delete_provider(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/integrations/{id}/auto-close
async fn set_auto_close(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<AutoCloseRequest>,
) -> Result<Json<Provider>, ApiError> {
    let provider = IntegrationRepo::new(&state.pool)
        .set_auto_close_status(id, req.status_id)
        .await?;
    Ok(Json(provider))
}

/// POST /admin/integrations/{id}/connect
async fn connect(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ConnectResponse>, ApiError> {
    let authorize_url = service(&state).connect(id).await?;
    Ok(Json(ConnectResponse { authorize_url }))
}

/// GET /admin/integrations/{kind}/callback
///
/// Reached by the provider's browser redirect, so there is no bearer token;
/// the OAuth state identifies the provider.
async fn callback(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<Provider>, ApiError> {
    state.integrations.get(&kind)?;
    if let Some(error) = query.error {
        tracing::warn!(kind = %kind, error = %error, "OAuth authorization denied");
        return Err(ApiError::bad_request(format!("authorization failed: {error}")));
    }
    if query.code.is_empty() {
        return Err(ApiError::bad_request("missing OAuth code"));
    }
    let provider = service(&state)
        .callback(&kind, &query.state, &query.code)
        .await?;
    Ok(Json(provider))
}

/// POST /admin/integrations/{id}/disconnect
async fn disconnect(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Provider>, ApiError> {
    let provider = service(&state).disconnect(id).await?;
    tracing::info!(provider = %id, admin = %admin.id, "integration disconnected by admin");
    Ok(Json(provider))
}

/// GET /admin/integrations/{id}/repositories
async fn tracked_repositories(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Vec<TrackedRepository>>, ApiError> {
    let repo = IntegrationRepo::new(&state.pool);
    let provider = repo.get_provider(id).await?;
    Ok(Json(repo.list_repositories(provider.id).await?))
}

/// GET /admin/integrations/{id}/repositories/available
async fn available_repositories(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let repositories = service(&state)
        .available_repositories(id, query.page.unwrap_or(1))
        .await?;
    Ok(Json(repositories))
}

/// POST /admin/integrations/{id}/repositories
async fn add_repository(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<AddRepositoryRequest>,
) -> Result<(StatusCode, Json<TrackedRepository>), ApiError> {
    let full_name = RepositoryName::new(&req.full_name)?;
    let repository = service(&state).add_repository(id, full_name).await?;
    Ok((StatusCode::CREATED, Json(repository)))
}

/// DELETE /admin/repositories/{id}
async fn remove_repository(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    service(&state).remove_repository(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/repositories/{id}/issues?q=
async fn search_issues(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    Ok(Json(service(&state).search_issues(id, query.q.trim()).await?))
}

/// POST /admin/posts/{id}/links
async fn link_issue(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(post_id): ValidUuid,
    Json(req): Json<LinkRequest>,
) -> Result<(StatusCode, Json<IssueLink>), ApiError> {
    if req.issue_number < 1 {
        return Err(ApiError::bad_request("issue_number must be positive"));
    }
    let link = service(&state)
        .link_issue(post_id, req.repository_id, req.issue_number)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// POST /admin/posts/{id}/issues
async fn create_issue(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(post_id): ValidUuid,
    Json(req): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<IssueLink>), ApiError> {
    let post = PostRepo::new(&state.pool).get(post_id).await?;
    let board = BoardRepo::new(&state.pool).get(post.board_id).await?;
    let url = post_url(&state.public_url, &board.slug, &post.slug);

    let link = service(&state)
        .create_issue_for_post(post.id, req.repository_id, &url)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /admin/links/{id}
async fn unlink(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    service(&state).unlink(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/integrations", get(list_providers).post(create_provider))
        .route("/integrations/{id}", delete(delete_provider))
        .route("/integrations/{id}/auto-close", put(set_auto_close))
        .route("/integrations/{id}/connect", post(connect))
        .route("/integrations/{id}/callback", get(callback))
        .route("/integrations/{id}/disconnect", post(disconnect))
        .route(
            "/integrations/{id}/repositories",
            get(tracked_repositories).post(add_repository),
        )
        .route(
            "/integrations/{id}/repositories/available",
            get(available_repositories),
        )
        .route("/repositories/{id}", delete(remove_repository))
        .route("/repositories/{id}/issues", get(search_issues))
        .route("/posts/{id}/links", post(link_issue))
        .route("/posts/{id}/issues", post(create_issue))
        .route("/links/{id}", delete(unlink))
}
