//! Site settings

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;

use crate::db::repos::SettingsRepo;
use crate::http::error::ApiError;
use crate::http::extractors::AdminUser;
use crate::http::server::AppState;
use crate::models::{SettingKey, SiteSettings};

/// Parse and check a settings payload; unknown keys are rejected.
pub fn parse_settings(body: HashMap<String, Value>) -> Result<Vec<(SettingKey, Value)>, ApiError> {
    let mut values = Vec::with_capacity(body.len());
    for (key, value) in body {
        let key = SettingKey::parse(&key)?;
        key.validate(&value)?;
        values.push((key, value));
    }
    values.sort_by_key(|(key, _)| key.as_str());
    Ok(values)
}

/// GET /admin/settings
async fn get_settings(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<SiteSettings>, ApiError> {
    Ok(Json(SettingsRepo::new(&state.pool).site().await?))
}

/// PUT /admin/settings
async fn put_settings(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<HashMap<String, Value>>,
) -> Result<Json<SiteSettings>, ApiError> {
    let values = parse_settings(body)?;
    let repo = SettingsRepo::new(&state.pool);
    repo.set_many(&values).await?;
    tracing::info!(admin = %admin.id, count = values.len(), "settings updated");
    Ok(Json(repo.site().await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}
