//! GitHub webhook receiver

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use ideabox_github::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::services::integrations::WEBHOOK_PATH;
use crate::services::webhook::Delivery;
use crate::services::{WebhookOutcome, WebhookService};

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /api/webhooks/github
async fn github(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let delivery = Delivery {
        event: header(&headers, EVENT_HEADER),
        signature: header(&headers, SIGNATURE_HEADER),
        delivery_id: header(&headers, DELIVERY_HEADER),
        body: &body,
    };

    let outcome = WebhookService::new(&state.pool, &state.jobs)
        .handle(delivery)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "webhook rejected"))?;
    Ok(Json(outcome))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(WEBHOOK_PATH, post(github))
}
