//! Admin endpoints, mounted under `/admin`
//!
//! Every handler takes an [`AdminUser`](crate::http::extractors::AdminUser).

use std::sync::Arc;

use axum::Router;

use crate::http::server::AppState;

pub mod boards;
pub mod integrations;
pub mod posts;
pub mod settings;
pub mod statuses;
pub mod users;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(boards::router())
        .merge(statuses::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(settings::router())
        .merge(integrations::router())
}
