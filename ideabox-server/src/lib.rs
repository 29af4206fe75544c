//! ideabox-server: feedback boards over HTTP
//!
//! Layers, bottom-up:
//! - `models`: validated domain newtypes
//! - `db`: pool, migrations and repositories (counter upkeep lives here)
//! - `services`: post merging, GitHub integrations, webhook sync
//! - `jobs`: notification queue with retries
//! - `http`: axum routes, extractors and JSON errors

pub mod db;
pub mod http;
pub mod jobs;
pub mod models;
pub mod seo;
pub mod services;

pub use db::{create_pool, create_pool_with_options};
pub use http::{build_router, run_server, AppState, ServerConfig};
