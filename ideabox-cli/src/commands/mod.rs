//! Command implementations for the ideabox CLI

use std::path::Path;

use anyhow::{Context, Result};
use ideabox_core::IdeaboxConfig;
use ideabox_server::create_pool_with_options;
use sqlx::PgPool;

pub mod migrate;
pub mod serve;
pub mod user;

pub use migrate::run_migrate;
pub use serve::run_serve;
pub use user::run_user;

/// Load configuration; command flags are applied on top by the caller.
pub(crate) fn load_config(path: Option<&Path>) -> Result<IdeaboxConfig> {
    IdeaboxConfig::load(path).context("Failed to load configuration")
}

pub(crate) async fn connect(config: &IdeaboxConfig) -> Result<PgPool> {
    create_pool_with_options(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to create database pool. Is DATABASE_URL set?")
}
