//! HTTP server command
//!
//! Runs migrations, starts the notification worker and serves until
//! Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use ideabox_github::{Endpoints, GitHubClient};
use ideabox_server::db::migrations;
use ideabox_server::jobs::{JobQueue, LogNotifier, NotificationHandler};
use ideabox_server::services::{GitHubIntegration, IntegrationRegistry};
use ideabox_server::{run_server, AppState, ServerConfig};

/// How long pending notifications may take to drain on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Externally reachable base URL (overrides config)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Skip schema migrations at startup
    #[arg(long)]
    pub no_migrate: bool,
}

fn github_registry(config: &ideabox_core::GitHubConfig) -> Result<IntegrationRegistry> {
    let client = GitHubClient::new(Endpoints {
        api_url: config.api_url.clone(),
        oauth_url: config.oauth_url.clone(),
        user_agent: config.user_agent.clone(),
    })
    .context("Failed to build GitHub client")?;

    let mut registry = IntegrationRegistry::new();
    registry.register(Arc::new(GitHubIntegration::new(client, config.scopes.clone())));
    Ok(registry)
}

/// Run the HTTP server
pub async fn run_serve(config_path: Option<&Path>, args: ServeArgs) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(public_url) = args.public_url {
        config.server.public_url = public_url;
    }
    config.server.cors_permissive |= args.cors_permissive;

    let pool = super::connect(&config).await?;
    if !args.no_migrate {
        migrations::run(&pool).await.context("Failed to run migrations")?;
    }

    let server_config = ServerConfig::from(config.server.clone());
    let registry = github_registry(&config.github)?;

    let handler = NotificationHandler::new(pool.clone(), Arc::new(LogNotifier), server_config.public_url.clone());
    let (jobs, worker) = JobQueue::start(Arc::new(handler));

    tracing::info!(bind = %server_config.bind_addr, "Starting ideabox server");
    let state = AppState::new(pool, jobs, registry, server_config.public_url.clone());
    run_server(state, server_config).await.context("Server error")?;

    // The queue was dropped with the router, so the worker ends once drained.
    if tokio::time::timeout(DRAIN_TIMEOUT, worker).await.is_err() {
        tracing::warn!("notification worker did not drain in time");
    }
    Ok(())
}
