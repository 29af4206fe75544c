//! ideabox CLI - feedback boards server and administration
//!
//! - `serve`: run the HTTP server with the notification worker
//! - `migrate`: create the schema (and optionally seed default statuses)
//! - `user`: create users, rotate API tokens, change roles

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "ideabox",
    author,
    version,
    about = "Feedback boards with voting, roadmaps and GitHub issue sync"
)]
struct Cli {
    /// Config file (default: ~/.ideabox/config.toml)
    #[arg(long, global = true, env = "IDEABOX_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (needs the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(commands::serve::ServeArgs),
    /// Create or update the database schema
    Migrate(commands::migrate::MigrateArgs),
    /// Manage users and API tokens
    User(commands::user::UserArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    ideabox_core::load_dotenv();
    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(config, args).await,
        Commands::Migrate(args) => commands::run_migrate(config, args).await,
        Commands::User(args) => commands::run_user(config, args).await,
    };

    tracing_setup::shutdown_otel();
    result
}
