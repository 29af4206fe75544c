//! Schema migration command

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use ideabox_server::db::migrations;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Insert the default statuses when none exist
    #[arg(long)]
    pub seed: bool,
}

pub async fn run_migrate(config_path: Option<&Path>, args: MigrateArgs) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }

    let pool = super::connect(&config).await?;
    migrations::run(&pool).await.context("Failed to run migrations")?;
    println!("Schema is up to date.");

    if args.seed {
        let inserted = migrations::seed_statuses(&pool)
            .await
            .context("Failed to seed statuses")?;
        println!("Seeded {inserted} default statuses.");
    }
    Ok(())
}
