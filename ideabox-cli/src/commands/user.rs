//! User management: accounts, API tokens and roles

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use ideabox_server::db::UserRepo;
use ideabox_server::models::{Email, Pagination, Role, UserName};

#[derive(Args, Debug)]
pub struct UserArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create a user and print their API token
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// E-mail address (unique)
        #[arg(long)]
        email: String,
        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },
    /// Issue a new API token, invalidating the old one
    RotateToken {
        #[arg(long)]
        email: String,
    },
    /// List users
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        per_page: u32,
    },
    /// Change a user's role (user or admin)
    SetRole {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: String,
    },
}

pub async fn run_user(config_path: Option<&Path>, args: UserArgs) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    let pool = super::connect(&config).await?;
    let users = UserRepo::new(&pool);

    match args.command {
        UserCommand::Create { name, email, admin } => {
            let role = if admin { Role::Admin } else { Role::User };
            let (user, token) = users
                .create(UserName::new(&name)?, Email::new(&email)?, role)
                .await
                .context("Failed to create user")?;
            println!("Created {} <{}> ({})", user.name, user.email, user.role);
            println!("API token: {token}");
            println!("The token is shown once; store it now.");
        }
        UserCommand::RotateToken { email } => {
            let user = users.get_by_email(&Email::new(&email)?).await?;
            let token = users.rotate_token(user.id).await?;
            println!("New API token for {}: {token}", user.email);
        }
        UserCommand::List { page, per_page } => {
            let result = users.list(Pagination::new(page, per_page)).await?;
            for user in &result.items {
                println!("{}  {:<6}  {:<30}  {}", user.id, user.role, user.email, user.name);
            }
            println!(
                "page {}/{} ({} users)",
                result.page,
                result.total_pages(),
                result.total
            );
        }
        UserCommand::SetRole { email, role } => {
            let role = Role::parse(&role)?;
            let user = users.get_by_email(&Email::new(&email)?).await?;
            let user = users.set_role(user.id, role).await?;
            println!("{} is now {}", user.email, user.role);
        }
    }
    Ok(())
}
