//! ideabox-core: pieces shared by the server and the CLI
//!
//! - `config`: TOML configuration with environment overrides
//! - `slug`: URL slug generation for boards and posts
//! - `error`: structured errors for the above

pub mod config;
pub mod error;
pub mod slug;

pub use config::{load_dotenv, DatabaseConfig, GitHubConfig, IdeaboxConfig, ServerSection};
pub use error::{CoreError, Result};
pub use slug::{slugify, SlugState};
