//! IdeaBox configuration
//!
//! Resolution order (highest wins):
//! 1. Environment variables (`DATABASE_URL`, `IDEABOX_*`)
//! 2. TOML file (`--config <path>` or `~/.ideabox/config.toml`)
//! 3. Built-in defaults

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ideabox";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaboxConfig {
    pub server: ServerSection,
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind the HTTP listener to
    pub bind: SocketAddr,
    /// Externally reachable base URL, used for OAuth redirects, webhook
    /// targets and canonical links
    pub public_url: String,
    /// Allow any CORS origin
    pub cors_permissive: bool,
    /// Allowed CORS origins when not permissive
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3030)),
            public_url: "http://localhost:3030".to_string(),
            cors_permissive: false,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3030".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:3030".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base (GitHub Enterprise: `https://host/api/v3`)
    pub api_url: String,
    /// OAuth base (`/login/oauth/...` is appended)
    pub oauth_url: String,
    /// Scopes requested during the OAuth handshake
    pub scopes: Vec<String>,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            oauth_url: "https://github.com".to_string(),
            scopes: vec!["repo".to_string(), "admin:repo_hook".to_string()],
            user_agent: "ideabox".to_string(),
        }
    }
}

impl IdeaboxConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `~/.ideabox/config.toml`
    /// is used when present and defaults otherwise. Environment overrides are
    /// applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CoreError::ConfigNotFound { path: p.to_path_buf() });
                }
                Self::from_file(p)?
            }
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config file at {:?}, using defaults", default_path);
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Default config file path: ~/.ideabox/config.toml
    pub fn config_path() -> PathBuf {
        config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(bind) = lookup("IDEABOX_BIND") {
            self.server.bind = bind
                .parse()
                .map_err(|_| CoreError::config(format!("IDEABOX_BIND '{}' is not a socket address", bind)))?;
        }
        if let Some(public_url) = lookup("IDEABOX_PUBLIC_URL") {
            self.server.public_url = public_url;
        }
        if let Some(api_url) = lookup("IDEABOX_GITHUB_API_URL") {
            self.github.api_url = api_url;
        }
        if let Some(oauth_url) = lookup("IDEABOX_GITHUB_OAUTH_URL") {
            self.github.oauth_url = oauth_url;
        }

        // Trailing slashes would double up when paths are appended
        trim_trailing_slash(&mut self.server.public_url);
        trim_trailing_slash(&mut self.github.api_url);
        trim_trailing_slash(&mut self.github.oauth_url);
        Ok(())
    }
}

fn trim_trailing_slash(value: &mut String) {
    while value.ends_with('/') {
        value.pop();
    }
}

/// Get the ideabox config directory path (~/.ideabox)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ideabox"))
}

/// Load environment variables from .env files.
///
/// The current directory is checked first, then `~/.ideabox/.env`.
/// dotenvy never overwrites variables that are already set.
pub fn load_dotenv() {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(path.display().to_string());
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => loaded_from.push(env_file.display().to_string()),
                Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }

    if loaded_from.is_empty() {
        debug!("No .env files found (current dir or ~/.ideabox)");
    } else {
        debug!("Loaded .env from: {}", loaded_from.join(", "));
    }
}
