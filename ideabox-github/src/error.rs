//! Error types for GitHub calls

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitHubError>;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("no access token; connect the integration first")]
    MissingToken,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl GitHubError {
    /// True when GitHub answered 404 (missing repo/issue/hook or no access).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// True when the stored token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}
