//! `owner/repo` names for linked GitHub repositories

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

static REPO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,38}/[A-Za-z0-9._-]{1,100}$").expect("invalid repo regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "repository" });
        }
        if !REPO_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "repository",
                reason: "must be in owner/repo form",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
