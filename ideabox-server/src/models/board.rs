//! Board slug and display name validation
//!
//! Slug format: lowercase alphanumeric with hyphens

use once_cell::sync::Lazy;
use regex::Regex;

use super::validation::trimmed;
use super::ValidationError;

const MAX_BOARD_SLUG_LEN: usize = 64;
const MAX_BOARD_NAME_LEN: usize = 100;

/// Starts with alphanumeric, allows hyphens after
static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").expect("invalid slug regex")
});

/// Validated board slug, used in `/b/{board}` URLs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardSlug(String);

impl BoardSlug {
    /// Create a new board slug.
    ///
    /// # Example
    /// ```
    /// use ideabox_server::models::BoardSlug;
    ///
    /// assert!(BoardSlug::new("feature-requests").is_ok());
    /// assert!(BoardSlug::new("Feature Requests").is_err());
    /// assert!(BoardSlug::new("-bugs").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "board slug" });
        }

        if s.len() > MAX_BOARD_SLUG_LEN {
            return Err(ValidationError::TooLong {
                field: "board slug",
                max: MAX_BOARD_SLUG_LEN,
            });
        }

        if !SLUG_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "board slug",
                reason: "must be lowercase alphanumeric with hyphens, starting with alphanumeric",
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name ("Feature Requests" -> "feature-requests").
    pub fn from_name(name: &BoardName) -> Result<Self, ValidationError> {
        let mut slug = ideabox_core::slugify(name.as_str());
        slug.truncate(MAX_BOARD_SLUG_LEN);
        Self::new(slug.trim_end_matches('-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for BoardSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Board display name (trimmed, 1..=100 chars)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardName(String);

impl BoardName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        trimmed(s, "board name", MAX_BOARD_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        assert!(BoardSlug::new("feature-requests").is_ok());
        assert!(BoardSlug::new("bugs").is_ok());
        assert!(BoardSlug::new("v2").is_ok());
        assert!(BoardSlug::new("1board").is_ok());
    }

    #[test]
    fn rejects_uppercase_and_spaces() {
        let err = BoardSlug::new("MyBoard").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));

        let err = BoardSlug::new("my board").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn rejects_dash_start() {
        let err = BoardSlug::new("-bugs").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn max_length() {
        assert!(BoardSlug::new(&"a".repeat(64)).is_ok());
        let err = BoardSlug::new(&"a".repeat(65)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 64, .. }));
    }

    #[test]
    fn slug_from_name() {
        let name = BoardName::new("  Feature Requests ").unwrap();
        assert_eq!(name.as_str(), "Feature Requests");
        assert_eq!(BoardSlug::from_name(&name).unwrap().as_str(), "feature-requests");
    }
}
