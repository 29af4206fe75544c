//! Status name and color validation

use once_cell::sync::Lazy;
use regex::Regex;

use super::validation::trimmed;
use super::ValidationError;

const MAX_STATUS_NAME_LEN: usize = 50;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("invalid color regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusName(String);

impl StatusName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        trimmed(s, "status name", MAX_STATUS_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `#rrggbb`, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexColor(String);

impl HexColor {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if !HEX_COLOR_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "color",
                reason: "must be a hex color like #1f883d",
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
