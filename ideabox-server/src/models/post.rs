//! Post title/body validation and list ordering

use serde::Deserialize;

use super::validation::trimmed;
use super::ValidationError;

const MAX_TITLE_LEN: usize = 255;
const MAX_BODY_LEN: usize = 10_000;

/// Post title (trimmed, 1..=255 chars)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTitle(String);

impl PostTitle {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        trimmed(s, "title", MAX_TITLE_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Post body (may be empty, at most 10 000 chars)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostBody(String);

impl PostBody {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.chars().count() > MAX_BODY_LEN {
            return Err(ValidationError::TooLong {
                field: "body",
                max: MAX_BODY_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordering for board post lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Top,
    Newest,
    Oldest,
    Trending,
}

impl PostSort {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "top" => Ok(Self::Top),
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "trending" => Ok(Self::Trending),
            other => Err(ValidationError::InvalidVariant {
                field: "sort",
                value: other.to_owned(),
            }),
        }
    }

    /// ORDER BY fragment. Expects `p` aliasing posts and, for trending,
    /// a `recent_votes` column in the select list.
    pub fn order_clause(&self) -> &'static str {
        match self {
            Self::Top => "p.vote DESC, p.created_at DESC",
            Self::Newest => "p.created_at DESC",
            Self::Oldest => "p.created_at ASC",
            Self::Trending => "recent_votes DESC, p.vote DESC, p.created_at DESC",
        }
    }
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
