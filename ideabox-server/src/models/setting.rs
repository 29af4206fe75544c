//! Site settings stored as key/JSON rows

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ValidationError;

/// Keys the settings table accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    SiteName,
    SiteDescription,
    MetaImageUrl,
    AllowRegistration,
    DefaultBoard,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        Self::SiteName,
        Self::SiteDescription,
        Self::MetaImageUrl,
        Self::AllowRegistration,
        Self::DefaultBoard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteName => "site_name",
            Self::SiteDescription => "site_description",
            Self::MetaImageUrl => "meta_image_url",
            Self::AllowRegistration => "allow_registration",
            Self::DefaultBoard => "default_board",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "setting",
                value: s.to_owned(),
            })
    }

    /// Check the JSON type of a value for this key. `null` resets to default.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let ok = match self {
            _ if value.is_null() => true,
            Self::AllowRegistration => value.is_boolean(),
            _ => value.is_string(),
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::InvalidFormat {
                field: "setting value",
                reason: match self {
                    Self::AllowRegistration => "must be a boolean",
                    _ => "must be a string",
                },
            })
        }
    }
}

/// Typed view over the settings rows, with defaults for missing keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: String,
    pub meta_image_url: Option<String>,
    pub allow_registration: bool,
    pub default_board: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "IdeaBox".to_string(),
            site_description: "Share your ideas and vote on what we build next.".to_string(),
            meta_image_url: None,
            allow_registration: true,
            default_board: None,
        }
    }
}

impl SiteSettings {
    /// Overlay stored rows on the defaults. Unknown keys and values of the
    /// wrong type are ignored.
    pub fn from_rows(rows: &HashMap<String, Value>) -> Self {
        let mut settings = Self::default();
        let text = |key: SettingKey| {
            rows.get(key.as_str())
                .and_then(Value::as_str)
                .map(str::to_owned)
                .filter(|s| !s.is_empty())
        };

        if let Some(v) = text(SettingKey::SiteName) {
            settings.site_name = v;
        }
        if let Some(v) = text(SettingKey::SiteDescription) {
            settings.site_description = v;
        }
        settings.meta_image_url = text(SettingKey::MetaImageUrl);
        settings.default_board = text(SettingKey::DefaultBoard);
        if let Some(v) = rows
            .get(SettingKey::AllowRegistration.as_str())
            .and_then(Value::as_bool)
        {
            settings.allow_registration = v;
        }
        settings
    }
}
