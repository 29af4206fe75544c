//! Page meta tags built from site settings

use serde::Serialize;

use crate::models::SiteSettings;

const DESCRIPTION_LEN: usize = 160;

/// One `<meta>` entry; `name` doubles as the OpenGraph property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaTag {
    pub name: &'static str,
    pub content: String,
}

impl MetaTag {
    fn new(name: &'static str, content: impl Into<String>) -> Self {
        Self {
            name,
            content: content.into(),
        }
    }
}

/// The post being shown, if the page is a post page
#[derive(Debug, Clone, Copy)]
pub struct PageSubject<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].trim_end().to_string(),
        None => text.to_string(),
    }
}

pub fn meta_tags(
    settings: &SiteSettings,
    subject: Option<PageSubject<'_>>,
    canonical_url: &str,
) -> Vec<MetaTag> {
    let (title, description) = match subject {
        Some(post) => {
            let description = if post.body.trim().is_empty() {
                settings.site_description.clone()
            } else {
                truncate(post.body, DESCRIPTION_LEN)
            };
            (format!("{} - {}", post.title, settings.site_name), description)
        }
        None => (settings.site_name.clone(), settings.site_description.clone()),
    };

    let mut tags = vec![
        MetaTag::new("title", title.clone()),
        MetaTag::new("description", description.clone()),
        MetaTag::new("og:title", title),
        MetaTag::new("og:description", description),
        MetaTag::new("og:url", canonical_url),
    ];

    let card = match settings.meta_image_url.as_deref().filter(|u| !u.is_empty()) {
        Some(image) => {
            tags.push(MetaTag::new("og:image", image));
            "summary_large_image"
        }
        None => "summary",
    };
    tags.push(MetaTag::new("twitter:card", card));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content<'t>(tags: &'t [MetaTag], name: &str) -> Option<&'t str> {
        tags.iter().find(|t| t.name == name).map(|t| t.content.as_str())
    }

    #[test]
    fn site_page_uses_settings() {
        let settings = SiteSettings::default();
        let tags = meta_tags(&settings, None, "https://ideas.example.com");

        assert_eq!(content(&tags, "title"), Some("IdeaBox"));
        assert_eq!(content(&tags, "description"), Some(settings.site_description.as_str()));
        assert_eq!(content(&tags, "og:url"), Some("https://ideas.example.com"));
        assert_eq!(content(&tags, "og:image"), None);
        assert_eq!(content(&tags, "twitter:card"), Some("summary"));
    }

    #[test]
    fn post_page_prefixes_title_and_truncates_body() {
        let settings = SiteSettings {
            site_name: "Acme Ideas".into(),
            meta_image_url: Some("https://cdn.example.com/og.png".into()),
            ..SiteSettings::default()
        };
        let body = "ü".repeat(400);
        let subject = PageSubject {
            title: "Dark mode",
            body: &body,
        };
        let tags = meta_tags(&settings, Some(subject), "https://x/b/f/p/dark-mode");

        assert_eq!(content(&tags, "title"), Some("Dark mode - Acme Ideas"));
        assert_eq!(content(&tags, "og:title"), Some("Dark mode - Acme Ideas"));
        assert_eq!(content(&tags, "description").map(|d| d.chars().count()), Some(160));
        assert_eq!(content(&tags, "og:image"), Some("https://cdn.example.com/og.png"));
        assert_eq!(content(&tags, "twitter:card"), Some("summary_large_image"));
    }

    #[test]
    fn empty_post_body_falls_back_to_site_description() {
        let settings = SiteSettings::default();
        let subject = PageSubject {
            title: "Export",
            body: "   ",
        };
        let tags = meta_tags(&settings, Some(subject), "u");
        assert_eq!(content(&tags, "description"), Some(settings.site_description.as_str()));
    }
}
