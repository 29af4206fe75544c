use std::collections::HashSet;

const MAX_SLUG_LEN: usize = 80;

/// Tracks slugs already handed out so repeats get a numeric suffix.
#[derive(Default)]
pub struct SlugState {
    taken: HashSet<String>,
}

impl SlugState {
    pub fn new() -> Self {
        Self {
            taken: HashSet::new(),
        }
    }

    /// Seed with slugs that already exist (e.g. loaded from the database).
    pub fn with_taken<I, S>(taken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: taken.into_iter().map(Into::into).collect(),
        }
    }

    /// Next free slug for `base`: `base`, then `base-2`, `base-3`, ...
    pub fn next_slug(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 1;
        while self.taken.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if ch.is_ascii() {
            if !slug.is_empty() && !last_was_dash {
                slug.push('-');
                last_was_dash = true;
            }
        }
        // Non-ASCII characters are skipped entirely.
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic_cases() {
        assert_eq!(slugify("Dark mode, please!"), "dark-mode-please");
        assert_eq!(slugify("emoji 😀 test"), "emoji-test");
        assert_eq!(slugify("foo/bar\\baz"), "foo-bar-baz");
    }

    #[test]
    fn slugify_falls_back_for_symbols_only() {
        assert_eq!(slugify("!!!"), "untitled");
        assert_eq!(slugify("日本語"), "untitled");
    }

    #[test]
    fn slugify_truncates_and_cleans() {
        let long = "a".repeat(100);
        let slug = slugify(&long);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.chars().all(|c| c == 'a'));
    }

    #[test]
    fn next_slug_appends_counter() {
        let mut state = SlugState::new();
        assert_eq!(state.next_slug("export-csv"), "export-csv");
        assert_eq!(state.next_slug("export-csv"), "export-csv-2");
        assert_eq!(state.next_slug("export-csv"), "export-csv-3");
    }

    #[test]
    fn taken_slugs_are_skipped() {
        let mut state = SlugState::with_taken(["sso", "sso-2", "version-3"]);
        assert_eq!(state.next_slug("sso"), "sso-3");
        assert_eq!(state.next_slug("version-3"), "version-3-2");
        assert_eq!(state.next_slug("webhooks"), "webhooks");
    }
}
