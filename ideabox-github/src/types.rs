//! GitHub REST resources (subset of fields we care about)

use serde::{Deserialize, Serialize};

/// Authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
}

/// A repository visible to the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub full_name: String,
    pub name: String,
    pub private: bool,
    pub html_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// An issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    pub html_url: String,
    /// Pull requests also come through the issues endpoints; filter them out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// A repository webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub id: i64,
    pub active: bool,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Envelope returned by `/search/issues`
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResults<T> {
    #[allow(dead_code)]
    pub total_count: i64,
    pub items: Vec<T>,
}

/// Error body GitHub returns on non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_from_api_json() {
        let json = r#"{
            "number": 42,
            "title": "Dark mode",
            "body": null,
            "state": "closed",
            "html_url": "https://github.com/acme/app/issues/42",
            "labels": []
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.state, IssueState::Closed);
        assert!(!issue.is_pull_request());
    }

    #[test]
    fn pull_requests_are_detected() {
        let json = r#"{
            "number": 7,
            "title": "Fix typo",
            "state": "open",
            "html_url": "https://github.com/acme/app/pull/7",
            "pull_request": {"url": "https://api.github.com/repos/acme/app/pulls/7"}
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(issue.is_pull_request());
    }

    #[test]
    fn issue_state_strings() {
        assert_eq!(IssueState::parse("open"), Some(IssueState::Open));
        assert_eq!(IssueState::parse("closed"), Some(IssueState::Closed));
        assert_eq!(IssueState::parse("merged"), None);
        assert_eq!(IssueState::Closed.as_str(), "closed");
    }
}
