//! Webhook delivery payloads
//!
//! Only the fields IdeaBox reacts to are modelled: `action`,
//! `issue.{number,state,title,html_url}` and `repository.full_name`.

use serde::Deserialize;

use crate::types::IssueState;

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueAction {
    Opened,
    Edited,
    Closed,
    Reopened,
    Deleted,
    Other(String),
}

impl IssueAction {
    fn parse(s: &str) -> Self {
        match s {
            "opened" => Self::Opened,
            "edited" => Self::Edited,
            "closed" => Self::Closed,
            "reopened" => Self::Reopened,
            "deleted" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Opened => "opened",
            Self::Edited => "edited",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
            Self::Deleted => "deleted",
            Self::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookIssue {
    pub number: i64,
    pub state: IssueState,
    pub title: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRepository {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssuesEvent {
    action: String,
    issue: WebhookIssue,
    repository: WebhookRepository,
}

/// Parsed `issues` delivery
#[derive(Debug, Clone)]
pub struct IssuesEvent {
    pub action: IssueAction,
    pub issue: WebhookIssue,
    pub repository: WebhookRepository,
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Ping,
    Issues(IssuesEvent),
    /// Any event type IdeaBox does not subscribe to
    Other(String),
}

impl WebhookEvent {
    /// Decode a delivery given its `X-GitHub-Event` name and raw body.
    pub fn parse(event: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
        match event {
            "ping" => Ok(Self::Ping),
            "issues" => {
                let raw: RawIssuesEvent = serde_json::from_slice(body)?;
                Ok(Self::Issues(IssuesEvent {
                    action: IssueAction::parse(&raw.action),
                    issue: raw.issue,
                    repository: raw.repository,
                }))
            }
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryEnvelope {
    repository: Option<WebhookRepository>,
}

/// Pull `repository.full_name` out of any delivery, before the signature is
/// checked (the secret is stored per repository).
pub fn repository_full_name(body: &[u8]) -> Result<Option<String>, serde_json::Error> {
    let envelope: RepositoryEnvelope = serde_json::from_slice(body)?;
    Ok(envelope.repository.map(|r| r.full_name))
}
