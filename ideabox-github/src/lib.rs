//! ideabox-github - GitHub Issues integration primitives
//!
//! This crate provides:
//! - OAuth web-flow helpers (authorize URL, state, code exchange)
//! - A thin REST client for repositories, issues and webhooks
//! - Webhook payload types and HMAC-SHA256 signature checks
//!
//! It knows nothing about the database; `ideabox-server` persists tokens,
//! repositories and issue links.

pub mod client;
pub mod error;
pub mod oauth;
pub mod signature;
pub mod types;
pub mod webhook;

pub use client::{Endpoints, GitHubClient};
pub use error::{GitHubError, Result};
pub use oauth::{generate_state, AccessToken};
pub use signature::{generate_webhook_secret, sign, verify_signature, SignatureError, SIGNATURE_HEADER};
pub use types::{GitHubUser, Hook, Issue, IssueState, Repository};
pub use webhook::{
    repository_full_name, IssueAction, IssuesEvent, WebhookEvent, DELIVERY_HEADER, EVENT_HEADER,
};
