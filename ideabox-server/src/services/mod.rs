//! Multi-table operations that sit above single repositories

pub mod integrations;
pub mod merge;
pub mod webhook;

pub use integrations::{GitHubIntegration, Integration, IntegrationError, IntegrationRegistry, IntegrationService};
pub use merge::{MergeError, MergeOutcome, MergePostService, UnmergeOutcome};
pub use webhook::{WebhookError, WebhookOutcome, WebhookService};
