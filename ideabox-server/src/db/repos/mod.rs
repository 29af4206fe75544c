//! Repository implementations for database access
//!
//! Each repository borrows the pool and follows these patterns:
//! - JOINs for list operations (no N+1)
//! - ON CONFLICT instead of check-then-insert
//! - Transactions for multi-step writes, with counter refresh inside them

pub mod boards;
pub mod statuses;
pub mod users;
pub mod posts;
pub mod votes;
pub mod comments;
pub mod subscriptions;
pub mod settings;
pub mod integrations;

pub use boards::{Board, BoardChanges, BoardRepo, BoardWithCount, NewBoard};
pub use statuses::{NewStatus, Status, StatusRepo};
pub use users::{generate_token, hash_token, User, UserRepo};
pub use posts::{refresh_counters, NewPost, Post, PostFilter, PostRepo, PostSummary, StatusChange};
pub use votes::{VoteRepo, VoteToggle};
pub use comments::{Comment, CommentRepo, CommentView};
pub use subscriptions::{SubscriptionRepo, Subscriber};
pub use settings::SettingsRepo;
pub use integrations::{
    IntegrationRepo, IssueLink, LinkedIssue, NewProvider, Provider, TrackedRepository,
};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {resource} {reason}")]
    Conflict { resource: &'static str, reason: String },
}

impl DbError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Map a unique-constraint violation to `Conflict`, pass anything else through.
    pub(crate) fn unique<'a>(resource: &'static str, reason: &'a str) -> impl FnOnce(sqlx::Error) -> Self + 'a {
        move |e| {
            let is_unique = e
                .as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false);
            if is_unique {
                Self::Conflict {
                    resource,
                    reason: reason.to_owned(),
                }
            } else {
                Self::Sqlx(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_unique_errors_pass_through() {
        let err = DbError::unique("board", "slug already taken")(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn display() {
        let err = DbError::not_found("post", "abc");
        assert_eq!(err.to_string(), "not found: post 'abc'");
    }
}
