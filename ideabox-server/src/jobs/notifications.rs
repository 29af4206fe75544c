//! Subscriber notifications
//!
//! Jobs resolve the post's subscribers and hand one [`Notification`] per
//! recipient to a [`Notifier`]. The shipped notifier only logs.
//!
//! Delivery is retried per recipient, so a failure for one subscriber never
//! causes a resend to the others.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use super::queue::{Job, JobError, JobHandler, MAX_TRIES};
use crate::db::{BoardRepo, CommentRepo, Post, PostRepo, StatusRepo, Subscriber, SubscriptionRepo, UserRepo};

const EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes each notification to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        tracing::info!(to = %n.to_email, subject = %n.subject, url = %n.url, "notification");
        Ok(())
    }
}

/// Send each notification, retrying a recipient up to [`MAX_TRIES`] times.
///
/// Returns how many recipients could not be reached.
pub async fn deliver(notifier: &dyn Notifier, notifications: &[Notification]) -> usize {
    let mut failed = 0;
    for n in notifications {
        let mut attempt = 1;
        loop {
            match notifier.notify(n).await {
                Ok(()) => break,
                Err(e) if attempt < MAX_TRIES => {
                    tracing::warn!(to = %n.to_email, attempt, error = %e, "notification failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(to = %n.to_email, attempts = attempt, error = %e, "notification dropped");
                    failed += 1;
                    break;
                }
            }
        }
    }
    failed
}

pub fn post_url(public_url: &str, board_slug: &str, post_slug: &str) -> String {
    format!("{public_url}/b/{board_slug}/p/{post_slug}")
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn comment_notification(
    to: &Subscriber,
    post: &Post,
    commenter: &str,
    comment: &str,
    url: &str,
) -> Notification {
    Notification {
        to_name: to.name.clone(),
        to_email: to.email.clone(),
        subject: format!("New comment on \"{}\"", post.title),
        body: format!("{commenter} commented:\n\n{}\n\nView the discussion: {url}", excerpt(comment)),
        url: url.to_string(),
    }
}

pub fn status_notification(to: &Subscriber, post: &Post, status: &str, url: &str) -> Notification {
    Notification {
        to_name: to.name.clone(),
        to_email: to.email.clone(),
        subject: format!("\"{}\" is now {}", post.title, status),
        body: format!("The status of \"{}\" changed to {status}.\n\n{url}", post.title),
        url: url.to_string(),
    }
}

/// Turns notification jobs into notifier calls
pub struct NotificationHandler {
    pool: PgPool,
    notifier: Arc<dyn Notifier>,
    public_url: String,
}

impl NotificationHandler {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>, public_url: impl Into<String>) -> Self {
        Self {
            pool,
            notifier,
            public_url: public_url.into(),
        }
    }

    async fn url_for(&self, post: &Post) -> Result<String, JobError> {
        let board = BoardRepo::new(&self.pool).get(post.board_id).await?;
        Ok(post_url(&self.public_url, &board.slug, &post.slug))
    }

    async fn send_all(&self, notifications: Vec<Notification>) -> Result<(), JobError> {
        let failed = deliver(self.notifier.as_ref(), &notifications).await;
        tracing::debug!(sent = notifications.len() - failed, failed, "notifications delivered");
        Ok(())
    }
}

#[async_trait]
impl JobHandler for NotificationHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        match job {
            Job::CommentAdded { comment_id } => {
                let comment = CommentRepo::new(&self.pool).get(*comment_id).await?;
                let post = PostRepo::new(&self.pool).get(comment.post_id).await?;
                let commenter = match comment.user_id {
                    Some(id) => UserRepo::new(&self.pool).get(id).await?.name,
                    None => "Someone".to_string(),
                };
                let url = self.url_for(&post).await?;
                let subscribers = SubscriptionRepo::new(&self.pool)
                    .subscribers(post.id, comment.user_id)
                    .await?;

                let notifications = subscribers
                    .iter()
                    .map(|s| comment_notification(s, &post, &commenter, &comment.body, &url))
                    .collect();
                self.send_all(notifications).await
            }
            Job::StatusChanged { post_id, status_id } => {
                let post = PostRepo::new(&self.pool).get(*post_id).await?;
                let status = StatusRepo::new(&self.pool).get(*status_id).await?;
                let url = self.url_for(&post).await?;
                let subscribers = SubscriptionRepo::new(&self.pool).subscribers(post.id, None).await?;

                let notifications = subscribers
                    .iter()
                    .map(|s| status_notification(s, &post, &status.name, &url))
                    .collect();
                self.send_all(notifications).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn subscriber() -> Subscriber {
        Subscriber {
            user_id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
        }
    }

    fn post() -> Post {
        Post {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            status_id: None,
            user_id: None,
            title: "Dark mode".into(),
            slug: "dark-mode".into(),
            body: String::new(),
            vote: 1,
            comments: 0,
            merged_into_post_id: None,
            merged_by_user_id: None,
            merged_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn builds_post_url() {
        assert_eq!(
            post_url("https://ideas.example.com", "features", "dark-mode"),
            "https://ideas.example.com/b/features/p/dark-mode"
        );
    }

    #[test]
    fn comment_notification_quotes_excerpt() {
        let long = "x".repeat(300);
        let n = comment_notification(&subscriber(), &post(), "Grace", &long, "https://u");
        assert_eq!(n.to_email, "ada@example.com");
        assert_eq!(n.subject, "New comment on \"Dark mode\"");
        assert!(n.body.starts_with("Grace commented:"));
        assert!(n.body.contains(&format!("{}...", "x".repeat(200))));
        assert!(!n.body.contains(&"x".repeat(201)));
    }

    #[test]
    fn status_notification_names_status() {
        let n = status_notification(&subscriber(), &post(), "Completed", "https://u");
        assert_eq!(n.subject, "\"Dark mode\" is now Completed");
        assert_eq!(n.url, "https://u");
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let s = "é".repeat(250);
        let e = excerpt(&s);
        assert_eq!(e.chars().count(), 203);
    }

    /// Fails the first `failures` sends to one address; counts every call.
    struct FlakyNotifier {
        address: &'static str,
        failures: u32,
        calls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(n.to_email.clone());
            let attempts = calls.iter().filter(|e| *e == self.address).count() as u32;
            if n.to_email == self.address && attempts <= self.failures {
                return Err(NotifyError("mailbox unavailable".into()));
            }
            Ok(())
        }
    }

    fn recipients() -> Vec<Notification> {
        ["ada@example.com", "grace@example.com"]
            .into_iter()
            .map(|email| {
                let to = Subscriber {
                    email: email.into(),
                    ..subscriber()
                };
                status_notification(&to, &post(), "Planned", "https://u")
            })
            .collect()
    }

    fn sends_to(notifier: &FlakyNotifier, email: &str) -> usize {
        notifier.calls.lock().unwrap().iter().filter(|e| *e == email).count()
    }

    #[tokio::test]
    async fn retry_does_not_resend_to_delivered_recipients() {
        let notifier = FlakyNotifier {
            address: "grace@example.com",
            failures: 1,
            calls: Default::default(),
        };
        let failed = deliver(&notifier, &recipients()).await;
        assert_eq!(failed, 0);
        assert_eq!(sends_to(&notifier, "ada@example.com"), 1);
        assert_eq!(sends_to(&notifier, "grace@example.com"), 2);
    }

    #[tokio::test]
    async fn unreachable_recipient_is_dropped_after_max_tries() {
        let notifier = FlakyNotifier {
            address: "ada@example.com",
            failures: u32::MAX,
            calls: Default::default(),
        };
        let failed = deliver(&notifier, &recipients()).await;
        assert_eq!(failed, 1);
        assert_eq!(sends_to(&notifier, "ada@example.com"), MAX_TRIES as usize);
        assert_eq!(sends_to(&notifier, "grace@example.com"), 1);
    }

    #[tokio::test]
    async fn log_notifier_accepts_everything() {
        let n = status_notification(&subscriber(), &post(), "Planned", "https://u");
        LogNotifier.notify(&n).await.unwrap();
    }
}
