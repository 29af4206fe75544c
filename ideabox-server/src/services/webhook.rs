//! GitHub webhook deliveries
//!
//! The signing secret is stored per repository, so the delivery's
//! `repository.full_name` is read before the signature can be checked.

use std::collections::BTreeSet;

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use ideabox_github::{
    repository_full_name, verify_signature, IssueAction, IssueState, IssuesEvent, WebhookEvent,
};

use crate::db::repos::integrations::{delete_issue_links, link_statuses, update_issue_links};
use crate::db::repos::posts::{lock_post, set_status_in};
use crate::db::{DbError, IntegrationRepo, TrackedRepository};
use crate::jobs::{Job, JobQueue};

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing X-GitHub-Event header")]
    MissingEvent,

    #[error("missing X-Hub-Signature-256 header")]
    MissingSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("payload has no repository")]
    MissingRepository,

    #[error("repository '{0}' is not tracked")]
    UnknownRepository(String),

    #[error("signature does not match")]
    InvalidSignature,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for WebhookError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

/// What a delivery did; serialized as the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookOutcome {
    Pong,
    Processed {
        links_updated: usize,
        posts_status_changed: usize,
    },
    Ignored {
        reason: String,
    },
}

/// How an `issues` action changes stored links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkUpdate {
    SetStatus(IssueState),
    RefreshTitle,
    Remove,
    Ignore,
}

pub fn link_update_for(action: &IssueAction, state: IssueState) -> LinkUpdate {
    match action {
        IssueAction::Closed | IssueAction::Reopened => LinkUpdate::SetStatus(state),
        IssueAction::Edited => LinkUpdate::RefreshTitle,
        IssueAction::Deleted => LinkUpdate::Remove,
        IssueAction::Opened | IssueAction::Other(_) => LinkUpdate::Ignore,
    }
}

/// A post is auto-closed only when it has links and every one is closed.
pub fn should_auto_close<S: AsRef<str>>(link_statuses: &[S]) -> bool {
    !link_statuses.is_empty() && link_statuses.iter().all(|s| s.as_ref() == IssueState::Closed.as_str())
}

/// Raw delivery as received over HTTP
pub struct Delivery<'b> {
    pub event: Option<&'b str>,
    pub signature: Option<&'b str>,
    pub delivery_id: Option<&'b str>,
    pub body: &'b [u8],
}

pub struct WebhookService<'a> {
    pool: &'a PgPool,
    jobs: &'a JobQueue,
}

impl<'a> WebhookService<'a> {
    pub fn new(pool: &'a PgPool, jobs: &'a JobQueue) -> Self {
        Self { pool, jobs }
    }

    pub async fn handle(&self, delivery: Delivery<'_>) -> Result<WebhookOutcome, WebhookError> {
        let event = delivery.event.ok_or(WebhookError::MissingEvent)?;
        let signature = delivery.signature.ok_or(WebhookError::MissingSignature)?;

        let full_name = repository_full_name(delivery.body)?.ok_or(WebhookError::MissingRepository)?;
        let candidates = IntegrationRepo::new(self.pool)
            .repositories_by_full_name(&full_name)
            .await?;
        if candidates.is_empty() {
            return Err(WebhookError::UnknownRepository(full_name));
        }
        let repository = candidates
            .into_iter()
            .find(|r| verify_signature(r.webhook_secret.as_bytes(), delivery.body, signature).is_ok())
            .ok_or(WebhookError::InvalidSignature)?;

        tracing::info!(
            event,
            delivery = delivery.delivery_id.unwrap_or("-"),
            repository = %repository.full_name,
            "webhook received"
        );

        match WebhookEvent::parse(event, delivery.body)? {
            WebhookEvent::Ping => Ok(WebhookOutcome::Pong),
            WebhookEvent::Issues(issues) => self.apply_issues_event(&repository, issues).await,
            WebhookEvent::Other(name) => Ok(WebhookOutcome::Ignored {
                reason: format!("event '{name}' not handled"),
            }),
        }
    }

    async fn apply_issues_event(
        &self,
        repository: &TrackedRepository,
        event: IssuesEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let update = link_update_for(&event.action, event.issue.state);
        if update == LinkUpdate::Ignore {
            return Ok(WebhookOutcome::Ignored {
                reason: format!("issues action '{}' not handled", event.action.as_str()),
            });
        }

        let auto_close_status = if update == LinkUpdate::SetStatus(IssueState::Closed) {
            IntegrationRepo::new(self.pool)
                .get_provider(repository.provider_id)
                .await?
                .auto_close_status_id
        } else {
            None
        };

        let number = event.issue.number;
        let mut tx = self.pool.begin().await?;
        let post_ids = match update {
            LinkUpdate::SetStatus(state) => {
                update_issue_links(&mut tx, repository.id, number, Some(state.as_str()), &event.issue.title).await?
            }
            LinkUpdate::RefreshTitle => {
                update_issue_links(&mut tx, repository.id, number, None, &event.issue.title).await?
            }
            LinkUpdate::Remove => delete_issue_links(&mut tx, repository.id, number).await?,
            LinkUpdate::Ignore => Vec::new(),
        };
        let links_updated = post_ids.len();

        let mut jobs = Vec::new();
        if let Some(status_id) = auto_close_status {
            let unique: BTreeSet<Uuid> = post_ids.iter().copied().collect();
            for post_id in unique {
                // Serializes concurrent deliveries for the same post so the
                // last one to commit sees every sibling link's new status.
                lock_post(&mut tx, post_id).await?;
                let statuses = link_statuses(&mut tx, post_id).await?;
                if !should_auto_close(&statuses) {
                    continue;
                }
                if let Some(change) = set_status_in(&mut tx, post_id, status_id, None).await? {
                    tracing::info!(post = %change.post.id, issue = number, "post auto-closed by linked issues");
                    jobs.push(Job::StatusChanged { post_id, status_id });
                }
            }
        }
        tx.commit().await?;

        let posts_status_changed = jobs.len();
        for job in jobs {
            self.jobs.enqueue(job);
        }

        Ok(WebhookOutcome::Processed {
            links_updated,
            posts_status_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_and_reopened_set_status() {
        assert_eq!(
            link_update_for(&IssueAction::Closed, IssueState::Closed),
            LinkUpdate::SetStatus(IssueState::Closed)
        );
        assert_eq!(
            link_update_for(&IssueAction::Reopened, IssueState::Open),
            LinkUpdate::SetStatus(IssueState::Open)
        );
    }

    #[test]
    fn edited_and_deleted() {
        assert_eq!(link_update_for(&IssueAction::Edited, IssueState::Open), LinkUpdate::RefreshTitle);
        assert_eq!(link_update_for(&IssueAction::Deleted, IssueState::Open), LinkUpdate::Remove);
    }

    #[test]
    fn other_actions_are_ignored() {
        assert_eq!(link_update_for(&IssueAction::Opened, IssueState::Open), LinkUpdate::Ignore);
        assert_eq!(
            link_update_for(&IssueAction::Other("labeled".into()), IssueState::Open),
            LinkUpdate::Ignore
        );
    }

    #[test]
    fn auto_close_needs_every_link_closed() {
        assert!(should_auto_close(&["closed", "closed"]));
        assert!(!should_auto_close(&["closed", "open"]));
        assert!(!should_auto_close::<&str>(&[]));
    }

    #[test]
    fn outcome_serialization() {
        assert_eq!(
            serde_json::to_value(WebhookOutcome::Pong).unwrap(),
            serde_json::json!({"status": "pong"})
        );
        let ignored = serde_json::to_value(WebhookOutcome::Ignored { reason: "x".into() }).unwrap();
        assert_eq!(ignored["status"], "ignored");
        let processed = serde_json::to_value(WebhookOutcome::Processed {
            links_updated: 2,
            posts_status_changed: 1,
        })
        .unwrap();
        assert_eq!(processed["status"], "processed");
        assert_eq!(processed["links_updated"], 2);
    }

    mod db {
        use super::super::*;
        use crate::db::testing::{self, test_pool};
        use crate::db::PostRepo;
        use ideabox_github::sign;

        fn payload(full_name: &str, action: &str, number: i64, state: &str, title: &str) -> Vec<u8> {
            serde_json::to_vec(&serde_json::json!({
                "action": action,
                "issue": {
                    "number": number,
                    "state": state,
                    "title": title,
                    "html_url": format!("https://github.com/{full_name}/issues/{number}")
                },
                "repository": { "full_name": full_name }
            }))
            .unwrap()
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn closing_last_open_issue_auto_closes_post() {
            let pool = test_pool().await;
            let jobs = JobQueue::detached();
            let service = WebhookService::new(&pool, &jobs);

            let repository = testing::repository(&pool).await;
            let done = testing::status(&pool).await;
            IntegrationRepo::new(&pool)
                .set_auto_close_status(repository.provider_id, Some(done.id))
                .await
                .unwrap();

            let board = testing::board(&pool).await;
            let user = testing::user(&pool).await;
            let post = testing::post(&pool, board.id, user.id, "Auto close").await;
            let links = IntegrationRepo::new(&pool);
            links.upsert_link(post.id, repository.id, 1, "one", "u1", "open").await.unwrap();
            links.upsert_link(post.id, repository.id, 2, "two", "u2", "open").await.unwrap();

            let close = |n: i64| {
                let body = payload(&repository.full_name, "closed", n, "closed", "renamed");
                let sig = sign(repository.webhook_secret.as_bytes(), &body).unwrap();
                (body, sig)
            };

            let (body, sig) = close(1);
            let outcome = service
                .handle(Delivery { event: Some("issues"), signature: Some(&sig), delivery_id: None, body: &body })
                .await
                .unwrap();
            assert_eq!(outcome, WebhookOutcome::Processed { links_updated: 1, posts_status_changed: 0 });
            assert_ne!(PostRepo::new(&pool).get(post.id).await.unwrap().status_id, Some(done.id));

            let (body, sig) = close(2);
            let outcome = service
                .handle(Delivery { event: Some("issues"), signature: Some(&sig), delivery_id: None, body: &body })
                .await
                .unwrap();
            assert_eq!(outcome, WebhookOutcome::Processed { links_updated: 1, posts_status_changed: 1 });
            assert_eq!(PostRepo::new(&pool).get(post.id).await.unwrap().status_id, Some(done.id));

            let titles: Vec<_> = links.links_for_post(post.id).await.unwrap().into_iter().map(|l| l.issue_title).collect();
            assert_eq!(titles, vec!["renamed", "renamed"]);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        #[ignore = "requires database"]
        async fn simultaneous_closes_still_auto_close() {
            let pool = test_pool().await;
            let jobs = JobQueue::detached();

            let repository = testing::repository(&pool).await;
            let done = testing::status(&pool).await;
            IntegrationRepo::new(&pool)
                .set_auto_close_status(repository.provider_id, Some(done.id))
                .await
                .unwrap();

            let board = testing::board(&pool).await;
            let user = testing::user(&pool).await;
            let post = testing::post(&pool, board.id, user.id, "Closed together").await;
            let links = IntegrationRepo::new(&pool);
            links.upsert_link(post.id, repository.id, 1, "one", "u1", "open").await.unwrap();
            links.upsert_link(post.id, repository.id, 2, "two", "u2", "open").await.unwrap();

            let deliver = |number: i64| {
                let pool = pool.clone();
                let jobs = jobs.clone();
                let body = payload(&repository.full_name, "closed", number, "closed", "done");
                let sig = sign(repository.webhook_secret.as_bytes(), &body).unwrap();
                tokio::spawn(async move {
                    WebhookService::new(&pool, &jobs)
                        .handle(Delivery { event: Some("issues"), signature: Some(&sig), delivery_id: None, body: &body })
                        .await
                        .unwrap()
                })
            };

            let (first, second) = tokio::join!(deliver(1), deliver(2));
            let changed = [first.unwrap(), second.unwrap()]
                .iter()
                .map(|o| match o {
                    WebhookOutcome::Processed { posts_status_changed, .. } => *posts_status_changed,
                    other => panic!("unexpected outcome {other:?}"),
                })
                .sum::<usize>();

            assert_eq!(changed, 1);
            assert_eq!(PostRepo::new(&pool).get(post.id).await.unwrap().status_id, Some(done.id));
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn wrong_secret_and_unknown_repository() {
            let pool = test_pool().await;
            let jobs = JobQueue::detached();
            let service = WebhookService::new(&pool, &jobs);
            let repository = testing::repository(&pool).await;

            let body = payload(&repository.full_name, "closed", 1, "closed", "t");
            let sig = sign(b"not-the-secret", &body).unwrap();
            let err = service
                .handle(Delivery { event: Some("issues"), signature: Some(&sig), delivery_id: None, body: &body })
                .await
                .unwrap_err();
            assert!(matches!(err, WebhookError::InvalidSignature));

            let body = payload("nobody/nothing", "closed", 1, "closed", "t");
            let err = service
                .handle(Delivery { event: Some("issues"), signature: Some(&sig), delivery_id: None, body: &body })
                .await
                .unwrap_err();
            assert!(matches!(err, WebhookError::UnknownRepository(name) if name == "nobody/nothing"));
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn deleted_issue_removes_links() {
            let pool = test_pool().await;
            let jobs = JobQueue::detached();
            let service = WebhookService::new(&pool, &jobs);
            let repository = testing::repository(&pool).await;
            let board = testing::board(&pool).await;
            let user = testing::user(&pool).await;
            let post = testing::post(&pool, board.id, user.id, "Deleted issue").await;
            let links = IntegrationRepo::new(&pool);
            links.upsert_link(post.id, repository.id, 5, "five", "u5", "open").await.unwrap();

            let body = payload(&repository.full_name, "deleted", 5, "open", "five");
            let sig = sign(repository.webhook_secret.as_bytes(), &body).unwrap();
            service
                .handle(Delivery { event: Some("issues"), signature: Some(&sig), delivery_id: None, body: &body })
                .await
                .unwrap();
            assert!(links.links_for_post(post.id).await.unwrap().is_empty());
        }
    }
}
