//! Post subscription repository

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;

/// A user to notify about a post
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscriber {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

pub struct SubscriptionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Returns false if the user was already subscribed.
    pub async fn subscribe(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO post_subscriptions (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref d) if d.is_foreign_key_violation() => {
                DbError::not_found("post", post_id)
            }
            other => DbError::Sqlx(other),
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns false if there was no subscription.
    pub async fn unsubscribe(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM post_subscriptions WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_subscribed(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM post_subscriptions WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Subscribers of a post, leaving out `exclude` (usually the actor).
    pub async fn subscribers(
        &self,
        post_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Subscriber>, DbError> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT u.id AS user_id, u.name, u.email
            FROM post_subscriptions ps
            JOIN users u ON u.id = ps.user_id
            WHERE ps.post_id = $1 AND ($2::uuid IS NULL OR u.id <> $2)
            ORDER BY ps.created_at ASC
            "#,
        )
        .bind(post_id)
        .bind(exclude)
        .fetch_all(self.pool)
        .await?;
        Ok(subscribers)
    }
}
