//! Vote repository

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::posts::{ensure_open, lock_post, refresh_counters};
use super::DbError;

/// Outcome of a vote toggle
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoteToggle {
    /// Whether the user has a vote on the post after the toggle
    pub voted: bool,
    pub vote_count: i32,
}

pub struct VoteRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> VoteRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add the user's vote, or remove it if present.
    pub async fn toggle(&self, post_id: Uuid, user_id: Uuid) -> Result<VoteToggle, DbError> {
        let mut tx = self.pool.begin().await?;
        let post = lock_post(&mut tx, post_id).await?;
        ensure_open(&post)?;

        let removed = sqlx::query("DELETE FROM votes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO votes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        refresh_counters(&mut tx, post_id).await?;
        let vote_count: i32 = sqlx::query_scalar("SELECT vote FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(VoteToggle {
            voted: removed == 0,
            vote_count,
        })
    }

    pub async fn has_voted(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM votes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }
}
