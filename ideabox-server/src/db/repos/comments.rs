//! Comment repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::posts::{ensure_open, lock_post, refresh_counters};
use super::DbError;
use crate::models::{CommentBody, Threaded};

const COMMENT_COLUMNS: &str =
    "id, post_id, user_id, parent_id, body, status_id, origin_post_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub body: String,
    /// Set on activity entries recording a status change
    pub status_id: Option<Uuid>,
    pub origin_post_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment joined with author and status for display
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub author_name: Option<String>,
    pub status_id: Option<Uuid>,
    pub status_name: Option<String>,
    pub status_color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Threaded for CommentView {
    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }
}

pub struct CommentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add a comment and subscribe the commenter.
    ///
    /// A `parent_id` must name a comment on the same post.
    pub async fn create(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        parent_id: Option<Uuid>,
        body: CommentBody,
    ) -> Result<Comment, DbError> {
        let mut tx = self.pool.begin().await?;
        let post = lock_post(&mut tx, post_id).await?;
        ensure_open(&post)?;

        if let Some(parent) = parent_id {
            let on_post: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1 AND post_id = $2)",
            )
            .bind(parent)
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;
            if !on_post {
                return Err(DbError::not_found("parent comment", parent));
            }
        }

        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (post_id, user_id, parent_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(user_id)
        .bind(parent_id)
        .bind(body.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO post_subscriptions (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        refresh_counters(&mut tx, post_id).await?;
        tx.commit().await?;
        Ok(comment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Comment, DbError> {
        sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("comment", id))
    }

    /// All comments and activity entries on a post, oldest first.
    pub async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentView>, DbError> {
        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT
                c.id, c.parent_id, c.body,
                u.name AS author_name,
                c.status_id,
                s.name AS status_name,
                s.color AS status_color,
                c.created_at
            FROM comments c
            LEFT JOIN users u ON u.id = c.user_id
            LEFT JOIN statuses s ON s.id = c.status_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool)
        .await?;
        Ok(comments)
    }
}
