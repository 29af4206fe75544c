//! Board repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{BoardName, BoardSlug, Pagination, Paginated};

const BOARD_COLUMNS: &str = "id, slug, name, description, allow_posts, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Board {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub allow_posts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Board with its (unmerged) post count for list display
#[derive(Debug, Clone, Serialize)]
pub struct BoardWithCount {
    #[serde(flatten)]
    pub board: Board,
    pub post_count: i64,
}

pub struct NewBoard {
    pub name: BoardName,
    pub slug: BoardSlug,
    pub description: String,
    pub allow_posts: bool,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Default)]
pub struct BoardChanges {
    pub name: Option<BoardName>,
    pub slug: Option<BoardSlug>,
    pub description: Option<String>,
    pub allow_posts: Option<bool>,
}

pub struct BoardRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BoardRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List boards with post counts in a single query.
    pub async fn list(&self, page: Pagination) -> Result<Paginated<BoardWithCount>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT
                b.id, b.slug, b.name, b.description, b.allow_posts, b.created_at, b.updated_at,
                COUNT(p.id) AS post_count,
                COUNT(*) OVER() AS total
            FROM boards b
            LEFT JOIN posts p ON p.board_id = b.id AND p.merged_into_post_id IS NULL
            GROUP BY b.id
            ORDER BY b.name ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        let mut boards = Paginated::from_rows(
            rows,
            page,
            |r| r.get::<i64, _>("total"),
            |r| BoardWithCount {
                post_count: r.get("post_count"),
                board: Board {
                    id: r.get("id"),
                    slug: r.get("slug"),
                    name: r.get("name"),
                    description: r.get("description"),
                    allow_posts: r.get("allow_posts"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                },
            },
        );
        if boards.is_past_end() {
            boards.total = sqlx::query_scalar("SELECT COUNT(*) FROM boards")
                .fetch_one(self.pool)
                .await?;
        }
        Ok(boards)
    }

    pub async fn get(&self, id: Uuid) -> Result<Board, DbError> {
        sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("board", id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Board, DbError> {
        sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("board", slug))
    }

    pub async fn create(&self, new: NewBoard) -> Result<Board, DbError> {
        sqlx::query_as::<_, Board>(&format!(
            r#"
            INSERT INTO boards (name, slug, description, allow_posts)
            VALUES ($1, $2, $3, $4)
            RETURNING {BOARD_COLUMNS}
            "#
        ))
        .bind(new.name.as_str())
        .bind(new.slug.as_str())
        .bind(new.description.trim())
        .bind(new.allow_posts)
        .fetch_one(self.pool)
        .await
        .map_err(DbError::unique("board", "slug already taken"))
    }

    pub async fn update(&self, id: Uuid, changes: BoardChanges) -> Result<Board, DbError> {
        sqlx::query_as::<_, Board>(&format!(
            r#"
            UPDATE boards SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                allow_posts = COALESCE($5, allow_posts),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BOARD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name.as_ref().map(BoardName::as_str))
        .bind(changes.slug.as_ref().map(BoardSlug::as_str))
        .bind(changes.description.as_deref().map(str::trim))
        .bind(changes.allow_posts)
        .fetch_optional(self.pool)
        .await
        .map_err(DbError::unique("board", "slug already taken"))?
        .ok_or_else(|| DbError::not_found("board", id))
    }

    /// Delete a board and, through cascades, its posts.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("board", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_slug_is_conflict() {
        let pool = test_pool().await;
        let repo = BoardRepo::new(&pool);
        let slug = format!("dup-{}", Uuid::new_v4().simple());

        let new = || NewBoard {
            name: BoardName::new("Dup").unwrap(),
            slug: BoardSlug::new(&slug).unwrap(),
            description: String::new(),
            allow_posts: true,
        };
        repo.create(new()).await.expect("first insert");
        let err = repo.create(new()).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { resource: "board", .. }));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn update_keeps_unset_fields() {
        let pool = test_pool().await;
        let repo = BoardRepo::new(&pool);
        let board = crate::db::testing::board(&pool).await;

        let updated = repo
            .update(
                board.id,
                BoardChanges {
                    allow_posts: Some(false),
                    ..Default::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.name, board.name);
        assert!(!updated.allow_posts);
    }
}
