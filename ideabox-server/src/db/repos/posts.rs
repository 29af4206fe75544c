//! Post repository
//!
//! `posts.vote` and `posts.comments` are denormalized counters. Every write
//! that touches votes or comments calls [`refresh_counters`] before its
//! transaction commits.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use ideabox_core::{slugify, SlugState};

use super::DbError;
use crate::models::{escape_like, Pagination, Paginated, PostBody, PostSort, PostTitle};

const POST_COLUMNS: &str = "id, board_id, status_id, user_id, title, slug, body, vote, comments, \
     merged_into_post_id, merged_by_user_id, merged_at, created_at, updated_at";

/// Post record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Post {
    pub id: Uuid,
    pub board_id: Uuid,
    pub status_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub vote: i32,
    pub comments: i32,
    pub merged_into_post_id: Option<Uuid>,
    pub merged_by_user_id: Option<Uuid>,
    pub merged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_merged(&self) -> bool {
        self.merged_into_post_id.is_some()
    }
}

/// Post with the joined fields list views show
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub board_slug: String,
    pub author_name: Option<String>,
    pub status_name: Option<String>,
    pub status_color: Option<String>,
}

pub struct NewPost {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub title: PostTitle,
    pub body: PostBody,
}

/// Board listing options
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub sort: PostSort,
    pub search: Option<String>,
    pub status_id: Option<Uuid>,
}

impl PostFilter {
    /// ILIKE pattern for the search term, `None` when there is nothing to search.
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }
}

/// Result of a status change
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub post: Post,
    /// Activity comment recording the change
    pub comment_id: Uuid,
}

/// Recompute both counters of a post from the rows they count.
pub async fn refresh_counters(conn: &mut PgConnection, post_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE posts SET
            vote = (SELECT COUNT(*) FROM votes WHERE post_id = $1),
            comments = (SELECT COUNT(*) FROM comments WHERE post_id = $1 AND status_id IS NULL)
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Load a post and hold its row lock until the transaction ends.
pub(crate) async fn lock_post(conn: &mut PgConnection, id: Uuid) -> Result<Post, DbError> {
    sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("post", id))
}

/// Fail with `Conflict` when the post has been merged away.
pub(crate) fn ensure_open(post: &Post) -> Result<(), DbError> {
    if post.is_merged() {
        return Err(DbError::Conflict {
            resource: "post",
            reason: "has been merged into another post".to_string(),
        });
    }
    Ok(())
}

/// Change a post's status and record an activity comment, inside the
/// caller's transaction. Returns `None` if the status is unchanged.
pub(crate) async fn set_status_in(
    conn: &mut PgConnection,
    post_id: Uuid,
    status_id: Uuid,
    actor: Option<Uuid>,
) -> Result<Option<StatusChange>, DbError> {
    let current = lock_post(conn, post_id).await?;
    if current.status_id == Some(status_id) {
        return Ok(None);
    }

    let post = sqlx::query_as::<_, Post>(&format!(
        "UPDATE posts SET status_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {POST_COLUMNS}"
    ))
    .bind(post_id)
    .bind(status_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref d) if d.is_foreign_key_violation() => {
            DbError::not_found("status", status_id)
        }
        other => DbError::Sqlx(other),
    })?;

    let (comment_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO comments (post_id, user_id, status_id, body)
        VALUES ($1, $2, $3, '')
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(actor)
    .bind(status_id)
    .fetch_one(&mut *conn)
    .await?;

    refresh_counters(conn, post_id).await?;
    Ok(Some(StatusChange { post, comment_id }))
}

/// Post repository
pub struct PostRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a post with a unique per-board slug and the default status.
    ///
    /// The author is subscribed and their vote recorded in the same
    /// transaction.
    pub async fn create(&self, new: NewPost) -> Result<Post, DbError> {
        let mut tx = self.pool.begin().await?;

        // Serializes slug allocation per board.
        let board: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM boards WHERE id = $1 FOR UPDATE")
            .bind(new.board_id)
            .fetch_optional(&mut *tx)
            .await?;
        if board.is_none() {
            return Err(DbError::not_found("board", new.board_id));
        }

        let base = slugify(new.title.as_str());
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM posts WHERE board_id = $1 AND (slug = $2 OR slug LIKE $3)",
        )
        .bind(new.board_id)
        .bind(&base)
        .bind(format!("{}-%", escape_like(&base)))
        .fetch_all(&mut *tx)
        .await?;
        let slug = SlugState::with_taken(taken).next_slug(&base);

        let default_status: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM statuses WHERE is_default LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (board_id, status_id, user_id, title, slug, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(new.board_id)
        .bind(default_status)
        .bind(new.user_id)
        .bind(new.title.as_str())
        .bind(&slug)
        .bind(new.body.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::unique("post", "slug already taken"))?;

        sqlx::query("INSERT INTO votes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(post.id)
            .bind(new.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO post_subscriptions (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post.id)
        .bind(new.user_id)
        .execute(&mut *tx)
        .await?;

        refresh_counters(&mut tx, post.id).await?;
        let post = lock_post(&mut tx, post.id).await?;
        tx.commit().await?;

        tracing::info!(post_id = %post.id, slug = %post.slug, "post created");
        Ok(post)
    }

    pub async fn get(&self, id: Uuid) -> Result<Post, DbError> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("post", id))
    }

    pub async fn get_by_slug(&self, board_id: Uuid, slug: &str) -> Result<Post, DbError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE board_id = $1 AND slug = $2"
        ))
        .bind(board_id)
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("post", slug))
    }

    /// Unmerged posts on a board.
    ///
    /// With a search term, title matches sort ahead of body-only matches and
    /// the chosen sort breaks ties.
    pub async fn list_for_board(
        &self,
        board_id: Uuid,
        filter: &PostFilter,
        page: Pagination,
    ) -> Result<Paginated<PostSummary>, DbError> {
        let sql = format!(
            r#"
            SELECT
                p.id, p.board_id, p.status_id, p.user_id, p.title, p.slug, p.body,
                p.vote, p.comments, p.merged_into_post_id, p.merged_by_user_id,
                p.merged_at, p.created_at, p.updated_at,
                b.slug AS board_slug,
                u.name AS author_name,
                s.name AS status_name,
                s.color AS status_color,
                (SELECT COUNT(*) FROM votes v
                 WHERE v.post_id = p.id AND v.created_at > NOW() - INTERVAL '7 days') AS recent_votes,
                COUNT(*) OVER() AS total
            FROM posts p
            JOIN boards b ON b.id = p.board_id
            LEFT JOIN users u ON u.id = p.user_id
            LEFT JOIN statuses s ON s.id = p.status_id
            WHERE p.board_id = $1
              AND p.merged_into_post_id IS NULL
              AND ($2::uuid IS NULL OR p.status_id = $2)
              AND ($3::text IS NULL OR p.title ILIKE $3 OR p.body ILIKE $3)
            ORDER BY
                CASE WHEN $3::text IS NOT NULL AND p.title ILIKE $3 THEN 0 ELSE 1 END,
                {order}
            LIMIT $4 OFFSET $5
            "#,
            order = filter.sort.order_clause(),
        );

        let rows = sqlx::query(&sql)
            .bind(board_id)
            .bind(filter.status_id)
            .bind(filter.search_pattern())
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(self.pool)
            .await?;

        let mut posts = Paginated::from_rows(
            rows,
            page,
            |r| r.get::<i64, _>("total"),
            |r| summary_from_row(&r),
        );
        if posts.is_past_end() {
            posts.total = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM posts p
                WHERE p.board_id = $1
                  AND p.merged_into_post_id IS NULL
                  AND ($2::uuid IS NULL OR p.status_id = $2)
                  AND ($3::text IS NULL OR p.title ILIKE $3 OR p.body ILIKE $3)
                "#,
            )
            .bind(board_id)
            .bind(filter.status_id)
            .bind(filter.search_pattern())
            .fetch_one(self.pool)
            .await?;
        }
        Ok(posts)
    }

    /// Unmerged posts whose status is on the roadmap, best voted first.
    pub async fn roadmap(&self) -> Result<Vec<PostSummary>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.id, p.board_id, p.status_id, p.user_id, p.title, p.slug, p.body,
                p.vote, p.comments, p.merged_into_post_id, p.merged_by_user_id,
                p.merged_at, p.created_at, p.updated_at,
                b.slug AS board_slug,
                u.name AS author_name,
                s.name AS status_name,
                s.color AS status_color
            FROM posts p
            JOIN boards b ON b.id = p.board_id
            JOIN statuses s ON s.id = p.status_id
            LEFT JOIN users u ON u.id = p.user_id
            WHERE s.in_roadmap AND p.merged_into_post_id IS NULL
            ORDER BY s.sort_order ASC, p.vote DESC, p.created_at DESC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    /// Change status and record the activity comment atomically.
    pub async fn set_status(
        &self,
        post_id: Uuid,
        status_id: Uuid,
        actor: Uuid,
    ) -> Result<Option<StatusChange>, DbError> {
        let mut tx = self.pool.begin().await?;
        let change = set_status_in(&mut tx, post_id, status_id, Some(actor)).await?;
        tx.commit().await?;
        Ok(change)
    }

    /// Delete a post; votes, comments, subscriptions and links cascade.
    /// Posts merged into it become independent again.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("post", id));
        }
        Ok(())
    }
}

fn summary_from_row(r: &sqlx::postgres::PgRow) -> PostSummary {
    PostSummary {
        post: Post {
            id: r.get("id"),
            board_id: r.get("board_id"),
            status_id: r.get("status_id"),
            user_id: r.get("user_id"),
            title: r.get("title"),
            slug: r.get("slug"),
            body: r.get("body"),
            vote: r.get("vote"),
            comments: r.get("comments"),
            merged_into_post_id: r.get("merged_into_post_id"),
            merged_by_user_id: r.get("merged_by_user_id"),
            merged_at: r.get("merged_at"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        },
        board_slug: r.get("board_slug"),
        author_name: r.get("author_name"),
        status_name: r.get("status_name"),
        status_color: r.get("status_color"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{self, test_pool};

    #[test]
    fn blank_search_is_ignored() {
        let filter = PostFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter.search_pattern(), None);
    }

    #[test]
    fn search_pattern_is_escaped() {
        let filter = PostFilter {
            search: Some(" 50% ".into()),
            ..Default::default()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%50\\%%"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn page_past_end_keeps_total() {
        let pool = test_pool().await;
        let board = testing::board(&pool).await;
        let user = testing::user(&pool).await;
        testing::post(&pool, board.id, user.id, "First").await;
        testing::post(&pool, board.id, user.id, "Second").await;

        let page = PostRepo::new(&pool)
            .list_for_board(board.id, &PostFilter::default(), Pagination::new(9, 10))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 2);
        assert!(!page.has_next());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn same_title_gets_suffixed_slug() {
        let pool = test_pool().await;
        let board = testing::board(&pool).await;
        let user = testing::user(&pool).await;

        let first = testing::post(&pool, board.id, user.id, "Dark mode").await;
        let second = testing::post(&pool, board.id, user.id, "Dark mode").await;
        let third = testing::post(&pool, board.id, user.id, "Dark mode").await;

        assert_eq!(first.slug, "dark-mode");
        assert_eq!(second.slug, "dark-mode-2");
        assert_eq!(third.slug, "dark-mode-3");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn author_vote_is_counted_on_create() {
        let pool = test_pool().await;
        let board = testing::board(&pool).await;
        let user = testing::user(&pool).await;

        let post = testing::post(&pool, board.id, user.id, "Export to CSV").await;
        assert_eq!(post.vote, 1);
        assert_eq!(post.comments, 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn title_matches_rank_before_body_matches() {
        let pool = test_pool().await;
        let board = testing::board(&pool).await;
        let user = testing::user(&pool).await;

        let repo = PostRepo::new(&pool);
        let body_match = repo
            .create(NewPost {
                board_id: board.id,
                user_id: user.id,
                title: PostTitle::new("Keyboard shortcuts").unwrap(),
                body: PostBody::new("Would love a calendar view too").unwrap(),
            })
            .await
            .unwrap();
        let title_match = testing::post(&pool, board.id, user.id, "Calendar integration").await;
        // Give the body match more votes so `top` alone would rank it first.
        let voter = testing::user(&pool).await;
        crate::db::VoteRepo::new(&pool).toggle(body_match.id, voter.id).await.unwrap();

        let filter = PostFilter {
            search: Some("calendar".into()),
            ..Default::default()
        };
        let page = repo
            .list_for_board(board.id, &filter, Pagination::default())
            .await
            .unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.post.id).collect();
        assert_eq!(ids, vec![title_match.id, body_match.id]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn status_change_writes_activity_comment() {
        let pool = test_pool().await;
        let board = testing::board(&pool).await;
        let user = testing::user(&pool).await;
        let post = testing::post(&pool, board.id, user.id, "Webhooks").await;
        let status = testing::status(&pool).await;

        let repo = PostRepo::new(&pool);
        let change = repo.set_status(post.id, status.id, user.id).await.unwrap().unwrap();
        assert_eq!(change.post.status_id, Some(status.id));
        // activity comments don't count as comments
        assert_eq!(change.post.comments, 0);
        let comment = crate::db::CommentRepo::new(&pool).get(change.comment_id).await.unwrap();
        assert_eq!(comment.status_id, Some(status.id));

        // same status again is a no-op
        assert!(repo.set_status(post.id, status.id, user.id).await.unwrap().is_none());
    }
}
