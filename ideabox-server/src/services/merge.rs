//! Merging duplicate posts
//!
//! A merge moves the source's votes and comments onto the target, stamping
//! each moved row with `origin_post_id = source`. Unmerge moves exactly the
//! stamped rows back. Voters who had already voted on the target keep their
//! vote on the source, so the source's voter set is restored unchanged.
//!
//! Only the latest hop is recorded: when the target is itself merged later,
//! rows moved on that second hop are stamped with the new source.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::repos::posts::{lock_post, refresh_counters};
use crate::db::{DbError, Post};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("a post cannot be merged into itself")]
    SamePost,

    #[error("post {0} is already merged")]
    AlreadyMerged(Uuid),

    #[error("target post {0} is merged into another post")]
    TargetMerged(Uuid),

    #[error("post {0} is not merged")]
    NotMerged(Uuid),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for MergeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub votes_moved: u64,
    /// Votes left on the source because the voter already voted on the target
    pub votes_skipped: u64,
    pub comments_moved: u64,
    pub subscriptions_copied: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnmergeOutcome {
    pub votes_restored: u64,
    pub comments_restored: u64,
}

/// Reject merges that would lose data or build chains.
pub fn check_mergeable(source: &Post, target: &Post) -> Result<(), MergeError> {
    if source.id == target.id {
        return Err(MergeError::SamePost);
    }
    if source.is_merged() {
        return Err(MergeError::AlreadyMerged(source.id));
    }
    if target.is_merged() {
        return Err(MergeError::TargetMerged(target.id));
    }
    Ok(())
}

pub struct MergePostService<'a> {
    pool: &'a PgPool,
}

impl<'a> MergePostService<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Merge `source_id` into `target_id` on behalf of `admin_id`.
    pub async fn merge(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        admin_id: Uuid,
    ) -> Result<MergeOutcome, MergeError> {
        if source_id == target_id {
            return Err(MergeError::SamePost);
        }

        let mut tx = self.pool.begin().await?;
        let (source, target) = lock_pair(&mut tx, source_id, target_id).await?;
        check_mergeable(&source, &target)?;

        let votes_moved = sqlx::query(
            r#"
            UPDATE votes SET post_id = $2, origin_post_id = $1
            WHERE post_id = $1
              AND user_id NOT IN (SELECT user_id FROM votes WHERE post_id = $2)
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let (votes_skipped,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM votes WHERE post_id = $1")
            .bind(source_id)
            .fetch_one(&mut *tx)
            .await?;

        let comments_moved = sqlx::query(
            "UPDATE comments SET post_id = $2, origin_post_id = $1, updated_at = NOW() WHERE post_id = $1",
        )
        .bind(source_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let subscriptions_copied = sqlx::query(
            r#"
            INSERT INTO post_subscriptions (post_id, user_id)
            SELECT $2, user_id FROM post_subscriptions WHERE post_id = $1
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE posts
            SET merged_into_post_id = $2, merged_by_user_id = $3, merged_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .bind(admin_id)
        .execute(&mut *tx)
        .await?;

        refresh_counters(&mut tx, source_id).await?;
        refresh_counters(&mut tx, target_id).await?;
        tx.commit().await?;

        let outcome = MergeOutcome {
            votes_moved,
            votes_skipped: votes_skipped as u64,
            comments_moved,
            subscriptions_copied,
        };
        tracing::info!(
            source = %source_id,
            target = %target_id,
            admin = %admin_id,
            votes_moved,
            votes_skipped = outcome.votes_skipped,
            comments_moved,
            "post merged"
        );
        Ok(outcome)
    }

    /// Undo a merge by moving every row stamped with this post back.
    pub async fn unmerge(&self, source_id: Uuid) -> Result<UnmergeOutcome, MergeError> {
        let mut tx = self.pool.begin().await?;
        let source = lock_post(&mut tx, source_id).await?;
        let Some(target_id) = source.merged_into_post_id else {
            return Err(MergeError::NotMerged(source_id));
        };
        lock_post(&mut tx, target_id).await?;

        let votes_restored = sqlx::query(
            "UPDATE votes SET post_id = $1, origin_post_id = NULL WHERE origin_post_id = $1",
        )
        .bind(source_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let comments_restored = sqlx::query(
            "UPDATE comments SET post_id = $1, origin_post_id = NULL, updated_at = NOW() WHERE origin_post_id = $1",
        )
        .bind(source_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE posts
            SET merged_into_post_id = NULL, merged_by_user_id = NULL, merged_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

        refresh_counters(&mut tx, source_id).await?;
        refresh_counters(&mut tx, target_id).await?;
        tx.commit().await?;

        tracing::info!(
            source = %source_id,
            target = %target_id,
            votes_restored,
            comments_restored,
            "post unmerged"
        );
        Ok(UnmergeOutcome {
            votes_restored,
            comments_restored,
        })
    }
}

/// Lock two posts in id order so concurrent merges cannot deadlock.
async fn lock_pair(conn: &mut PgConnection, a: Uuid, b: Uuid) -> Result<(Post, Post), DbError> {
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let first_post = lock_post(conn, first).await?;
    let second_post = lock_post(conn, second).await?;
    Ok(if first == a {
        (first_post, second_post)
    } else {
        (second_post, first_post)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(merged_into: Option<Uuid>) -> Post {
        Post {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            status_id: None,
            user_id: None,
            title: "t".into(),
            slug: "t".into(),
            body: String::new(),
            vote: 0,
            comments: 0,
            merged_into_post_id: merged_into,
            merged_by_user_id: None,
            merged_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_self_merge() {
        let p = post(None);
        assert!(matches!(check_mergeable(&p, &p), Err(MergeError::SamePost)));
    }

    #[test]
    fn rejects_already_merged_source() {
        let source = post(Some(Uuid::new_v4()));
        let target = post(None);
        assert!(matches!(
            check_mergeable(&source, &target),
            Err(MergeError::AlreadyMerged(id)) if id == source.id
        ));
    }

    #[test]
    fn rejects_merged_target() {
        let source = post(None);
        let target = post(Some(Uuid::new_v4()));
        assert!(matches!(
            check_mergeable(&source, &target),
            Err(MergeError::TargetMerged(_))
        ));
    }

    #[test]
    fn accepts_two_open_posts() {
        assert!(check_mergeable(&post(None), &post(None)).is_ok());
    }

    mod db {
        use super::super::*;
        use crate::db::testing::{self, test_pool};
        use crate::db::{CommentRepo, PostRepo, SubscriptionRepo, VoteRepo};
        use crate::models::CommentBody;

        #[tokio::test]
        #[ignore = "requires database"]
        async fn merge_moves_votes_without_duplicates_and_unmerge_restores() {
            let pool = test_pool().await;
            let board = testing::board(&pool).await;
            let admin = testing::user(&pool).await;
            let alice = testing::user(&pool).await;
            let bob = testing::user(&pool).await;
            let carol = testing::user(&pool).await;

            // source: alice (author), bob. target: carol (author), bob.
            let source = testing::post(&pool, board.id, alice.id, "Dark theme").await;
            let target = testing::post(&pool, board.id, carol.id, "Dark mode").await;
            let votes = VoteRepo::new(&pool);
            votes.toggle(source.id, bob.id).await.unwrap();
            votes.toggle(target.id, bob.id).await.unwrap();
            CommentRepo::new(&pool)
                .create(source.id, bob.id, None, CommentBody::new("same as dark mode").unwrap())
                .await
                .unwrap();

            let service = MergePostService::new(&pool);
            let outcome = service.merge(source.id, target.id, admin.id).await.unwrap();
            assert_eq!(outcome.votes_moved, 1);
            assert_eq!(outcome.votes_skipped, 1);
            assert_eq!(outcome.comments_moved, 1);

            let posts = PostRepo::new(&pool);
            let merged_source = posts.get(source.id).await.unwrap();
            let merged_target = posts.get(target.id).await.unwrap();
            assert_eq!(merged_source.merged_into_post_id, Some(target.id));
            assert_eq!(merged_source.merged_by_user_id, Some(admin.id));
            assert_eq!(merged_source.vote, 1);
            assert_eq!(merged_source.comments, 0);
            assert_eq!(merged_target.vote, 3);
            assert_eq!(merged_target.comments, 1);
            assert!(votes.has_voted(target.id, alice.id).await.unwrap());
            assert!(SubscriptionRepo::new(&pool)
                .is_subscribed(target.id, alice.id)
                .await
                .unwrap());

            // merged posts reject new votes
            assert!(votes.toggle(source.id, carol.id).await.is_err());

            let restored = service.unmerge(source.id).await.unwrap();
            assert_eq!(restored.votes_restored, 1);
            assert_eq!(restored.comments_restored, 1);

            let source = posts.get(source.id).await.unwrap();
            let target = posts.get(target.id).await.unwrap();
            assert!(!source.is_merged());
            assert_eq!(source.vote, 2);
            assert_eq!(source.comments, 1);
            assert_eq!(target.vote, 2);
            assert_eq!(target.comments, 0);
            assert!(votes.has_voted(source.id, alice.id).await.unwrap());
            assert!(votes.has_voted(source.id, bob.id).await.unwrap());
            assert!(!votes.has_voted(target.id, alice.id).await.unwrap());
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn unmerge_of_open_post_is_rejected() {
            let pool = test_pool().await;
            let board = testing::board(&pool).await;
            let user = testing::user(&pool).await;
            let post = testing::post(&pool, board.id, user.id, "Never merged").await;

            let err = MergePostService::new(&pool).unmerge(post.id).await.unwrap_err();
            assert!(matches!(err, MergeError::NotMerged(id) if id == post.id));
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn merging_into_merged_post_is_rejected() {
            let pool = test_pool().await;
            let board = testing::board(&pool).await;
            let user = testing::user(&pool).await;
            let a = testing::post(&pool, board.id, user.id, "A").await;
            let b = testing::post(&pool, board.id, user.id, "B").await;
            let c = testing::post(&pool, board.id, user.id, "C").await;

            let service = MergePostService::new(&pool);
            service.merge(b.id, c.id, user.id).await.unwrap();
            let err = service.merge(a.id, b.id, user.id).await.unwrap_err();
            assert!(matches!(err, MergeError::TargetMerged(_)));
        }
    }
}
