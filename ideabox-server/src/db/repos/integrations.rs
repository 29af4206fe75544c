//! Integration providers, tracked repositories and post-issue links

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::DbError;

const PROVIDER_COLUMNS: &str = "id, kind, name, client_id, client_secret, access_token, token_scope, \
     oauth_state, connected_at, auto_close_status_id, created_at, updated_at";
const REPOSITORY_COLUMNS: &str =
    "id, provider_id, full_name, external_id, webhook_id, webhook_secret, created_at";
const LINK_COLUMNS: &str =
    "id, post_id, repository_id, issue_number, issue_title, issue_url, status, created_at, updated_at";

/// Stored OAuth app credentials and connection state
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Provider {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: String,
    #[serde(skip)]
    pub access_token: Option<String>,
    pub token_scope: Option<String>,
    #[serde(skip)]
    pub oauth_state: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub auto_close_status_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }
}

pub struct NewProvider {
    pub kind: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auto_close_status_id: Option<Uuid>,
}

/// A repository whose issues can be linked to posts
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackedRepository {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub full_name: String,
    pub external_id: i64,
    pub webhook_id: Option<i64>,
    #[serde(skip)]
    pub webhook_secret: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IssueLink {
    pub id: Uuid,
    pub post_id: Uuid,
    pub repository_id: Uuid,
    pub issue_number: i64,
    pub issue_title: String,
    pub issue_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link with its repository name, for the post page
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LinkedIssue {
    pub id: Uuid,
    pub repository: String,
    pub issue_number: i64,
    pub issue_title: String,
    pub issue_url: String,
    pub status: String,
}

pub struct IntegrationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> IntegrationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // ---- providers ----

    pub async fn list_providers(&self) -> Result<Vec<Provider>, DbError> {
        let providers = sqlx::query_as::<_, Provider>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM integration_providers ORDER BY created_at ASC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(providers)
    }

    pub async fn get_provider(&self, id: Uuid) -> Result<Provider, DbError> {
        sqlx::query_as::<_, Provider>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM integration_providers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("integration provider", id))
    }

    pub async fn create_provider(&self, new: NewProvider) -> Result<Provider, DbError> {
        let provider = sqlx::query_as::<_, Provider>(&format!(
            r#"
            INSERT INTO integration_providers (kind, name, client_id, client_secret, auto_close_status_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PROVIDER_COLUMNS}
            "#
        ))
        .bind(&new.kind)
        .bind(&new.name)
        .bind(&new.client_id)
        .bind(&new.client_secret)
        .bind(new.auto_close_status_id)
        .fetch_one(self.pool)
        .await?;
        Ok(provider)
    }

    pub async fn set_auto_close_status(
        &self,
        id: Uuid,
        status_id: Option<Uuid>,
    ) -> Result<Provider, DbError> {
        sqlx::query_as::<_, Provider>(&format!(
            r#"
            UPDATE integration_providers SET auto_close_status_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROVIDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("integration provider", id))
    }

    pub async fn delete_provider(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM integration_providers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("integration provider", id));
        }
        Ok(())
    }

    pub async fn set_oauth_state(&self, id: Uuid, state: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE integration_providers SET oauth_state = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(state)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("integration provider", id));
        }
        Ok(())
    }

    pub async fn find_by_oauth_state(&self, state: &str) -> Result<Option<Provider>, DbError> {
        let provider = sqlx::query_as::<_, Provider>(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM integration_providers WHERE oauth_state = $1"
        ))
        .bind(state)
        .fetch_optional(self.pool)
        .await?;
        Ok(provider)
    }

    /// Store a fresh access token and consume the OAuth state.
    pub async fn store_token(
        &self,
        id: Uuid,
        access_token: &str,
        scope: &str,
    ) -> Result<Provider, DbError> {
        sqlx::query_as::<_, Provider>(&format!(
            r#"
            UPDATE integration_providers
            SET access_token = $2, token_scope = $3, connected_at = NOW(),
                oauth_state = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROVIDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(access_token)
        .bind(scope)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("integration provider", id))
    }

    /// Forget the token and every tracked repository (links cascade).
    pub async fn disconnect(&self, id: Uuid) -> Result<Provider, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM integration_repositories WHERE provider_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let provider = sqlx::query_as::<_, Provider>(&format!(
            r#"
            UPDATE integration_providers
            SET access_token = NULL, token_scope = NULL, connected_at = NULL,
                oauth_state = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROVIDER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("integration provider", id))?;
        tx.commit().await?;
        Ok(provider)
    }

    // ---- repositories ----

    pub async fn list_repositories(&self, provider_id: Uuid) -> Result<Vec<TrackedRepository>, DbError> {
        let repos = sqlx::query_as::<_, TrackedRepository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM integration_repositories WHERE provider_id = $1 ORDER BY full_name"
        ))
        .bind(provider_id)
        .fetch_all(self.pool)
        .await?;
        Ok(repos)
    }

    pub async fn get_repository(&self, id: Uuid) -> Result<TrackedRepository, DbError> {
        sqlx::query_as::<_, TrackedRepository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM integration_repositories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("repository", id))
    }

    /// Every tracked copy of `full_name` (one per provider that added it).
    pub async fn repositories_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Vec<TrackedRepository>, DbError> {
        let repos = sqlx::query_as::<_, TrackedRepository>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM integration_repositories WHERE lower(full_name) = lower($1)"
        ))
        .bind(full_name)
        .fetch_all(self.pool)
        .await?;
        Ok(repos)
    }

    pub async fn add_repository(
        &self,
        provider_id: Uuid,
        full_name: &str,
        external_id: i64,
        webhook_id: Option<i64>,
        webhook_secret: &str,
    ) -> Result<TrackedRepository, DbError> {
        sqlx::query_as::<_, TrackedRepository>(&format!(
            r#"
            INSERT INTO integration_repositories
                (provider_id, full_name, external_id, webhook_id, webhook_secret)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REPOSITORY_COLUMNS}
            "#
        ))
        .bind(provider_id)
        .bind(full_name)
        .bind(external_id)
        .bind(webhook_id)
        .bind(webhook_secret)
        .fetch_one(self.pool)
        .await
        .map_err(DbError::unique("repository", "already added"))
    }

    pub async fn remove_repository(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM integration_repositories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("repository", id));
        }
        Ok(())
    }

    // ---- links ----

    /// Insert or refresh the link between a post and an issue.
    pub async fn upsert_link(
        &self,
        post_id: Uuid,
        repository_id: Uuid,
        issue_number: i64,
        issue_title: &str,
        issue_url: &str,
        status: &str,
    ) -> Result<IssueLink, DbError> {
        let link = sqlx::query_as::<_, IssueLink>(&format!(
            r#"
            INSERT INTO post_integration_links
                (post_id, repository_id, issue_number, issue_title, issue_url, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (post_id, repository_id, issue_number) DO UPDATE SET
                issue_title = EXCLUDED.issue_title,
                issue_url = EXCLUDED.issue_url,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(repository_id)
        .bind(issue_number)
        .bind(issue_title)
        .bind(issue_url)
        .bind(status)
        .fetch_one(self.pool)
        .await?;
        Ok(link)
    }

    pub async fn get_link(&self, id: Uuid) -> Result<IssueLink, DbError> {
        sqlx::query_as::<_, IssueLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM post_integration_links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("issue link", id))
    }

    pub async fn delete_link(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM post_integration_links WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("issue link", id));
        }
        Ok(())
    }

    pub async fn links_for_post(&self, post_id: Uuid) -> Result<Vec<LinkedIssue>, DbError> {
        let links = sqlx::query_as::<_, LinkedIssue>(
            r#"
            SELECT l.id, r.full_name AS repository, l.issue_number, l.issue_title,
                   l.issue_url, l.status
            FROM post_integration_links l
            JOIN integration_repositories r ON r.id = l.repository_id
            WHERE l.post_id = $1
            ORDER BY l.created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool)
        .await?;
        Ok(links)
    }
}

/// Update every link to one issue. `status = None` only refreshes the title.
/// Returns the affected post ids.
pub(crate) async fn update_issue_links(
    conn: &mut PgConnection,
    repository_id: Uuid,
    issue_number: i64,
    status: Option<&str>,
    title: &str,
) -> Result<Vec<Uuid>, DbError> {
    let post_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE post_integration_links
        SET status = COALESCE($3, status), issue_title = $4, updated_at = NOW()
        WHERE repository_id = $1 AND issue_number = $2
        RETURNING post_id
        "#,
    )
    .bind(repository_id)
    .bind(issue_number)
    .bind(status)
    .bind(title)
    .fetch_all(&mut *conn)
    .await?;
    Ok(post_ids)
}

/// Remove every link to one issue; returns the affected post ids.
pub(crate) async fn delete_issue_links(
    conn: &mut PgConnection,
    repository_id: Uuid,
    issue_number: i64,
) -> Result<Vec<Uuid>, DbError> {
    let post_ids: Vec<Uuid> = sqlx::query_scalar(
        "DELETE FROM post_integration_links WHERE repository_id = $1 AND issue_number = $2 RETURNING post_id",
    )
    .bind(repository_id)
    .bind(issue_number)
    .fetch_all(&mut *conn)
    .await?;
    Ok(post_ids)
}

/// Statuses (`open`/`closed`) of all links on a post.
pub(crate) async fn link_statuses(conn: &mut PgConnection, post_id: Uuid) -> Result<Vec<String>, DbError> {
    let statuses: Vec<String> =
        sqlx::query_scalar("SELECT status FROM post_integration_links WHERE post_id = $1")
            .bind(post_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(statuses)
}
