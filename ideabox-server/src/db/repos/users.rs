//! User repository and API token handling
//!
//! Only the sha256 of a bearer token is stored; the plaintext is shown once
//! when created or rotated.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{Email, Pagination, Paginated, Role, UserName};

const TOKEN_PREFIX: &str = "ibx_";
const TOKEN_RANDOM_LEN: usize = 40;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_admin()
    }
}

/// New random bearer token, `ibx_` followed by 40 alphanumerics.
pub fn generate_token() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{TOKEN_PREFIX}{random}")
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user, returning it together with its plaintext token.
    pub async fn create(
        &self,
        name: UserName,
        email: Email,
        role: Role,
    ) -> Result<(User, String), DbError> {
        let token = generate_token();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, role, api_token_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, created_at
            "#,
        )
        .bind(name.as_str())
        .bind(email.as_str())
        .bind(role.as_str())
        .bind(hash_token(&token))
        .fetch_one(self.pool)
        .await
        .map_err(DbError::unique("user", "email already registered"))?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok((user, token))
    }

    pub async fn get(&self, id: Uuid) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn get_by_email(&self, email: &Email) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at FROM users WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", email.as_str()))
    }

    /// Resolve a bearer token to its user, if any.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at FROM users WHERE api_token_hash = $1",
        )
        .bind(hash_token(token))
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Replace a user's token, returning the new plaintext.
    pub async fn rotate_token(&self, id: Uuid) -> Result<String, DbError> {
        let token = generate_token();
        let result = sqlx::query("UPDATE users SET api_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash_token(&token))
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        tracing::info!(user_id = %id, "api token rotated");
        Ok(token)
    }

    pub async fn set_role(&self, id: Uuid, role: Role) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET role = $2 WHERE id = $1
            RETURNING id, name, email, role, created_at
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn list(&self, page: Pagination) -> Result<Paginated<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, role, created_at, COUNT(*) OVER() AS total
            FROM users
            ORDER BY created_at ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        let mut users = Paginated::from_rows(
            rows,
            page,
            |r| r.get::<i64, _>("total"),
            |r| User {
                id: r.get("id"),
                name: r.get("name"),
                email: r.get("email"),
                role: r.get("role"),
                created_at: r.get("created_at"),
            },
        );
        if users.is_past_end() {
            users.total = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(self.pool)
                .await?;
        }
        Ok(users)
    }
}
