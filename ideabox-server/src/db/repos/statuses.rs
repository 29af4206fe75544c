//! Status repository
//!
//! At most one status is the default; setting `is_default` on one clears it
//! on the rest inside the same transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::{HexColor, StatusName};

const STATUS_COLUMNS: &str = "id, name, color, in_roadmap, is_default, sort_order, created_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Status {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub in_roadmap: bool,
    pub is_default: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

pub struct NewStatus {
    pub name: StatusName,
    pub color: HexColor,
    pub in_roadmap: bool,
    pub is_default: bool,
    pub sort_order: i32,
}

pub struct StatusRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StatusRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Status>, DbError> {
        let statuses = sqlx::query_as::<_, Status>(&format!(
            "SELECT {STATUS_COLUMNS} FROM statuses ORDER BY sort_order ASC, name ASC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(statuses)
    }

    pub async fn roadmap(&self) -> Result<Vec<Status>, DbError> {
        let statuses = sqlx::query_as::<_, Status>(&format!(
            "SELECT {STATUS_COLUMNS} FROM statuses WHERE in_roadmap ORDER BY sort_order ASC, name ASC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(statuses)
    }

    pub async fn get(&self, id: Uuid) -> Result<Status, DbError> {
        sqlx::query_as::<_, Status>(&format!("SELECT {STATUS_COLUMNS} FROM statuses WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("status", id))
    }

    pub async fn default_status(&self) -> Result<Option<Status>, DbError> {
        let status = sqlx::query_as::<_, Status>(&format!(
            "SELECT {STATUS_COLUMNS} FROM statuses WHERE is_default LIMIT 1"
        ))
        .fetch_optional(self.pool)
        .await?;
        Ok(status)
    }

    pub async fn create(&self, new: NewStatus) -> Result<Status, DbError> {
        let mut tx = self.pool.begin().await?;

        if new.is_default {
            sqlx::query("UPDATE statuses SET is_default = FALSE WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }

        let status = sqlx::query_as::<_, Status>(&format!(
            r#"
            INSERT INTO statuses (name, color, in_roadmap, is_default, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(new.name.as_str())
        .bind(new.color.as_str())
        .bind(new.in_roadmap)
        .bind(new.is_default)
        .bind(new.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(status)
    }

    /// Replace every column of a status.
    pub async fn update(&self, id: Uuid, new: NewStatus) -> Result<Status, DbError> {
        let mut tx = self.pool.begin().await?;

        if new.is_default {
            sqlx::query("UPDATE statuses SET is_default = FALSE WHERE is_default AND id <> $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let status = sqlx::query_as::<_, Status>(&format!(
            r#"
            UPDATE statuses
            SET name = $2, color = $3, in_roadmap = $4, is_default = $5, sort_order = $6
            WHERE id = $1
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new.name.as_str())
        .bind(new.color.as_str())
        .bind(new.in_roadmap)
        .bind(new.is_default)
        .bind(new.sort_order)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("status", id))?;

        tx.commit().await?;
        Ok(status)
    }

    /// Delete a status. Posts and activity comments keep existing with a
    /// NULL status.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM statuses WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("status", id));
        }
        Ok(())
    }
}
