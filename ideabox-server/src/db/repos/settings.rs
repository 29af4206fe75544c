//! Settings repository (key -> JSON value)

use std::collections::HashMap;

use serde_json::Value;
use sqlx::PgPool;

use super::DbError;
use crate::models::{SettingKey, SiteSettings};

pub struct SettingsRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> Result<HashMap<String, Value>, DbError> {
        let rows: Vec<(String, Value)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn site(&self) -> Result<SiteSettings, DbError> {
        Ok(SiteSettings::from_rows(&self.all().await?))
    }

    /// Write several settings at once. A `null` value deletes the row so the
    /// default applies again.
    pub async fn set_many(&self, values: &[(SettingKey, Value)]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            if value.is_null() {
                sqlx::query("DELETE FROM settings WHERE key = $1")
                    .bind(key.as_str())
                    .execute(&mut *tx)
                    .await?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO settings (key, value) VALUES ($1, $2)
                    ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                    "#,
                )
                .bind(key.as_str())
                .bind(value)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
