// src/db/settings_repo.rs

use serde_json::Value;
use sqlx::{types::Json, Executor, PgPool, Postgres};

use crate::common::error::AppError;

// Chave/valor global em `settings`
#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Chave ausente = None; o serviço decide o padrão
    pub async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let value = sqlx::query_scalar::<_, Value>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn put<'e, E>(&self, executor: E, key: &str, value: &Value) -> Result<Value, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // UPSERT (Insert or Update)
        let stored = sqlx::query_scalar::<_, Value>(
            r#"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            RETURNING value
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .fetch_one(executor)
        .await?;
        Ok(stored)
    }
}
