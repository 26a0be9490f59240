// src/db/verification_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::auth::VerificationToken};

#[derive(Clone)]
pub struct VerificationRepository {
    pool: PgPool,
}

impl VerificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationToken, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at, consumed_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Consome o token numa única instrução condicional.
    /// Só um de dois pedidos concorrentes recebe o `user_id`; o outro recebe `None`.
    pub async fn consume<'e, E>(&self, executor: E, token: &str) -> Result<Option<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE verification_tokens
            SET consumed_at = now()
            WHERE token = $1 AND consumed_at IS NULL AND expires_at > now()
            RETURNING user_id
            "#,
        )
        .bind(token)
        .fetch_optional(executor)
        .await?;
        Ok(user_id)
    }

    // Apenas para diagnóstico no log quando o consumo falha
    pub async fn find(&self, token: &str) -> Result<Option<VerificationToken>, AppError> {
        let row = sqlx::query_as::<_, VerificationToken>(
            "SELECT id, user_id, token, expires_at, consumed_at, created_at FROM verification_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
