// src/db/session_repo.rs
//
// Sessões persistidas do formato antigo. Só leitura (e remoção no logout);
// sessões novas são sempre o cookie HMAC.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::AppError;

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

/// O valor do cookie pode ser o id da sessão, o hash já armazenado ou o token cru.
pub(crate) fn token_hash(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_user_id(&self, raw: &str) -> Result<Option<Uuid>, AppError> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM sessions
            WHERE (id = $1 OR token_hash = $1 OR token_hash = $2)
              AND expires_at > now()
            LIMIT 1
            "#,
        )
        .bind(raw)
        .bind(token_hash(raw))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    pub async fn delete(&self, raw: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE id = $1 OR token_hash = $1 OR token_hash = $2",
        )
        .bind(raw)
        .bind(token_hash(raw))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_lowercase_hex_sha256() {
        assert_eq!(
            token_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
