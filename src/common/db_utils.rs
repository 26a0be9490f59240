// src/common/db_utils.rs

use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::AppError;

// ---
// Helper: transação SERIALIZABLE
// ---
/// Abre uma transação com isolamento SERIALIZABLE.
/// Usada onde uma contagem decide uma escrita (ex.: "ainda resta outro superadmin?").
pub(crate) async fn begin_serializable(
    pool: &PgPool,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // O '?' converte sqlx::Error -> AppError::DatabaseError
    let mut tx = pool.begin().await?;

    // Precisa ser o primeiro comando da transação
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Abortos de concorrência do Postgres: falha de serialização (40001) ou deadlock (40P01).
/// Em ambos outra transação venceu e o cliente pode reenviar.
pub(crate) fn is_serialization_failure(err: &AppError) -> bool {
    match err {
        AppError::DatabaseError(sqlx::Error::Database(db_err)) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}
