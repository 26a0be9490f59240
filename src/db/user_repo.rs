// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{SessionUser, User},
        rbac::{Role, RoleTarget},
    },
};

const USER_COLUMNS: &str =
    "id, email, password_hash, role, email_verified_at, created_at, updated_at";

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo e-mail (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Projeção mínima usada pela resolução de identidade.
    pub async fn find_session_user(&self, id: Uuid) -> Result<Option<SessionUser>, AppError> {
        let user = sqlx::query_as::<_, SessionUser>("SELECT id, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // Cria um novo usuário; e-mail duplicado vira conflito neutro
    pub async fn create_user<'e, E>(
        &self,
        executor: E,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::RegistrationConflict
            }
            _ => AppError::DatabaseError(e),
        })
    }

    /// Marca o e-mail como verificado; uma verificação anterior é preservada.
    pub async fn mark_email_verified<'e, E>(&self, executor: E, user_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified_at = COALESCE(email_verified_at, now()), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    // ---
    // Leituras com lock, usadas dentro das transações de papel
    // ---

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<RoleTarget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let target = sqlx::query_as::<_, RoleTarget>(
            "SELECT id, email, role, created_at FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(target)
    }

    pub async fn lock_by_email<'e, E>(
        &self,
        executor: E,
        email: &str,
    ) -> Result<Option<RoleTarget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let target = sqlx::query_as::<_, RoleTarget>(
            "SELECT id, email, role, created_at FROM users WHERE lower(email) = lower($1) FOR UPDATE",
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;
        Ok(target)
    }

    /// Ids de todos os superadmins, travados em ordem de id até o fim da transação.
    /// Quem trava este conjunto antes do alvo nunca fica em espera circular com outra demoção.
    pub async fn lock_superadmins<'e, E>(&self, executor: E) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar("SELECT id FROM users WHERE role = $1 ORDER BY id FOR UPDATE")
            .bind(Role::Superadmin)
            .fetch_all(executor)
            .await?;
        Ok(ids)
    }

    pub async fn update_role<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        role: Role,
    ) -> Result<RoleTarget, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, RoleTarget>(
            r#"
            UPDATE users SET role = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, email, role, created_at
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_one(executor)
        .await?;
        Ok(updated)
    }
}
