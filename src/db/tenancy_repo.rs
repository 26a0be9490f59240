// src/db/tenancy_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        rbac::Role,
        tenancy::{Invitation, License, Membership, OpenInvitation, Organization},
    },
};

const INVITATION_COLUMNS: &str = "id, org_id, email, role, token, expires_at, accepted_at, created_at";

#[derive(Clone)]
pub struct TenancyRepository {
    pool: PgPool,
}

impl TenancyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let org = sqlx::query_as::<_, Organization>(
            "SELECT id, name, owner_id, logo_url, plan, status, created_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(org)
    }

    // Memberships do usuário, mais antigas primeiro
    pub async fn memberships_of(&self, user_id: Uuid) -> Result<Vec<Membership>, AppError> {
        let rows = sqlx::query_as::<_, Membership>(
            r#"
            SELECT o.id AS org_id, o.name AS org_name, o.plan, o.status, m.created_at AS since
            FROM organization_members m
            JOIN organizations o ON o.id = m.org_id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Convites em aberto para este e-mail: não aceitos, não expirados, mais novos primeiro.
    pub async fn open_invitations_for(&self, email: &str) -> Result<Vec<OpenInvitation>, AppError> {
        let rows = sqlx::query_as::<_, OpenInvitation>(
            r#"
            SELECT i.id, i.token, i.role, i.expires_at, o.id AS org_id, o.name AS org_name
            FROM invitations i
            JOIN organizations o ON o.id = i.org_id
            WHERE lower(i.email) = lower($1)
              AND i.accepted_at IS NULL
              AND i.expires_at > now()
            ORDER BY i.created_at DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_invitation<'e, E>(
        &self,
        executor: E,
        org_id: Uuid,
        email: &str,
        role: Role,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            INSERT INTO invitations (org_id, email, role, token, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(org_id)
        .bind(email)
        .bind(role)
        .bind(token)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;
        Ok(invitation)
    }

    // Trava o convite até o fim da transação de aceite
    pub async fn lock_invitation<'e, E>(
        &self,
        executor: E,
        token: &str,
    ) -> Result<Option<Invitation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(executor)
        .await?;
        Ok(invitation)
    }

    pub async fn organization_name<'e, E>(&self, executor: E, org_id: Uuid) -> Result<Option<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM organizations WHERE id = $1")
            .bind(org_id)
            .fetch_optional(executor)
            .await?;
        Ok(name)
    }

    pub async fn is_member<'e, E>(&self, executor: E, org_id: Uuid, user_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM organization_members WHERE org_id = $1 AND user_id = $2)",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn add_member<'e, E>(&self, executor: E, org_id: Uuid, user_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("INSERT INTO organization_members (org_id, user_id) VALUES ($1, $2)")
            .bind(org_id)
            .bind(user_id)
            .execute(executor)
            .await
            .map_err(|e| match &e {
                // Corrida com outro aceite do mesmo usuário
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::AlreadyMember,
                _ => AppError::DatabaseError(e),
            })?;
        Ok(())
    }

    pub async fn mark_invitation_accepted<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE invitations SET accepted_at = now() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete_invitation<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Licença mais recente de uma organização que o usuário possui ou da qual é membro.
    pub async fn latest_license_for(&self, user_id: Uuid) -> Result<Option<License>, AppError> {
        let license = sqlx::query_as::<_, License>(
            r#"
            SELECT l.id, l.org_id, l.status, l.valid_to, l.created_at
            FROM licenses l
            WHERE l.org_id IN (
                SELECT id FROM organizations WHERE owner_id = $1
                UNION
                SELECT org_id FROM organization_members WHERE user_id = $1
            )
            ORDER BY l.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(license)
    }
}
