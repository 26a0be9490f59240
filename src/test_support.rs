// src/test_support.rs

//! Banco descartável para os testes de integração dos serviços.
//!
//! Cada `TestDb` cria um banco novo no servidor de `DATABASE_URL`, aplica as migrações
//! e devolve um `AppState` completo. Sem `DATABASE_URL` o teste é pulado.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, PgConnection, PgPool,
};
use uuid::Uuid;

use crate::{
    config::{AppState, Settings},
    models::{auth::SessionUser, rbac::Role},
    services::mailer::testing::MemoryMailer,
};

pub struct TestDb {
    pub pool: PgPool,
    admin: PgConnectOptions,
    name: String,
}

impl TestDb {
    pub async fn new() -> Result<Option<Self>> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("Pulando teste de integração: DATABASE_URL não definido");
            return Ok(None);
        };

        let admin: PgConnectOptions = url.parse().context("DATABASE_URL inválido")?;
        let name = format!("gatebook_test_{}", Uuid::new_v4().simple());

        let mut conn = PgConnection::connect_with(&admin)
            .await
            .context("falha ao conectar no servidor de teste")?;
        sqlx::raw_sql(&format!(r#"CREATE DATABASE "{name}""#))
            .execute(&mut conn)
            .await
            .context("falha ao criar banco de teste")?;
        conn.close().await?;

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(admin.clone().database(&name))
            .await
            .context("falha ao conectar no banco de teste")?;
        sqlx::migrate!().run(&pool).await?;

        Ok(Some(Self { pool, admin, name }))
    }

    pub fn state(&self) -> AppState {
        let settings = Settings::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://gatebook@127.0.0.1/gatebook".to_string()),
            _ => None,
        })
        .expect("configuração mínima de teste");
        AppState::build(self.pool.clone(), settings, Arc::new(MemoryMailer::default()))
    }

    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        let mut conn = PgConnection::connect_with(&self.admin).await?;
        sqlx::raw_sql(&format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, self.name))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

/// Usuário já verificado com o papel dado.
pub async fn insert_user(pool: &PgPool, email: &str, role: Role) -> Result<SessionUser> {
    let user = sqlx::query_as::<_, SessionUser>(
        r#"
        INSERT INTO users (email, password_hash, role, email_verified_at)
        VALUES ($1, 'x', $2, now())
        RETURNING id, email, role
        "#,
    )
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await
    .context("insert user")?;
    Ok(user)
}

pub async fn insert_org(pool: &PgPool, name: &str, owner_id: Uuid) -> Result<Uuid> {
    let id = sqlx::query_scalar("INSERT INTO organizations (name, owner_id) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(owner_id)
        .fetch_one(pool)
        .await
        .context("insert organization")?;
    Ok(id)
}

pub async fn add_member(pool: &PgPool, org_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO organization_members (org_id, user_id) VALUES ($1, $2)")
        .bind(org_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("insert membership")?;
    Ok(())
}

pub async fn insert_invitation(
    pool: &PgPool,
    org_id: Uuid,
    email: &str,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<Uuid> {
    let id = sqlx::query_scalar(
        "INSERT INTO invitations (org_id, email, token, expires_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(org_id)
    .bind(email)
    .bind(token)
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .context("insert invitation")?;
    Ok(id)
}

pub async fn role_of(pool: &PgPool, user_id: Uuid) -> Result<Role> {
    let role = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(role)
}
