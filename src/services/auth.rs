// src/services/auth.rs

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    config::Settings,
    db::{ProfileRepository, UserRepository, VerificationRepository},
    models::auth::{MeResponse, MeUser, SessionUser},
    services::{
        mailer::{verification_mail, Mailer},
        session::SessionCodec,
    },
};

/// Token aleatório em base64url (sem padding), com `bytes` bytes de entropia.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    verification_repo: VerificationRepository,
    profile_repo: ProfileRepository,
    session_codec: SessionCodec,
    mailer: Arc<dyn Mailer>,
    settings: Arc<Settings>,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        verification_repo: VerificationRepository,
        profile_repo: ProfileRepository,
        session_codec: SessionCodec,
        mailer: Arc<dyn Mailer>,
        settings: Arc<Settings>,
        pool: PgPool,
    ) -> Self {
        Self {
            user_repo,
            verification_repo,
            profile_repo,
            session_codec,
            mailer,
            settings,
            pool,
        }
    }

    /// Cria o usuário e o token de verificação na mesma transação; o e-mail sai depois do commit.
    pub async fn register_user(&self, email: &str, password: &str) -> Result<(), AppError> {
        let email = normalize_email(email);

        // 1. Hashing (fora da transação, não toca no banco)
        let password_clone = password.to_owned();
        let hashed_password = tokio::task::spawn_blocking(move || {
            hash(&password_clone, bcrypt::DEFAULT_COST)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        // --- INÍCIO DA TRANSAÇÃO ---
        let mut tx = self.pool.begin().await?;

        // 2. Cria o usuário (e-mail duplicado vira RegistrationConflict)
        let user = self
            .user_repo
            .create_user(&mut *tx, &email, &hashed_password)
            .await?;

        // 3. Token de verificação
        let token = random_token(32);
        let expires_at = Utc::now() + Duration::seconds(self.settings.verify_ttl_secs);
        self.verification_repo
            .create(&mut *tx, user.id, &token, expires_at)
            .await?;

        tx.commit().await?;
        // --- FIM DA TRANSAÇÃO ---

        tracing::info!(user_id = %user.id, "🆕 Usuário registrado, aguardando verificação");

        // 4. Falha no envio não desfaz o registro
        let mail = verification_mail(&email, &self.settings.verify_link(&token));
        if let Err(e) = self.mailer.send(mail).await {
            tracing::warn!(user_id = %user.id, error = %e, "⚠️ Falha ao enviar e-mail de verificação");
        }

        Ok(())
    }

    /// Consome o token e marca o e-mail como verificado, atomicamente.
    pub async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        let token = token.trim();
        let mut tx = self.pool.begin().await?;

        let Some(user_id) = self.verification_repo.consume(&mut *tx, token).await? else {
            // Motivo só no log; o cliente sempre recebe a mesma resposta
            if let Some(row) = self.verification_repo.find(token).await? {
                tracing::debug!(state = ?row.state_at(Utc::now()), "Token de verificação rejeitado");
            }
            return Err(AppError::TokenGone);
        };

        self.user_repo.mark_email_verified(&mut *tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(%user_id, "✅ E-mail verificado");
        Ok(())
    }

    /// Devolve o token de sessão assinado.
    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AppError::Unauthenticated)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::Unauthenticated);
        }

        // Só depois da senha: quem não conhece a senha não descobre o estado da conta
        if user.email_verified_at.is_none() {
            return Err(AppError::EmailNotVerified);
        }

        tracing::info!(user_id = %user.id, "🔑 Login");
        Ok(self.session_codec.mint(user.id))
    }

    /// Novo token para uma sessão ainda válida.
    pub fn refresh_session(&self, user: &SessionUser) -> String {
        self.session_codec.mint(user.id)
    }

    pub async fn me(&self, user: Option<SessionUser>) -> Result<MeResponse, AppError> {
        let Some(user) = user else {
            return Ok(MeResponse::anonymous());
        };

        // Usuário removido entre a resolução e aqui: trata como anônimo
        let Some(row) = self.user_repo.find_by_id(user.id).await? else {
            return Ok(MeResponse::anonymous());
        };

        let avatar_url = self
            .profile_repo
            .avatar_of(row.id)
            .await?
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_avatar());

        Ok(MeResponse {
            authenticated: true,
            user: Some(MeUser {
                id: row.id,
                role: row.role,
                email: row.email,
                email_verified: row.email_verified_at.is_some(),
                avatar_url,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    #[test]
    fn random_token_is_url_safe_and_long_enough() {
        let token = random_token(32);
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, random_token(32));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Max@Example.DE "), "max@example.de");
    }

    #[tokio::test]
    async fn verification_token_is_single_use() -> anyhow::Result<()> {
        let Some(db) = TestDb::new().await? else { return Ok(()) };
        let state = db.state();

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ('neu@example.de', 'x') RETURNING id",
        )
        .fetch_one(&db.pool)
        .await?;
        let token = random_token(32);
        sqlx::query("INSERT INTO verification_tokens (user_id, token, expires_at) VALUES ($1, $2, now() + interval '1 hour')")
            .bind(user_id)
            .bind(&token)
            .execute(&db.pool)
            .await?;

        state.auth_service.verify_email(&token).await?;
        let first: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT email_verified_at FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&db.pool)
                .await?;
        assert!(first.is_some());

        let again = state.auth_service.verify_email(&token).await.unwrap_err();
        assert!(matches!(again, AppError::TokenGone), "{again:?}");

        let second: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT email_verified_at FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&db.pool)
                .await?;
        assert_eq!(first, second);

        db.close().await
    }

    #[tokio::test]
    async fn expired_verification_token_is_gone() -> anyhow::Result<()> {
        let Some(db) = TestDb::new().await? else { return Ok(()) };
        let state = db.state();

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ('alt@example.de', 'x') RETURNING id",
        )
        .fetch_one(&db.pool)
        .await?;
        let token = random_token(32);
        sqlx::query("INSERT INTO verification_tokens (user_id, token, expires_at) VALUES ($1, $2, now() - interval '1 minute')")
            .bind(user_id)
            .bind(&token)
            .execute(&db.pool)
            .await?;

        let err = state.auth_service.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AppError::TokenGone), "{err:?}");

        let verified: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT email_verified_at FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&db.pool)
                .await?;
        assert!(verified.is_none());

        db.close().await
    }
}
