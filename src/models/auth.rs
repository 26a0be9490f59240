// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::rbac::Role;

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,

    #[serde(skip_serializing)] // nunca sai na resposta
    pub password_hash: String,

    pub role: Role,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identidade resolvida da requisição: sempre relida do banco.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

// Dados para registro de um novo usuário
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterUserPayload {
    #[validate(email(message = "Ungültige E-Mail-Adresse."))]
    #[schema(example = "max@example.de")]
    #[serde(deserialize_with = "crate::models::trimmed")]
    pub email: String,

    #[validate(length(min = 8, max = 72, message = "Das Passwort muss 8 bis 72 Zeichen lang sein."))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Die Passwörter stimmen nicht überein."))]
    pub confirm_password: String,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginUserPayload {
    #[validate(email(message = "Ungültige E-Mail-Adresse."))]
    #[schema(example = "max@example.de")]
    #[serde(deserialize_with = "crate::models::trimmed")]
    pub email: String,

    #[validate(length(min = 1, max = 72, message = "Passwort erforderlich."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    #[validate(length(min = 32, message = "Ungültiger Token."))]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub accepted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub verified: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeUser {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub email_verified: bool,
    pub avatar_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<MeUser>,
}

impl MeResponse {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user: None,
        }
    }
}

// ---
// Token de verificação de e-mail
// ---

#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Consumed,
    Expired,
}

impl VerificationToken {
    /// Estado no instante `now`. Consumido tem precedência sobre expirado.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.consumed_at.is_some() {
            TokenState::Consumed
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}
