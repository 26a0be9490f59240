// src/common/error.rs

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::middleware::i18n::Locale;

// Taxonomia de erros da API. Cada variante tem status HTTP e código fixos.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("Usuário não autenticado")]
    Unauthenticated,

    #[error("E-mail ainda não verificado")]
    EmailNotVerified,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Ator não pode editar este alvo")]
    ForbiddenTarget,

    #[error("Ator não pode conceder este papel")]
    ForbiddenEscalation,

    #[error("Alvo não é membro de uma organização do owner")]
    NotMemberOfOwnedOrg,

    #[error("Apenas superadmins podem rebaixar um superadmin")]
    CannotDowngradeSuperadmin,

    #[error("O último superadmin não pode ser rebaixado")]
    LastSuperadminProtected,

    #[error("Superadmins não são alterados por este caminho")]
    ImmutableSuperadmin,

    #[error("Superadmins não podem perder o papel de admin")]
    CannotRevokeSuperadmin,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Usuário alvo não encontrado")]
    TargetNotFound,

    #[error("Organização não encontrada")]
    OrganizationNotFound,

    #[error("Convite não encontrado")]
    InviteNotFound,

    #[error("Convite expirado ou já aceito")]
    InviteGone,

    #[error("Convite pertence a outro e-mail")]
    InviteEmailMismatch,

    // Expirado, já consumido ou inexistente: propositalmente indistinguíveis
    #[error("Token expirado ou já utilizado")]
    TokenGone,

    #[error("Registro não é possível")]
    RegistrationConflict,

    #[error("Usuário já é membro da organização")]
    AlreadyMember,

    // Transação SERIALIZABLE abortada por escrita concorrente; o cliente reenvia
    #[error("Modificação concorrente")]
    ConcurrentModification,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),
}

// Corpo de erro enviado ao cliente
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::EmailNotVerified => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::ForbiddenTarget
            | AppError::ForbiddenEscalation
            | AppError::NotMemberOfOwnedOrg
            | AppError::CannotDowngradeSuperadmin
            | AppError::InviteEmailMismatch => StatusCode::FORBIDDEN,
            AppError::LastSuperadminProtected
            | AppError::ImmutableSuperadmin
            | AppError::CannotRevokeSuperadmin
            | AppError::RegistrationConflict
            | AppError::AlreadyMember
            | AppError::ConcurrentModification => StatusCode::CONFLICT,
            AppError::UserNotFound
            | AppError::TargetNotFound
            | AppError::OrganizationNotFound
            | AppError::InviteNotFound => StatusCode::NOT_FOUND,
            AppError::TokenGone | AppError::InviteGone => StatusCode::GONE,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código estável, lido pelo frontend.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "BAD_REQUEST",
            AppError::Unauthenticated => "UNAUTHORIZED",
            AppError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::ForbiddenTarget => "FORBIDDEN_TARGET",
            AppError::ForbiddenEscalation => "FORBIDDEN_ESCALATION",
            AppError::NotMemberOfOwnedOrg => "FORBIDDEN_NOT_MEMBER_OF_OWNER_ORG",
            AppError::CannotDowngradeSuperadmin => "CANNOT_DOWNGRADE_SUPERADMIN",
            AppError::LastSuperadminProtected => "LAST_SUPERADMIN",
            AppError::ImmutableSuperadmin => "IMMUTABLE_SUPERADMIN",
            AppError::CannotRevokeSuperadmin => "CANNOT_REVOKE_SUPERADMIN",
            AppError::UserNotFound | AppError::TargetNotFound => "USER_NOT_FOUND",
            AppError::OrganizationNotFound => "ORG_NOT_FOUND",
            AppError::InviteNotFound => "INVITE_NOT_FOUND",
            AppError::InviteGone => "INVITE_EXPIRED",
            AppError::InviteEmailMismatch => "INVITE_EMAIL_MISMATCH",
            AppError::TokenGone => "TOKEN_EXPIRED",
            AppError::RegistrationConflict => "CONFLICT",
            AppError::AlreadyMember => "ALREADY_MEMBER",
            AppError::ConcurrentModification => "CONFLICT",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_) => "SERVER_ERROR",
        }
    }

    fn message(&self, locale: &Locale) -> String {
        let en = locale.is_english();
        let text = match self {
            AppError::Validation { message, .. } => {
                return if en {
                    "Please check your input.".to_string()
                } else {
                    message.clone()
                };
            }
            AppError::Unauthenticated if en => "Not signed in.",
            AppError::Unauthenticated => "Keine gültige Sitzung.",
            // Neutro de propósito: não revela se a conta existe
            AppError::EmailNotVerified if en => "Sign-in not possible.",
            AppError::EmailNotVerified => "Anmeldung nicht möglich.",
            AppError::Forbidden
            | AppError::ForbiddenTarget
            | AppError::ForbiddenEscalation
            | AppError::NotMemberOfOwnedOrg
            | AppError::InviteEmailMismatch
                if en =>
            {
                "You are not allowed to perform this action."
            }
            AppError::Forbidden
            | AppError::ForbiddenTarget
            | AppError::ForbiddenEscalation
            | AppError::NotMemberOfOwnedOrg
            | AppError::InviteEmailMismatch => "Keine Berechtigung für diese Aktion.",
            AppError::CannotDowngradeSuperadmin if en => "Only a superadmin can change a superadmin.",
            AppError::CannotDowngradeSuperadmin => "Nur Superadmins dürfen Superadmins ändern.",
            AppError::LastSuperadminProtected if en => "The last superadmin cannot be downgraded.",
            AppError::LastSuperadminProtected => "Der letzte Superadmin kann nicht herabgestuft werden.",
            AppError::ImmutableSuperadmin | AppError::CannotRevokeSuperadmin if en => {
                "Superadmins cannot be changed here."
            }
            AppError::ImmutableSuperadmin | AppError::CannotRevokeSuperadmin => {
                "Superadmins können hier nicht geändert werden."
            }
            AppError::UserNotFound | AppError::TargetNotFound if en => "User not found.",
            AppError::UserNotFound | AppError::TargetNotFound => "Benutzer nicht gefunden.",
            AppError::OrganizationNotFound if en => "Organization not found.",
            AppError::OrganizationNotFound => "Organisation nicht gefunden.",
            AppError::InviteNotFound if en => "Invitation not found.",
            AppError::InviteNotFound => "Einladung nicht gefunden.",
            AppError::InviteGone if en => "Invitation expired or already used.",
            AppError::InviteGone => "Einladung abgelaufen oder bereits verwendet.",
            AppError::TokenGone if en => "Token invalid or expired.",
            AppError::TokenGone => "Token ungültig oder abgelaufen.",
            AppError::RegistrationConflict if en => "Registration currently not possible.",
            AppError::RegistrationConflict => "Registrierung derzeit nicht möglich.",
            AppError::AlreadyMember if en => "Already a member of this organization.",
            AppError::AlreadyMember => "Bereits Mitglied dieser Organisation.",
            AppError::ConcurrentModification if en => "The data was changed concurrently. Please retry.",
            AppError::ConcurrentModification => "Die Daten wurden zwischenzeitlich geändert. Bitte erneut versuchen.",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
                if en =>
            {
                "Internal error."
            }
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_) => "Interner Fehler.",
        };
        text.to_string()
    }

    /// Converte para o corpo HTTP no idioma pedido. Erros 500 são logados aqui, com detalhes.
    pub fn to_api_error(self, locale: &Locale) -> ApiError {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Erro interno do servidor: {}", self);
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        ApiError {
            status,
            code: self.code(),
            message: self.message(locale),
            field,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

// O validator devolve um mapa; reportamos o primeiro campo (ordem alfabética, estável).
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "Eingaben prüfen.".to_string());
                AppError::validation(camel_case(field), message)
            }
            None => AppError::Validation {
                field: None,
                message: "Eingaben prüfen.".to_string(),
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        AppError::Validation {
            field: field_from_serde_message(&text),
            message: "Eingaben prüfen.".to_string(),
        }
    }
}

// Campos Rust são snake_case; o cliente conhece camelCase
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Extrai o nome do campo de mensagens do serde ("unknown field `x`", "missing field `x`").
pub(crate) fn field_from_serde_message(text: &str) -> Option<String> {
    ["unknown field `", "missing field `", "unknown variant `"]
        .iter()
        .find_map(|marker| {
            let start = text.find(marker)?;
            let rest = &text[start + marker.len()..];
            rest.find('`').map(|end| rest[..end].to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_failures_map_to_forbidden_and_conflict() {
        assert_eq!(AppError::ForbiddenEscalation.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotMemberOfOwnedOrg.code(), "FORBIDDEN_NOT_MEMBER_OF_OWNER_ORG");
        assert_eq!(AppError::LastSuperadminProtected.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::LastSuperadminProtected.code(), "LAST_SUPERADMIN");
        assert_eq!(AppError::TokenGone.status(), StatusCode::GONE);
        assert_eq!(AppError::TargetNotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn used_invitations_are_gone_not_missing() {
        assert_eq!(AppError::InviteNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InviteGone.status(), StatusCode::GONE);
        assert_eq!(AppError::InviteGone.code(), "INVITE_EXPIRED");

        let de = AppError::InviteGone.to_api_error(&Locale("de".into()));
        assert_eq!(de.message, "Einladung abgelaufen oder bereits verwendet.");
    }

    #[test]
    fn server_errors_hide_details() {
        let err = AppError::InternalServerError(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let api = err.to_api_error(&Locale::default());
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "SERVER_ERROR");
        assert!(!api.message.contains("10.0.0.3"));
    }

    #[test]
    fn messages_follow_locale() {
        let de = AppError::UserNotFound.to_api_error(&Locale("de".into()));
        let en = AppError::UserNotFound.to_api_error(&Locale("en".into()));
        assert_eq!(de.message, "Benutzer nicht gefunden.");
        assert_eq!(en.message, "User not found.");
    }

    #[test]
    fn validator_fields_are_reported_in_camel_case() {
        assert_eq!(camel_case("confirm_password"), "confirmPassword");
        assert_eq!(camel_case("email"), "email");
    }

    #[test]
    fn serde_messages_name_the_field() {
        assert_eq!(
            field_from_serde_message("Failed to deserialize the JSON body: unknown field `isAdmin`, expected `email`"),
            Some("isAdmin".to_string())
        );
        assert_eq!(
            field_from_serde_message("missing field `role` at line 1 column 20"),
            Some("role".to_string())
        );
        assert_eq!(field_from_serde_message("EOF while parsing"), None);
    }
}
