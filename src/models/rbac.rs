// src/models/rbac.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

// --- Enum de papéis (mapeia o tipo `user_role` do Postgres) ---
//
// Duas hierarquias: organização (user < viewer < deputy < owner) e plataforma (admin < superadmin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Viewer,
    Deputy,
    Owner,
    Admin,
    Superadmin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::User,
        Role::Viewer,
        Role::Deputy,
        Role::Owner,
        Role::Admin,
        Role::Superadmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Viewer => "viewer",
            Role::Deputy => "deputy",
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Papéis de plataforma (admin, superadmin).
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| AppError::validation("role", "Unbekannte Rolle."))
    }
}

// ---
// Listagem de usuários
// ---

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Busca livre em e-mail, nome e sobrenome.
    pub query: Option<String>,
    /// Alias legado de `query`.
    pub q: Option<String>,
    /// Filtro exato por papel; valores desconhecidos são ignorados.
    pub role: Option<String>,
    // `all=1` é aceito e ignorado: sem busca nem papel o resultado já é só a visibilidade
}

impl UserListQuery {
    pub fn search_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .or(self.q.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn role_filter(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LegacySearchQuery {
    pub q: Option<String>,
}

// Org resumida que aparece dentro de um item de usuário
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrgRef {
    pub id: Uuid,
    #[schema(example = "Musterfirma GmbH")]
    pub name: String,
    pub logo_url: Option<String>,
}

// Linha de membership carregada em lote para os itens da listagem
#[derive(Debug, FromRow)]
pub struct UserMembershipRow {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub org_name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub id: Uuid,
    #[schema(example = "max@example.de")]
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    #[sqlx(skip)]
    pub organizations: Vec<OrgRef>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserListItem>,
}

// ---
// Listagem de organizações
// ---

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrganizationListQuery {
    pub query: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    pub status: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub owner_email: String,
    pub owner_role: Role,
    pub member_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationOwner {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationItem {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    #[schema(example = "active")]
    pub status: String,
    #[schema(example = "free")]
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub owner: OrganizationOwner,
    pub member_count: i64,
}

impl From<OrganizationRow> for OrganizationItem {
    fn from(row: OrganizationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            logo_url: row.logo_url,
            status: row.status,
            plan: row.plan,
            created_at: row.created_at,
            owner: OrganizationOwner {
                id: row.owner_id,
                email: row.owner_email,
                role: row.owner_role,
            },
            member_count: row.member_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationListResponse {
    pub items: Vec<OrganizationItem>,
}

// ---
// Troca de papel
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetRolePayload {
    pub user_id: Option<Uuid>,

    #[validate(email(message = "Ungültige E-Mail-Adresse."))]
    #[schema(example = "max@example.de")]
    #[serde(default, deserialize_with = "crate::models::trimmed_opt")]
    pub email: Option<String>,

    pub role: Role,
}

/// Alvo da troca de papel: por id ou por e-mail (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Id(Uuid),
    Email(String),
}

impl SetRolePayload {
    pub fn target(&self) -> Result<TargetRef, AppError> {
        match (self.user_id, self.email.as_deref().map(str::trim)) {
            (Some(id), _) => Ok(TargetRef::Id(id)),
            (None, Some(email)) if !email.is_empty() => Ok(TargetRef::Email(email.to_lowercase())),
            _ => Err(AppError::validation("userId", "userId oder email erforderlich.")),
        }
    }
}

// Projeção do usuário devolvida pela troca de papel
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleTarget {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetRoleResponse {
    pub ok: bool,
    pub user: RoleTarget,
}

// ---
// Administradores
// ---

#[derive(Debug, FromRow)]
pub struct AdminRow {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminItem {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminListResponse {
    pub items: Vec<AdminItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdminEmailPayload {
    #[validate(email(message = "Ungültige E-Mail-Adresse."))]
    #[schema(example = "anna@example.de")]
    #[serde(deserialize_with = "crate::models::trimmed")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminChangeResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("SuperAdmin".parse::<Role>().unwrap(), Role::Superadmin);
        assert_eq!(" viewer ".parse::<Role>().unwrap(), Role::Viewer);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Deputy).unwrap(), "\"deputy\"");
        let parsed: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(parsed, Role::Owner);
    }

    #[test]
    fn unknown_role_filter_is_ignored() {
        let q = UserListQuery {
            role: Some("wizard".into()),
            ..Default::default()
        };
        assert_eq!(q.role_filter(), None);
    }

    #[test]
    fn search_text_prefers_query_and_trims() {
        let q = UserListQuery {
            query: Some("  anna ".into()),
            q: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(q.search_text(), Some("anna"));

        let blank = UserListQuery {
            query: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(blank.search_text(), None);
    }

    #[test]
    fn padded_target_emails_pass_validation() {
        let by_email: SetRolePayload =
            serde_json::from_str(r#"{"email":" Max@Example.de ","role":"viewer"}"#).unwrap();
        assert!(by_email.validate().is_ok());

        let admin: AdminEmailPayload = serde_json::from_str(r#"{"email":"  anna@example.de "}"#).unwrap();
        assert_eq!(admin.email, "anna@example.de");
        assert!(admin.validate().is_ok());
    }

    #[test]
    fn set_role_target_requires_id_or_email() {
        let by_email: SetRolePayload =
            serde_json::from_str(r#"{"email":" Max@Example.de ","role":"viewer"}"#).unwrap();
        assert_eq!(by_email.target().unwrap(), TargetRef::Email("max@example.de".into()));

        let neither: SetRolePayload = serde_json::from_str(r#"{"role":"viewer"}"#).unwrap();
        assert!(neither.target().is_err());
    }

    #[test]
    fn set_role_rejects_unknown_fields() {
        let res = serde_json::from_str::<SetRolePayload>(r#"{"email":"a@b.de","role":"viewer","force":true}"#);
        assert!(res.is_err());
    }
}
