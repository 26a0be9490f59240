// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{auth::SessionUser, profile::ProfileView, rbac::Role};

// ---
// 1. Organization
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub logo_url: Option<String>,
    pub plan: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ---
// 2. Membership (visão do próprio usuário)
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub org_id: Uuid,
    #[schema(example = "Musterfirma GmbH")]
    pub org_name: String,
    pub plan: String,
    pub status: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembershipsResponse {
    pub memberships: Vec<Membership>,
}

// ---
// 3. Invitation
// ---
#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Aceitável: ainda não aceita e não expirada.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && now < self.expires_at
    }

    pub fn is_addressed_to(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

// Convite em aberto, como o destinatário o vê
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenInvitation {
    pub id: Uuid,
    pub token: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub org_id: Uuid,
    pub org_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationsResponse {
    pub invitations: Vec<OpenInvitation>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateInvitationPayload {
    #[validate(email(message = "Ungültige E-Mail-Adresse."))]
    #[schema(example = "neu@example.de")]
    #[serde(deserialize_with = "crate::models::trimmed")]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationCreated {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationCreated {
    fn from(inv: Invitation) -> Self {
        Self {
            id: inv.id,
            org_id: inv.org_id,
            email: inv.email,
            role: inv.role,
            token: inv.token,
            expires_at: inv.expires_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct JoinPayload {
    #[validate(length(min = 10, message = "Ungültiger Einladungscode."))]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinedOrg {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub ok: bool,
    pub org: JoinedOrg,
    pub role: Role,
}

// ---
// 4. Overview da conta
// ---
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountOverview {
    pub user: SessionUser,
    pub profile: Option<ProfileView>,
    pub memberships: Vec<Membership>,
    pub invitations: Vec<OpenInvitation>,
}

// ---
// 5. License (somente leitura)
// ---
#[derive(Debug, Clone, FromRow)]
pub struct License {
    pub id: Uuid,
    pub org_id: Uuid,
    pub status: String,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatusResponse {
    #[schema(example = "active")]
    pub status: String,
    pub valid_to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(email: &str, expires_in: Duration, accepted: bool) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            email: email.into(),
            role: Role::Viewer,
            token: "invite-token-123".into(),
            expires_at: now + expires_in,
            accepted_at: accepted.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn open_invitations() {
        let now = Utc::now();
        assert!(invitation("a@b.de", Duration::days(1), false).is_open_at(now));
        assert!(!invitation("a@b.de", Duration::days(-1), false).is_open_at(now));
        assert!(!invitation("a@b.de", Duration::days(1), true).is_open_at(now));
    }

    #[test]
    fn invitation_email_match_ignores_case() {
        let inv = invitation("Anna@Example.DE", Duration::days(1), false);
        assert!(inv.is_addressed_to("anna@example.de"));
        assert!(!inv.is_addressed_to("max@example.de"));
    }
}
