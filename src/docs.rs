// src/docs.rs

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "GateBook API", description = "Identidade, papéis e organizações do GateBook"),
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::verify,
        handlers::auth::verify_legacy,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::refresh,

        // --- Users ---
        handlers::auth::get_me,

        // --- RBAC ---
        handlers::rbac::list_users,
        handlers::rbac::search_users,
        handlers::rbac::list_organizations,
        handlers::rbac::set_role,
        handlers::rbac::create_invitation,

        // --- Admins ---
        handlers::admins::list_admins,
        handlers::admins::grant_admin,
        handlers::admins::revoke_admin,

        // --- Account ---
        handlers::account::memberships,
        handlers::account::invitations,
        handlers::account::overview,
        handlers::account::join,

        // --- Profile ---
        handlers::profile::get_profile,
        handlers::profile::save_profile,
        handlers::profile::profile_status,

        // --- Settings ---
        handlers::settings::get_theme,
        handlers::settings::theme_css,
        handlers::settings::put_theme,
        handlers::settings::license_status,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::SessionUser,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::RegisterResponse,
            models::auth::VerifyResponse,
            models::auth::OkResponse,
            models::auth::MeUser,
            models::auth::MeResponse,

            // --- RBAC ---
            models::rbac::Role,
            models::rbac::OrgRef,
            models::rbac::UserListItem,
            models::rbac::UserListResponse,
            models::rbac::OrganizationOwner,
            models::rbac::OrganizationItem,
            models::rbac::OrganizationListResponse,
            models::rbac::SetRolePayload,
            models::rbac::RoleTarget,
            models::rbac::SetRoleResponse,
            models::rbac::AdminItem,
            models::rbac::AdminListResponse,
            models::rbac::AdminEmailPayload,
            models::rbac::AdminChangeResponse,

            // --- Tenancy ---
            models::tenancy::Membership,
            models::tenancy::MembershipsResponse,
            models::tenancy::OpenInvitation,
            models::tenancy::InvitationsResponse,
            models::tenancy::CreateInvitationPayload,
            models::tenancy::InvitationCreated,
            models::tenancy::JoinPayload,
            models::tenancy::JoinedOrg,
            models::tenancy::JoinResponse,
            models::tenancy::AccountOverview,
            models::tenancy::LicenseStatusResponse,

            // --- Profile ---
            models::profile::Gender,
            models::profile::ProfileView,
            models::profile::ProfilePayload,
            models::profile::ProfileStatus,
            models::profile::ProfileSaved,
            models::profile::ProfileResponse,

            // --- Settings ---
            models::settings::ThemeVars,
            models::settings::ThemeResponse,
            models::settings::ThemeSaved,
        )
    ),
    tags(
        (name = "Auth", description = "Registro, verificação de e-mail e sessão"),
        (name = "Users", description = "Identidade da sessão atual"),
        (name = "RBAC", description = "Listagens e troca de papéis (staff e owners)"),
        (name = "Admins", description = "Gestão de administradores (somente superadmin)"),
        (name = "Account", description = "Organizações e convites do próprio usuário"),
        (name = "Profile", description = "Dados pessoais do usuário"),
        (name = "Settings", description = "Tema global e licença")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("gb_session"))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in ["/auth/login", "/me", "/admin/roles/set-role", "/admin/admins/grant", "/account/join", "/profile", "/theme.css"] {
            assert!(doc.paths.paths.contains_key(path), "faltando {path}");
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("session_cookie"));
    }
}
