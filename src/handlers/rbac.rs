// src/handlers/rbac.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::CurrentUser, i18n::Locale, validation::ValidatedJson},
    models::{
        rbac::{
            LegacySearchQuery, OrganizationListQuery, OrganizationListResponse, SetRolePayload,
            SetRoleResponse, UserListQuery, UserListResponse,
        },
        tenancy::{CreateInvitationPayload, InvitationCreated},
    },
};

// Rotas deste módulo ficam atrás de role_guard::<StaffOrOwner>

// GET /admin/roles/users
#[utoipa::path(
    get,
    path = "/admin/roles/users",
    tag = "RBAC",
    params(UserListQuery),
    responses(
        (status = 200, description = "Usuários visíveis ao ator (máx. 200)", body = UserListResponse),
        (status = 401, description = "Sem sessão"),
        (status = 403, description = "Papel sem acesso")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_users(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state
        .rbac_service
        .list_users(&actor, query.search_text(), query.role_filter())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(UserListResponse { items })))
}

// GET /admin/roles/search?q= (alias antigo de /users, sem filtro de papel)
#[utoipa::path(
    get,
    path = "/admin/roles/search",
    tag = "RBAC",
    params(LegacySearchQuery),
    responses((status = 200, description = "Usuários visíveis ao ator", body = UserListResponse)),
    security(("session_cookie" = []))
)]
pub async fn search_users(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<LegacySearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let items = app_state
        .rbac_service
        .list_users(&actor, search, None)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(UserListResponse { items })))
}

// GET /admin/roles/organizations
#[utoipa::path(
    get,
    path = "/admin/roles/organizations",
    tag = "RBAC",
    params(OrganizationListQuery),
    responses((status = 200, description = "Organizações (owner vê só as próprias)", body = OrganizationListResponse)),
    security(("session_cookie" = []))
)]
pub async fn list_organizations(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<OrganizationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let search = query.query.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let items = app_state
        .rbac_service
        .list_organizations(&actor, search)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(OrganizationListResponse { items })))
}

// POST /admin/roles/set-role
#[utoipa::path(
    post,
    path = "/admin/roles/set-role",
    tag = "RBAC",
    request_body = SetRolePayload,
    responses(
        (status = 200, description = "Papel aplicado (ou já era o pedido)", body = SetRoleResponse),
        (status = 403, description = "FORBIDDEN_TARGET, FORBIDDEN_ESCALATION, FORBIDDEN_NOT_MEMBER_OF_OWNER_ORG ou CANNOT_DOWNGRADE_SUPERADMIN"),
        (status = 404, description = "Alvo não encontrado"),
        (status = 409, description = "LAST_SUPERADMIN ou escrita concorrente")
    ),
    security(("session_cookie" = []))
)]
pub async fn set_role(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(payload): ValidatedJson<SetRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let target = payload.target().map_err(|e| e.to_api_error(&locale))?;

    let user = app_state
        .rbac_service
        .set_role(&actor, &target, payload.role)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(SetRoleResponse { ok: true, user })))
}

// POST /admin/organizations/{org_id}/invitations
#[utoipa::path(
    post,
    path = "/admin/organizations/{org_id}/invitations",
    tag = "RBAC",
    request_body = CreateInvitationPayload,
    params(("org_id" = Uuid, Path, description = "ID da organização")),
    responses(
        (status = 201, description = "Convite criado", body = InvitationCreated),
        (status = 403, description = "Organização de outro owner ou papel não concedível"),
        (status = 404, description = "Organização não encontrada")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_invitation(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    Path(org_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateInvitationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let invitation = app_state
        .rbac_service
        .create_invitation(&actor, org_id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(invitation)))
}
