// src/handlers/admins.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::CurrentUser, i18n::Locale, validation::ValidatedJson},
    models::rbac::{AdminChangeResponse, AdminEmailPayload, AdminListResponse},
};

// Somente superadmin (role_guard::<SuperadminOnly> no router)

// GET /admin/admins
#[utoipa::path(
    get,
    path = "/admin/admins",
    tag = "Admins",
    responses(
        (status = 200, description = "Admins e superadmins", body = AdminListResponse),
        (status = 403, description = "Somente superadmin")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_admins(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state
        .rbac_service
        .list_admins()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(AdminListResponse { items })))
}

// POST /admin/admins/grant
#[utoipa::path(
    post,
    path = "/admin/admins/grant",
    tag = "Admins",
    request_body = AdminEmailPayload,
    responses(
        (status = 200, description = "Promovido a admin (ou já era)", body = AdminChangeResponse),
        (status = 404, description = "Usuário não encontrado"),
        (status = 409, description = "Superadmins não são alterados aqui")
    ),
    security(("session_cookie" = []))
)]
pub async fn grant_admin(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(payload): ValidatedJson<AdminEmailPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .rbac_service
        .grant_admin(&actor, &payload.email)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(result)))
}

// POST /admin/admins/revoke
#[utoipa::path(
    post,
    path = "/admin/admins/revoke",
    tag = "Admins",
    request_body = AdminEmailPayload,
    responses(
        (status = 200, description = "Rebaixado a user (ou não era admin)", body = AdminChangeResponse),
        (status = 404, description = "Usuário não encontrado"),
        (status = 409, description = "Superadmins não perdem o papel aqui")
    ),
    security(("session_cookie" = []))
)]
pub async fn revoke_admin(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(payload): ValidatedJson<AdminEmailPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .rbac_service
        .revoke_admin(&actor, &payload.email)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(result)))
}
