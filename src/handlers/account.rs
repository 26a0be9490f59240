// src/handlers/account.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::CurrentUser, i18n::Locale, validation::ValidatedJson},
    models::tenancy::{AccountOverview, InvitationsResponse, JoinPayload, JoinResponse, MembershipsResponse},
};

// GET /account/memberships
#[utoipa::path(
    get,
    path = "/account/memberships",
    tag = "Account",
    responses((status = 200, description = "Organizações do usuário", body = MembershipsResponse)),
    security(("session_cookie" = []))
)]
pub async fn memberships(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let memberships = app_state
        .account_service
        .memberships(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(MembershipsResponse { memberships })))
}

// GET /account/invitations
#[utoipa::path(
    get,
    path = "/account/invitations",
    tag = "Account",
    responses((status = 200, description = "Convites em aberto para o e-mail do usuário", body = InvitationsResponse)),
    security(("session_cookie" = []))
)]
pub async fn invitations(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let invitations = app_state
        .account_service
        .invitations(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(InvitationsResponse { invitations })))
}

// GET /account/overview
#[utoipa::path(
    get,
    path = "/account/overview",
    tag = "Account",
    responses((status = 200, description = "Usuário, perfil, organizações e convites", body = AccountOverview)),
    security(("session_cookie" = []))
)]
pub async fn overview(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let overview = app_state
        .account_service
        .overview(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(overview)))
}

// POST /account/join
#[utoipa::path(
    post,
    path = "/account/join",
    tag = "Account",
    request_body = JoinPayload,
    responses(
        (status = 200, description = "Convite aceito", body = JoinResponse),
        (status = 403, description = "Convite de outro e-mail"),
        (status = 404, description = "Convite inexistente"),
        (status = 409, description = "Já é membro; o convite foi descartado"),
        (status = 410, description = "Convite expirado ou já aceito")
    ),
    security(("session_cookie" = []))
)]
pub async fn join(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
    ValidatedJson(payload): ValidatedJson<JoinPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let joined = app_state
        .account_service
        .join(&user, &payload.token)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(joined)))
}
