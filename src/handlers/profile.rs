// src/handlers/profile.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::CurrentUser, i18n::Locale, validation::ValidatedJson},
    models::profile::{ProfilePayload, ProfileResponse, ProfileSaved, ProfileStatus},
};

// GET /profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "Profile",
    responses((status = 200, description = "Perfil do usuário (avatar sempre presente)", body = ProfileResponse)),
    security(("session_cookie" = []))
)]
pub async fn get_profile(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = app_state
        .profile_service
        .get_profile(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(ProfileResponse { profile })))
}

// POST /profile
#[utoipa::path(
    post,
    path = "/profile",
    tag = "Profile",
    request_body = ProfilePayload,
    responses(
        (status = 200, description = "Perfil salvo", body = ProfileSaved),
        (status = 400, description = "Campo inválido")
    ),
    security(("session_cookie" = []))
)]
pub async fn save_profile(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
    ValidatedJson(payload): ValidatedJson<ProfilePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = app_state
        .profile_service
        .save_profile(&user, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(saved)))
}

// GET /profile/status
#[utoipa::path(
    get,
    path = "/profile/status",
    tag = "Profile",
    responses((status = 200, description = "Campos obrigatórios faltantes", body = ProfileStatus)),
    security(("session_cookie" = []))
)]
pub async fn profile_status(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let status = app_state
        .profile_service
        .status(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(status)))
}
