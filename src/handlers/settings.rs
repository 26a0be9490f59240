// src/handlers/settings.rs

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::auth::NO_STORE,
    middleware::{
        auth::{CurrentUser, RequireRole, SuperadminOnly},
        i18n::Locale,
        validation::ValidatedJson,
    },
    models::{
        settings::{ThemeResponse, ThemeSaved, ThemeVars},
        tenancy::LicenseStatusResponse,
    },
};

// GET /theme
#[utoipa::path(
    get,
    path = "/theme",
    tag = "Settings",
    responses((status = 200, description = "Tema global e CSS gerado", body = ThemeResponse))
)]
pub async fn get_theme(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let theme = app_state
        .settings_service
        .get_theme()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(([NO_STORE], Json(theme)))
}

// GET /theme.css
#[utoipa::path(
    get,
    path = "/theme.css",
    tag = "Settings",
    responses((status = 200, description = "Variáveis CSS do tema", content_type = "text/css", body = String))
)]
pub async fn theme_css(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let css = app_state
        .settings_service
        .theme_css()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=2, must-revalidate"),
        ],
        css,
    ))
}

// PUT /admin/theme
#[utoipa::path(
    put,
    path = "/admin/theme",
    tag = "Settings",
    request_body = ThemeVars,
    responses(
        (status = 200, description = "Tema salvo", body = ThemeSaved),
        (status = 400, description = "Token desconhecido ou vazio"),
        (status = 403, description = "Somente superadmin")
    ),
    security(("session_cookie" = []))
)]
pub async fn put_theme(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(actor, _): RequireRole<SuperadminOnly>,
    ValidatedJson(vars): ValidatedJson<ThemeVars>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = app_state
        .settings_service
        .save_theme(&actor, vars)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(saved)))
}

// GET /license/status
#[utoipa::path(
    get,
    path = "/license/status",
    tag = "Settings",
    responses((status = 200, description = "Status da licença da organização do usuário", body = LicenseStatusResponse)),
    security(("session_cookie" = []))
)]
pub async fn license_status(
    State(app_state): State<AppState>,
    locale: Locale,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let status = app_state
        .settings_service
        .license_status(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(([NO_STORE], Json(status)))
}
