// src/handlers/auth.rs

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::{CurrentUser, MaybeUser},
        i18n::Locale,
        validation::ValidatedJson,
    },
    models::auth::{
        LoginUserPayload, MeResponse, OkResponse, RegisterResponse, RegisterUserPayload,
        VerifyQuery, VerifyResponse,
    },
};

pub(crate) const NO_STORE: (header::HeaderName, &str) = (header::CACHE_CONTROL, "no-store");

// POST /auth/register
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterUserPayload,
    responses(
        (status = 202, description = "Conta criada; e-mail de verificação enviado", body = RegisterResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Registro não é possível (resposta neutra)")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    locale: Locale,
    ValidatedJson(payload): ValidatedJson<RegisterUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .auth_service
        .register_user(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::ACCEPTED, Json(RegisterResponse { accepted: true })))
}

async fn verify_token(app_state: &AppState, locale: &Locale, query: VerifyQuery) -> Result<Json<VerifyResponse>, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::from(e).to_api_error(locale))?;

    app_state
        .auth_service
        .verify_email(&query.token)
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok(Json(VerifyResponse { verified: true }))
}

// GET /auth/verify?token=...
#[utoipa::path(
    get,
    path = "/auth/verify",
    tag = "Auth",
    params(VerifyQuery),
    responses(
        (status = 200, description = "E-mail verificado", body = VerifyResponse),
        (status = 400, description = "Token ausente ou curto demais"),
        (status = 410, description = "Token expirado, já usado ou inexistente")
    )
)]
pub async fn verify(
    State(app_state): State<AppState>,
    locale: Locale,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) =
        query.map_err(|_| AppError::validation("token", "Token erforderlich.").to_api_error(&locale))?;
    verify_token(&app_state, &locale, query).await
}

// GET /auth/verify/{token}
// Formato antigo dos links de e-mail; mantido até os links emitidos expirarem
#[utoipa::path(
    get,
    path = "/auth/verify/{token}",
    tag = "Auth",
    params(("token" = String, Path, description = "Token de verificação")),
    responses(
        (status = 200, description = "E-mail verificado", body = VerifyResponse),
        (status = 410, description = "Token expirado, já usado ou inexistente")
    )
)]
pub async fn verify_legacy(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    verify_token(&app_state, &locale, VerifyQuery { token }).await
}

// POST /auth/login
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 204, description = "Login efetuado; cookie de sessão gravado"),
        (status = 401, description = "UNAUTHORIZED ou EMAIL_NOT_VERIFIED")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let token = app_state
        .auth_service
        .login_user(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    let jar = app_state.session_cookies.issue(jar, &token);
    Ok((StatusCode::NO_CONTENT, jar))
}

// POST /auth/logout
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Cookies de sessão removidos", body = OkResponse))
)]
pub async fn logout(State(app_state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    // O cookie HMAC não tem estado no servidor; só sessões antigas são apagadas
    for credential in app_state.session_cookies.candidates(&jar) {
        if app_state.session_codec.verify(&credential).is_some() {
            continue;
        }
        if let Err(e) = app_state.session_repo.delete(&credential).await {
            tracing::warn!(error = %e, "⚠️ Falha ao remover sessão persistida no logout");
        }
    }

    let jar = app_state.session_cookies.clear(jar);
    (StatusCode::OK, jar, Json(OkResponse { ok: true }))
}

// POST /auth/refresh
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "Sessão renovada", body = OkResponse),
        (status = 401, description = "Sem sessão válida")
    ),
    security(("session_cookie" = []))
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> impl IntoResponse {
    let token = app_state.auth_service.refresh_session(&user);
    let jar = app_state.session_cookies.issue(jar, &token);
    (StatusCode::OK, jar, Json(OkResponse { ok: true }))
}

// GET /me
#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    responses((status = 200, description = "Identidade atual (ou anônimo)", body = MeResponse))
)]
pub async fn get_me(
    State(app_state): State<AppState>,
    locale: Locale,
    MaybeUser(user): MaybeUser,
) -> Result<impl IntoResponse, ApiError> {
    let me = app_state
        .auth_service
        .me(user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(([NO_STORE], Json(me)))
}
