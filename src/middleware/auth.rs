// src/middleware/auth.rs

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::{auth::SessionUser, rbac::Role},
};

// Resultado da resolução, guardado nos extensions da requisição
#[derive(Clone)]
struct ResolvedIdentity(Option<SessionUser>);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Cookies (primário, depois legados) e, na falta deles, `Authorization: Bearer`.
fn credential_candidates(app_state: &AppState, headers: &HeaderMap) -> Vec<String> {
    let jar = CookieJar::from_headers(headers);
    let candidates = app_state.session_cookies.candidates(&jar);
    if candidates.is_empty() {
        bearer_token(headers).into_iter().collect()
    } else {
        candidates
    }
}

async fn user_id_for(app_state: &AppState, credential: &str) -> Result<Option<Uuid>, AppError> {
    // 1. Cookie HMAC sem estado
    if let Some(claims) = app_state.session_codec.verify(credential) {
        return Ok(Uuid::parse_str(&claims.uid).ok());
    }
    // 2. Sessão persistida do formato antigo
    app_state.session_repo.find_user_id(credential).await
}

/// Resolve `{id, email, role}` uma única vez por requisição.
/// Credencial inválida é `None`; só erros de banco sobem.
pub async fn resolve_identity(
    app_state: &AppState,
    parts: &mut Parts,
) -> Result<Option<SessionUser>, AppError> {
    if let Some(ResolvedIdentity(cached)) = parts.extensions.get::<ResolvedIdentity>() {
        return Ok(cached.clone());
    }

    let mut user = None;
    for credential in credential_candidates(app_state, &parts.headers) {
        if let Some(user_id) = user_id_for(app_state, &credential).await? {
            // Papel sempre relido do banco
            user = app_state.user_repo.find_session_user(user_id).await?;
            break;
        }
    }

    parts.extensions.insert(ResolvedIdentity(user.clone()));
    Ok(user)
}

// ---
// Extratores
// ---

/// Identidade opcional (rotas públicas como `/me`).
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let user = resolve_identity(&app_state, parts)
            .await
            .map_err(|e| e.to_api_error(&Locale::from_headers(&parts.headers)))?;
        Ok(MaybeUser(user))
    }
}

/// Usuário autenticado; 401 quando não há identidade.
pub struct CurrentUser(pub SessionUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.map(CurrentUser).ok_or_else(|| {
            AppError::Unauthenticated.to_api_error(&Locale::from_headers(&parts.headers))
        })
    }
}

// ---
// Guardas de papel
// ---

/// Conjunto de papéis aceitos por uma rota.
pub trait RoleGate: Send + Sync + 'static {
    fn allows(role: Role) -> bool;
}

/// admin, superadmin ou owner.
pub struct StaffOrOwner;
impl RoleGate for StaffOrOwner {
    fn allows(role: Role) -> bool {
        matches!(role, Role::Admin | Role::Superadmin | Role::Owner)
    }
}

pub struct StaffOnly;
impl RoleGate for StaffOnly {
    fn allows(role: Role) -> bool {
        role.is_staff()
    }
}

pub struct SuperadminOnly;
impl RoleGate for SuperadminOnly {
    fn allows(role: Role) -> bool {
        role == Role::Superadmin
    }
}

fn check_gate<G: RoleGate>(user: Option<SessionUser>) -> Result<SessionUser, AppError> {
    let user = user.ok_or(AppError::Unauthenticated)?;
    if !G::allows(user.role) {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Extrator: usuário autenticado cujo papel passa em `G`.
pub struct RequireRole<G: RoleGate>(pub SessionUser, pub PhantomData<G>);

impl<G, S> FromRequestParts<S> for RequireRole<G>
where
    G: RoleGate,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        check_gate::<G>(user)
            .map(|user| RequireRole(user, PhantomData))
            .map_err(|e| e.to_api_error(&Locale::from_headers(&parts.headers)))
    }
}

/// Middleware para grupos de rotas: `from_fn_with_state(state, role_guard::<StaffOrOwner>)`.
/// A identidade resolvida fica em cache para os extratores do handler.
pub async fn role_guard<G: RoleGate>(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let locale = Locale::from_headers(&parts.headers);

    let user = resolve_identity(&app_state, &mut parts)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    check_gate::<G>(user).map_err(|e| e.to_api_error(&locale))?;

    Ok(next.run(Request::from_parts(parts, body)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: Role) -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            email: "max@example.de".into(),
            role,
        }
    }

    #[test]
    fn gates_accept_expected_roles() {
        let accepted = |allows: fn(Role) -> bool| -> Vec<Role> {
            Role::ALL.into_iter().filter(|r| allows(*r)).collect()
        };
        assert_eq!(accepted(StaffOrOwner::allows), vec![Role::Owner, Role::Admin, Role::Superadmin]);
        assert_eq!(accepted(StaffOnly::allows), vec![Role::Admin, Role::Superadmin]);
        assert_eq!(accepted(SuperadminOnly::allows), vec![Role::Superadmin]);
    }

    #[test]
    fn gate_distinguishes_anonymous_from_wrong_role() {
        assert_eq!(check_gate::<StaffOnly>(None).unwrap_err().code(), "UNAUTHORIZED");
        assert_eq!(check_gate::<StaffOnly>(Some(user(Role::Owner))).unwrap_err().code(), "FORBIDDEN");
        assert!(check_gate::<StaffOnly>(Some(user(Role::Admin))).is_ok());
    }

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }
}
