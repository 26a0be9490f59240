//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;
#[cfg(test)]
mod test_support;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::{role_guard, StaffOrOwner, SuperadminOnly};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gatebook_api=info,tower_http=info")),
        )
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar
    let app_state = AppState::new().await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let addr = app_state.settings.bind_addr;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app(app_state)).await?;
    Ok(())
}

pub fn app(app_state: AppState) -> Router {
    // Rotas públicas de autenticação
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/verify", get(handlers::auth::verify))
        .route("/verify/{token}", get(handlers::auth::verify_legacy))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/refresh", post(handlers::auth::refresh));

    // Staff e owners (o escopo do owner é aplicado no serviço)
    let staff_routes = Router::new()
        .route("/roles/users", get(handlers::rbac::list_users))
        .route("/roles/search", get(handlers::rbac::search_users))
        .route("/roles/organizations", get(handlers::rbac::list_organizations))
        .route("/roles/set-role", post(handlers::rbac::set_role))
        .route(
            "/organizations/{org_id}/invitations",
            post(handlers::rbac::create_invitation),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            role_guard::<StaffOrOwner>,
        ));

    let superadmin_routes = Router::new()
        .route("/admins", get(handlers::admins::list_admins))
        .route("/admins/grant", post(handlers::admins::grant_admin))
        .route("/admins/revoke", post(handlers::admins::revoke_admin))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            role_guard::<SuperadminOnly>,
        ));

    // PUT /admin/theme valida o papel no próprio extrator
    let admin_routes = Router::new()
        .route("/theme", put(handlers::settings::put_theme))
        .merge(staff_routes)
        .merge(superadmin_routes);

    let account_routes = Router::new()
        .route("/memberships", get(handlers::account::memberships))
        .route("/invitations", get(handlers::account::invitations))
        .route("/overview", get(handlers::account::overview))
        .route("/join", post(handlers::account::join));

    Router::new()
        .route("/health", get(|| async { Json(json!({ "ok": true })) }))
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/profile",
            get(handlers::profile::get_profile).post(handlers::profile::save_profile),
        )
        .route("/profile/status", get(handlers::profile::profile_status))
        .route("/theme", get(handlers::settings::get_theme))
        .route("/theme.css", get(handlers::settings::theme_css))
        .route("/license/status", get(handlers::settings::license_status))
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .nest("/account", account_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
