// src/config.rs

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use axum_extra::extract::cookie::SameSite;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        ProfileRepository, RbacRepository, SessionRepository, SettingsRepository,
        TenancyRepository, UserRepository, VerificationRepository,
    },
    services::{
        account_service::AccountService,
        auth::AuthService,
        mailer::{LogMailer, Mailer},
        profile_service::ProfileService,
        rbac_service::RbacService,
        session::{SessionCodec, SessionCookies},
        settings_service::SettingsService,
    },
};

const DEV_SESSION_SECRET: &str = "dev_session_secret_change_me";
const DEFAULT_AVATAR_PATH: &str = "/images/avatar-default.png";

// Configuração lida uma única vez na inicialização
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub session_secret: String,
    pub session_cookie_name: String,
    pub compat_cookie_names: Vec<String>,
    pub mirror_compat_cookies: bool,
    pub session_ttl_secs: i64,
    pub verify_ttl_secs: i64,
    pub invite_ttl_secs: i64,
    pub web_app_url: String,
    pub default_avatar_url: Option<String>,
    pub cookie_domain: Option<String>,
    pub cookie_same_site: SameSite,
    pub production: bool,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub dev_license_status: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta as configurações a partir de qualquer fonte chave/valor (env em produção, mapa nos testes).
    /// Valores vazios contam como ausentes.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let production = get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));

        let session_secret = match get("SESSION_SECRET").or_else(|| get("JWT_SECRET")) {
            Some(secret) => secret,
            None => {
                if production {
                    tracing::warn!("⚠️ SESSION_SECRET ausente em produção; usando o segredo de desenvolvimento");
                }
                DEV_SESSION_SECRET.to_string()
            }
        };

        let compat_cookie_names = get("SESSION_COMPAT_COOKIES")
            .unwrap_or_else(|| "sid".to_string())
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let cookie_same_site = match get("COOKIE_SAMESITE").map(|v| v.to_lowercase()) {
            None if production => SameSite::None,
            None => SameSite::Lax,
            Some(v) => match v.as_str() {
                "lax" => SameSite::Lax,
                "strict" => SameSite::Strict,
                "none" => SameSite::None,
                other => return Err(anyhow!("COOKIE_SAMESITE inválido: {other}")),
            },
        };

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or("PORT", get("PORT"), 4000)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("HOST/PORT inválidos: {host}:{port}"))?;

        let dev_license_status = match get("DEV_LICENSE_STATUS").map(|v| v.to_lowercase()) {
            Some(v) if v == "inactive" => "inactive".to_string(),
            _ => "active".to_string(),
        };

        Ok(Self {
            database_url,
            session_secret,
            session_cookie_name: get("SESSION_COOKIE_NAME").unwrap_or_else(|| "gb_session".to_string()),
            compat_cookie_names,
            mirror_compat_cookies: parse_bool("SESSION_MIRROR_COMPAT", get("SESSION_MIRROR_COMPAT"), true)?,
            session_ttl_secs: parse_positive("SESSION_TTL_SECONDS", get("SESSION_TTL_SECONDS"), 60 * 60 * 24 * 7)?,
            verify_ttl_secs: parse_positive("VERIFY_TTL_SEC", get("VERIFY_TTL_SEC"), 60 * 60 * 24)?,
            invite_ttl_secs: parse_positive("INVITE_TTL_SEC", get("INVITE_TTL_SEC"), 60 * 60 * 24 * 7)?,
            web_app_url: get("WEB_APP_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            default_avatar_url: get("DEFAULT_AVATAR_URL"),
            cookie_domain: get("COOKIE_DOMAIN"),
            cookie_same_site,
            production,
            bind_addr,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5)?,
            dev_license_status,
        })
    }

    /// Avatar padrão: URL absoluta do env, senão caminho relativo ao WEB_APP_URL.
    pub fn default_avatar(&self) -> String {
        match self.default_avatar_url.as_deref() {
            Some(url) if url.starts_with("http") => url.to_string(),
            other => {
                let base = self.web_app_url.trim_end_matches('/');
                let path = match other {
                    Some(p) if p.starts_with('/') => p.to_string(),
                    Some(p) => format!("/{p}"),
                    None => DEFAULT_AVATAR_PATH.to_string(),
                };
                format!("{base}{path}")
            }
        }
    }

    pub fn verify_link(&self, token: &str) -> String {
        format!("{}/verify/{}", self.web_app_url.trim_end_matches('/'), token)
    }

    /// Todos os nomes de cookie lidos, na ordem de prioridade.
    pub fn session_cookie_names(&self) -> Vec<String> {
        std::iter::once(self.session_cookie_name.clone())
            .chain(
                self.compat_cookie_names
                    .iter()
                    .filter(|name| **name != self.session_cookie_name)
                    .cloned(),
            )
            .collect()
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| anyhow!("{key} inválido: {v}")),
    }
}

fn parse_positive(key: &str, raw: Option<String>, default: i64) -> anyhow::Result<i64> {
    let value: i64 = parse_or(key, raw, default)?;
    if value <= 0 {
        return Err(anyhow!("{key} deve ser positivo"));
    }
    Ok(value)
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    match raw.map(|v| v.to_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("{key} inválido: {other}")),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub session_codec: SessionCodec,
    pub session_cookies: SessionCookies,
    pub user_repo: UserRepository,
    pub session_repo: SessionRepository,
    pub auth_service: AuthService,
    pub rbac_service: RbacService,
    pub account_service: AccountService,
    pub profile_service: ProfileService,
    pub settings_service: SettingsService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        // .env é opcional
        dotenvy::dotenv().ok();

        let settings = Settings::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::build(db_pool, settings, Arc::new(LogMailer)))
    }

    // --- Monta o gráfico de dependências ---
    pub fn build(db_pool: PgPool, settings: Settings, mailer: Arc<dyn Mailer>) -> Self {
        let settings = Arc::new(settings);

        let session_codec = SessionCodec::new(&settings.session_secret, settings.session_ttl_secs);
        let session_cookies = SessionCookies::from_settings(&settings);

        let user_repo = UserRepository::new(db_pool.clone());
        let session_repo = SessionRepository::new(db_pool.clone());
        let verification_repo = VerificationRepository::new(db_pool.clone());
        let rbac_repo = RbacRepository::new(db_pool.clone());
        let tenancy_repo = TenancyRepository::new(db_pool.clone());
        let profile_repo = ProfileRepository::new(db_pool.clone());
        let settings_repo = SettingsRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            verification_repo,
            profile_repo.clone(),
            session_codec.clone(),
            mailer,
            settings.clone(),
            db_pool.clone(),
        );
        let rbac_service = RbacService::new(
            user_repo.clone(),
            rbac_repo,
            tenancy_repo.clone(),
            settings.clone(),
            db_pool.clone(),
        );
        let account_service = AccountService::new(
            tenancy_repo.clone(),
            profile_repo.clone(),
            settings.clone(),
            db_pool.clone(),
        );
        let profile_service = ProfileService::new(profile_repo, settings.clone(), db_pool.clone());
        let settings_service =
            SettingsService::new(settings_repo, tenancy_repo, settings.clone(), db_pool.clone());

        Self {
            db_pool,
            settings,
            session_codec,
            session_cookies,
            user_repo,
            session_repo,
            auth_service,
            rbac_service,
            account_service,
            profile_service,
            settings_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_with(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let s = settings_with(&[("DATABASE_URL", "postgres://localhost/gatebook")]).unwrap();
        assert_eq!(s.session_cookie_name, "gb_session");
        assert_eq!(s.compat_cookie_names, vec!["sid".to_string()]);
        assert!(s.mirror_compat_cookies);
        assert_eq!(s.session_ttl_secs, 604_800);
        assert_eq!(s.verify_ttl_secs, 86_400);
        assert_eq!(s.cookie_same_site, SameSite::Lax);
        assert!(!s.production);
        assert_eq!(s.bind_addr.port(), 4000);
        assert_eq!(s.session_secret, DEV_SESSION_SECRET);
        assert_eq!(s.dev_license_status, "active");
    }

    #[test]
    fn database_url_is_required() {
        assert!(settings_with(&[]).is_err());
    }

    #[test]
    fn session_secret_falls_back_to_jwt_secret() {
        let s = settings_with(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "jwt-s3cret")]).unwrap();
        assert_eq!(s.session_secret, "jwt-s3cret");
    }

    #[test]
    fn production_defaults_to_same_site_none() {
        let s = settings_with(&[("DATABASE_URL", "postgres://x"), ("APP_ENV", "production")]).unwrap();
        assert!(s.production);
        assert_eq!(s.cookie_same_site, SameSite::None);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(settings_with(&[("DATABASE_URL", "postgres://x"), ("COOKIE_SAMESITE", "sometimes")]).is_err());
        assert!(settings_with(&[("DATABASE_URL", "postgres://x"), ("SESSION_TTL_SECONDS", "-5")]).is_err());
        assert!(settings_with(&[("DATABASE_URL", "postgres://x"), ("SESSION_MIRROR_COMPAT", "maybe")]).is_err());
    }

    #[test]
    fn compat_cookie_list_is_trimmed_and_deduplicated_against_primary() {
        let s = settings_with(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_COMPAT_COOKIES", " sid, gb_session ,session"),
        ])
        .unwrap();
        assert_eq!(s.session_cookie_names(), vec!["gb_session", "sid", "session"]);
    }

    #[test]
    fn default_avatar_resolution() {
        let relative = settings_with(&[("DATABASE_URL", "postgres://x"), ("WEB_APP_URL", "https://app.gatebook.de/")]).unwrap();
        assert_eq!(relative.default_avatar(), "https://app.gatebook.de/images/avatar-default.png");

        let absolute = settings_with(&[
            ("DATABASE_URL", "postgres://x"),
            ("DEFAULT_AVATAR_URL", "https://cdn.gatebook.de/a.png"),
        ])
        .unwrap();
        assert_eq!(absolute.default_avatar(), "https://cdn.gatebook.de/a.png");

        let custom_path = settings_with(&[("DATABASE_URL", "postgres://x"), ("DEFAULT_AVATAR_URL", "/img/me.svg")]).unwrap();
        assert_eq!(custom_path.default_avatar(), "http://localhost:3000/img/me.svg");
    }

    #[test]
    fn verify_link_points_to_web_app() {
        let s = settings_with(&[("DATABASE_URL", "postgres://x"), ("WEB_APP_URL", "https://app.gatebook.de/")]).unwrap();
        assert_eq!(s.verify_link("abc"), "https://app.gatebook.de/verify/abc");
    }
}
