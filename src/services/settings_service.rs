// src/services/settings_service.rs

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    common::error::AppError,
    config::Settings,
    db::{SettingsRepository, TenancyRepository},
    models::{
        auth::SessionUser,
        settings::{ThemeResponse, ThemeSaved, ThemeVars, THEME_KEY},
        tenancy::LicenseStatusResponse,
    },
};

// CSS servido quando não há tema salvo
pub const EMPTY_THEME_CSS: &str = ":root{}";

#[derive(Clone)]
pub struct SettingsService {
    settings_repo: SettingsRepository,
    tenancy_repo: TenancyRepository,
    settings: Arc<Settings>,
    pool: PgPool,
}

impl SettingsService {
    pub fn new(
        settings_repo: SettingsRepository,
        tenancy_repo: TenancyRepository,
        settings: Arc<Settings>,
        pool: PgPool,
    ) -> Self {
        Self {
            settings_repo,
            tenancy_repo,
            settings,
            pool,
        }
    }

    // ---
    // Tema global
    // ---

    async fn load_theme(&self) -> Result<ThemeVars, AppError> {
        let Some(raw) = self.settings_repo.get(THEME_KEY).await? else {
            return Ok(ThemeVars::default());
        };

        // Valor corrompido no banco não derruba a página: cai no tema vazio
        Ok(serde_json::from_value(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "⚠️ Tema salvo inválido; usando o padrão");
            ThemeVars::default()
        }))
    }

    pub async fn get_theme(&self) -> Result<ThemeResponse, AppError> {
        let value = self.load_theme().await?;
        let css = value.css();
        Ok(ThemeResponse { value, css })
    }

    pub async fn theme_css(&self) -> Result<String, AppError> {
        let css = self.load_theme().await?.css();
        Ok(if css.is_empty() { EMPTY_THEME_CSS.to_string() } else { css })
    }

    pub async fn save_theme(&self, actor: &SessionUser, vars: ThemeVars) -> Result<ThemeSaved, AppError> {
        let value = vars.trimmed();
        let json = serde_json::to_value(&value)
            .map_err(|e| anyhow::anyhow!("Falha ao serializar o tema: {}", e))?;

        self.settings_repo.put(&self.pool, THEME_KEY, &json).await?;

        tracing::info!(actor_id = %actor.id, "🎨 Tema global atualizado");

        let css = value.css();
        Ok(ThemeSaved { ok: true, value, css })
    }

    // ---
    // Licença (somente leitura)
    // ---

    pub async fn license_status(&self, user: &SessionUser) -> Result<LicenseStatusResponse, AppError> {
        let response = match self.tenancy_repo.latest_license_for(user.id).await? {
            Some(license) => LicenseStatusResponse {
                status: license.status,
                valid_to: license.valid_to,
            },
            None => LicenseStatusResponse {
                status: self.settings.dev_license_status.clone(),
                valid_to: None,
            },
        };
        Ok(response)
    }
}
