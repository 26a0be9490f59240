// src/services/profile_service.rs

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    common::error::AppError,
    config::Settings,
    db::ProfileRepository,
    models::{
        auth::SessionUser,
        profile::{ProfilePayload, ProfileSaved, ProfileStatus, ProfileUpsert, ProfileView},
    },
};

#[derive(Clone)]
pub struct ProfileService {
    profile_repo: ProfileRepository,
    settings: Arc<Settings>,
    pool: PgPool,
}

impl ProfileService {
    pub fn new(profile_repo: ProfileRepository, settings: Arc<Settings>, pool: PgPool) -> Self {
        Self {
            profile_repo,
            settings,
            pool,
        }
    }

    pub async fn get_profile(&self, user: &SessionUser) -> Result<ProfileView, AppError> {
        let row = self.profile_repo.find_by_user(user.id).await?;
        Ok(ProfileView::from_row(row, self.settings.default_avatar()))
    }

    pub async fn status(&self, user: &SessionUser) -> Result<ProfileStatus, AppError> {
        let row = self.profile_repo.find_by_user(user.id).await?;
        Ok(ProfileStatus::of(row.as_ref()))
    }

    /// Payload já validado pelo extrator; aqui só resta a data de calendário.
    pub async fn save_profile(
        &self,
        user: &SessionUser,
        payload: &ProfilePayload,
    ) -> Result<ProfileSaved, AppError> {
        let input = ProfileUpsert::from_payload(payload, &self.settings.default_avatar())
            .ok_or_else(|| AppError::validation("birthDate", "Ungültiges Geburtsdatum."))?;

        let saved = self.profile_repo.upsert(&self.pool, user.id, &input).await?;
        let status = ProfileStatus::of(Some(&saved));

        tracing::info!(user_id = %user.id, completed = status.completed, "👤 Perfil salvo");

        Ok(ProfileSaved {
            ok: true,
            completed: status.completed,
            missing: status.missing,
        })
    }
}
