// src/services/account_service.rs

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    config::Settings,
    db::{ProfileRepository, TenancyRepository},
    models::{
        auth::SessionUser,
        profile::ProfileView,
        tenancy::{AccountOverview, JoinResponse, JoinedOrg, Membership, OpenInvitation},
    },
};

#[derive(Clone)]
pub struct AccountService {
    tenancy_repo: TenancyRepository,
    profile_repo: ProfileRepository,
    settings: Arc<Settings>,
    pool: PgPool,
}

impl AccountService {
    pub fn new(
        tenancy_repo: TenancyRepository,
        profile_repo: ProfileRepository,
        settings: Arc<Settings>,
        pool: PgPool,
    ) -> Self {
        Self {
            tenancy_repo,
            profile_repo,
            settings,
            pool,
        }
    }

    pub async fn memberships(&self, user: &SessionUser) -> Result<Vec<Membership>, AppError> {
        self.tenancy_repo.memberships_of(user.id).await
    }

    pub async fn invitations(&self, user: &SessionUser) -> Result<Vec<OpenInvitation>, AppError> {
        self.tenancy_repo.open_invitations_for(&user.email).await
    }

    pub async fn overview(&self, user: &SessionUser) -> Result<AccountOverview, AppError> {
        // Consultas independentes, em paralelo
        let (profile, memberships, invitations) = tokio::try_join!(
            self.profile_repo.find_by_user(user.id),
            self.tenancy_repo.memberships_of(user.id),
            self.tenancy_repo.open_invitations_for(&user.email),
        )?;

        let profile = profile.map(|p| ProfileView::from_row(Some(p), self.settings.default_avatar()));

        Ok(AccountOverview {
            user: user.clone(),
            profile,
            memberships,
            invitations,
        })
    }

    /// Aceita um convite. O papel do usuário não muda; o papel do convite é devolvido.
    pub async fn join(&self, user: &SessionUser, token: &str) -> Result<JoinResponse, AppError> {
        let mut tx = self.pool.begin().await?;

        let invitation = self
            .tenancy_repo
            .lock_invitation(&mut *tx, token.trim())
            .await?
            .ok_or(AppError::InviteNotFound)?;

        // Existe mas expirou ou já foi aceito
        if !invitation.is_open_at(Utc::now()) {
            return Err(AppError::InviteGone);
        }

        if !invitation.is_addressed_to(&user.email) {
            return Err(AppError::InviteEmailMismatch);
        }

        // Já é membro: o convite é descartado e o conflito reportado
        if self
            .tenancy_repo
            .is_member(&mut *tx, invitation.org_id, user.id)
            .await?
        {
            self.tenancy_repo.delete_invitation(&mut *tx, invitation.id).await?;
            tx.commit().await?;
            return Err(AppError::AlreadyMember);
        }

        self.tenancy_repo
            .add_member(&mut *tx, invitation.org_id, user.id)
            .await?;
        self.tenancy_repo
            .mark_invitation_accepted(&mut *tx, invitation.id)
            .await?;

        let org_name = self
            .tenancy_repo
            .organization_name(&mut *tx, invitation.org_id)
            .await?
            .ok_or(AppError::OrganizationNotFound)?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, org_id = %invitation.org_id, "🤝 Convite aceito");

        Ok(JoinResponse {
            ok: true,
            org: JoinedOrg {
                id: invitation.org_id,
                name: org_name,
            },
            role: invitation.role,
        })
    }
}
