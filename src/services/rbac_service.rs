// src/services/rbac_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_serializable, is_serialization_failure},
        error::AppError,
    },
    config::Settings,
    db::{RbacRepository, TenancyRepository, UserRepository},
    models::{
        auth::SessionUser,
        rbac::{
            AdminChangeResponse, AdminItem, OrgRef, OrganizationItem, Role, RoleTarget, TargetRef,
            UserListItem,
        },
        tenancy::{CreateInvitationPayload, InvitationCreated},
    },
    services::{
        auth::{normalize_email, random_token},
        policy::{
            can_assign, needs_membership, needs_superadmin_count, plan_admin_grant,
            plan_admin_revoke, plan_role_change, visibility_for, AdminChange, RoleChange,
            RoleChangeFacts, Visibility,
        },
    },
};

#[derive(Clone)]
pub struct RbacService {
    user_repo: UserRepository,
    rbac_repo: RbacRepository,
    tenancy_repo: TenancyRepository,
    settings: Arc<Settings>,
    pool: PgPool,
}

impl RbacService {
    pub fn new(
        user_repo: UserRepository,
        rbac_repo: RbacRepository,
        tenancy_repo: TenancyRepository,
        settings: Arc<Settings>,
        pool: PgPool,
    ) -> Self {
        Self {
            user_repo,
            rbac_repo,
            tenancy_repo,
            settings,
            pool,
        }
    }

    // ---
    // Listagens
    // ---

    /// Usuários visíveis ao ator, com busca e filtro de papel combinados por AND.
    pub async fn list_users(
        &self,
        actor: &SessionUser,
        search: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<UserListItem>, AppError> {
        let visibility = visibility_for(actor.role, actor.id);
        if visibility == Visibility::Nobody {
            return Ok(Vec::new());
        }

        let mut items = self
            .rbac_repo
            .list_visible_users(&visibility, search, role)
            .await?;

        let ids: Vec<Uuid> = items.iter().map(|u| u.id).collect();
        let mut orgs_by_user: HashMap<Uuid, Vec<OrgRef>> = HashMap::new();
        for row in self.rbac_repo.memberships_for(&ids).await? {
            orgs_by_user.entry(row.user_id).or_default().push(OrgRef {
                id: row.org_id,
                name: row.org_name,
                logo_url: row.logo_url,
            });
        }

        for item in &mut items {
            item.organizations = orgs_by_user.remove(&item.id).unwrap_or_default();
        }

        Ok(items)
    }

    pub async fn list_organizations(
        &self,
        actor: &SessionUser,
        search: Option<&str>,
    ) -> Result<Vec<OrganizationItem>, AppError> {
        let owner_scope = match actor.role {
            Role::Superadmin | Role::Admin => None,
            Role::Owner => Some(actor.id),
            Role::User | Role::Viewer | Role::Deputy => return Ok(Vec::new()),
        };

        let rows = self.rbac_repo.list_organizations(owner_scope, search).await?;
        Ok(rows.into_iter().map(OrganizationItem::from).collect())
    }

    pub async fn list_admins(&self) -> Result<Vec<AdminItem>, AppError> {
        let default_avatar = self.settings.default_avatar();
        let rows = self.rbac_repo.list_admins().await?;

        Ok(rows
            .into_iter()
            .map(|row| AdminItem {
                id: row.id,
                email: row.email,
                role: row.role,
                created_at: row.created_at,
                first_name: row.first_name.unwrap_or_default(),
                last_name: row.last_name.unwrap_or_default(),
                avatar_url: row
                    .avatar_url
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| default_avatar.clone()),
            })
            .collect())
    }

    // ---
    // Troca de papel
    // ---

    /// Troca o papel do alvo. Todos os fatos são relidos dentro de uma transação SERIALIZABLE;
    /// se outra transação concorrente vencer, o cliente recebe 409 e reenvia.
    pub async fn set_role(
        &self,
        actor: &SessionUser,
        target: &TargetRef,
        wanted: Role,
    ) -> Result<RoleTarget, AppError> {
        self.set_role_tx(actor, target, wanted).await.map_err(|e| {
            if is_serialization_failure(&e) {
                tracing::warn!(actor_id = %actor.id, "Troca de papel abortada por escrita concorrente");
                AppError::ConcurrentModification
            } else {
                e
            }
        })
    }

    async fn set_role_tx(
        &self,
        actor: &SessionUser,
        target_ref: &TargetRef,
        wanted: Role,
    ) -> Result<RoleTarget, AppError> {
        let mut tx = begin_serializable(&self.pool).await?;

        // 1. Superadmin como ator: trava todos os superadmins antes do alvo.
        // Duas demoções cruzadas pegam as mesmas linhas na mesma ordem.
        let superadmins = if actor.role == Role::Superadmin {
            Some(self.user_repo.lock_superadmins(&mut *tx).await?)
        } else {
            None
        };

        // 2. Alvo (travado até o commit)
        let target = match target_ref {
            TargetRef::Id(id) => self.user_repo.lock_by_id(&mut *tx, *id).await?,
            TargetRef::Email(email) => self.user_repo.lock_by_email(&mut *tx, email).await?,
        }
        .ok_or(AppError::TargetNotFound)?;

        // 3. Fatos que só algumas combinações precisam
        let other_superadmins = if needs_superadmin_count(actor.role, target.role, wanted) {
            let ids = match superadmins {
                Some(ids) => ids,
                None => self.user_repo.lock_superadmins(&mut *tx).await?,
            };
            Some(ids.iter().filter(|id| **id != target.id).count() as i64)
        } else {
            None
        };

        let target_in_owned_org = if needs_membership(actor.role) {
            Some(
                self.rbac_repo
                    .is_member_of_owned_org(&mut *tx, target.id, actor.id)
                    .await?,
            )
        } else {
            None
        };

        // 4. Decisão pura; erro aqui descarta a transação (rollback no drop)
        let plan = plan_role_change(RoleChangeFacts {
            actor: actor.role,
            target: target.role,
            wanted,
            other_superadmins,
            target_in_owned_org,
        })?;

        match plan {
            RoleChange::Unchanged => {
                tx.commit().await?;
                Ok(target)
            }
            RoleChange::Apply => {
                let updated = self.user_repo.update_role(&mut *tx, target.id, wanted).await?;
                tx.commit().await?;

                tracing::info!(
                    actor_id = %actor.id,
                    target_id = %updated.id,
                    from = %target.role,
                    to = %updated.role,
                    "🛡️ Papel alterado"
                );
                Ok(updated)
            }
        }
    }

    // ---
    // Admins (somente fronteira user <-> admin)
    // ---

    pub async fn grant_admin(&self, actor: &SessionUser, email: &str) -> Result<AdminChangeResponse, AppError> {
        self.change_admin(actor, email, plan_admin_grant, Role::Admin).await
    }

    pub async fn revoke_admin(&self, actor: &SessionUser, email: &str) -> Result<AdminChangeResponse, AppError> {
        self.change_admin(actor, email, plan_admin_revoke, Role::User).await
    }

    async fn change_admin(
        &self,
        actor: &SessionUser,
        email: &str,
        plan: fn(Role) -> Result<AdminChange, AppError>,
        new_role: Role,
    ) -> Result<AdminChangeResponse, AppError> {
        let mut tx = self.pool.begin().await?;

        let target = self
            .user_repo
            .lock_by_email(&mut *tx, &normalize_email(email))
            .await?
            .ok_or(AppError::UserNotFound)?;

        match plan(target.role)? {
            AdminChange::AlreadyInPlace => Ok(AdminChangeResponse {
                ok: true,
                already: Some(true),
            }),
            AdminChange::Promote | AdminChange::Demote => {
                self.user_repo.update_role(&mut *tx, target.id, new_role).await?;
                tx.commit().await?;

                tracing::info!(
                    actor_id = %actor.id,
                    target_id = %target.id,
                    to = %new_role,
                    "🛡️ Papel de admin alterado"
                );
                Ok(AdminChangeResponse { ok: true, already: None })
            }
        }
    }

    // ---
    // Convites
    // ---

    /// Staff convida para qualquer organização; o owner só para as próprias.
    pub async fn create_invitation(
        &self,
        actor: &SessionUser,
        org_id: Uuid,
        payload: &CreateInvitationPayload,
    ) -> Result<InvitationCreated, AppError> {
        let org = self
            .tenancy_repo
            .find_organization(org_id)
            .await?
            .ok_or(AppError::OrganizationNotFound)?;

        if !actor.role.is_staff() && org.owner_id != actor.id {
            return Err(AppError::Forbidden);
        }
        if !can_assign(actor.role, payload.role) {
            return Err(AppError::ForbiddenEscalation);
        }

        let token = random_token(24);
        let expires_at = Utc::now() + Duration::seconds(self.settings.invite_ttl_secs);
        let invitation = self
            .tenancy_repo
            .create_invitation(
                &self.pool,
                org.id,
                &normalize_email(&payload.email),
                payload.role,
                &token,
                expires_at,
            )
            .await?;

        tracing::info!(actor_id = %actor.id, org_id = %org.id, role = %invitation.role, "✉️ Convite criado");
        Ok(invitation.into())
    }
}
