// src/services/policy.rs
//
// Regras de RBAC puras, sem I/O. Os matches são exaustivos: um papel novo
// obriga a revisar cada função aqui.

use uuid::Uuid;

use crate::{common::error::AppError, models::rbac::Role};

/// Papéis que o ator pode conceder.
pub fn assignable_roles(actor: Role) -> &'static [Role] {
    match actor {
        Role::Superadmin => &Role::ALL,
        Role::Admin => &[Role::User, Role::Viewer, Role::Deputy, Role::Owner],
        Role::Owner => &[Role::Viewer, Role::Deputy],
        Role::User | Role::Viewer | Role::Deputy => &[],
    }
}

pub fn can_assign(actor: Role, wanted: Role) -> bool {
    assignable_roles(actor).contains(&wanted)
}

/// Admins e superadmins só são alteráveis por um superadmin.
pub fn is_protected_target(actor: Role, target: Role) -> bool {
    actor != Role::Superadmin && matches!(target, Role::Admin | Role::Superadmin)
}

/// O ator pode editar um alvo com este papel? (sem considerar membership)
pub fn can_edit_target(actor: Role, target: Role) -> bool {
    match actor {
        Role::Superadmin => true,
        Role::Admin => !matches!(target, Role::Admin | Role::Superadmin),
        Role::Owner => matches!(target, Role::User | Role::Viewer | Role::Deputy),
        Role::User | Role::Viewer | Role::Deputy => false,
    }
}

// ---
// Visibilidade na listagem de usuários
// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Sem filtro.
    All,
    /// Todos, exceto superadmins.
    ExceptSuperadmins,
    /// Não-superadmins que são membros de organizações deste owner.
    OwnedOrgMembers(Uuid),
    /// Conjunto vazio.
    Nobody,
}

pub fn visibility_for(actor_role: Role, actor_id: Uuid) -> Visibility {
    match actor_role {
        Role::Superadmin => Visibility::All,
        Role::Admin => Visibility::ExceptSuperadmins,
        Role::Owner => Visibility::OwnedOrgMembers(actor_id),
        Role::User | Role::Viewer | Role::Deputy => Visibility::Nobody,
    }
}

impl Visibility {
    /// Mesma regra do predicado SQL, avaliada em memória.
    pub fn can_see(&self, target: Role, member_of_owned_org: bool) -> bool {
        match self {
            Visibility::All => true,
            Visibility::ExceptSuperadmins => target != Role::Superadmin,
            Visibility::OwnedOrgMembers(_) => target != Role::Superadmin && member_of_owned_org,
            Visibility::Nobody => false,
        }
    }
}

// ---
// Troca de papel
// ---

/// Fatos relidos dentro da transação.
#[derive(Debug, Clone, Copy)]
pub struct RoleChangeFacts {
    pub actor: Role,
    pub target: Role,
    pub wanted: Role,
    /// Superadmins além do alvo. Só é consultado quando `needs_superadmin_count`.
    pub other_superadmins: Option<i64>,
    /// Alvo é membro de org do ator. Só é consultado quando `needs_membership`.
    pub target_in_owned_org: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Unchanged,
    Apply,
}

pub fn needs_superadmin_count(actor: Role, target: Role, wanted: Role) -> bool {
    actor == Role::Superadmin && target == Role::Superadmin && wanted != Role::Superadmin
}

pub fn needs_membership(actor: Role) -> bool {
    actor == Role::Owner
}

/// Valida a troca na ordem fixa das regras; a primeira falha decide o erro.
/// Fatos ausentes contam como o caso mais restritivo.
pub fn plan_role_change(facts: RoleChangeFacts) -> Result<RoleChange, AppError> {
    let RoleChangeFacts {
        actor,
        target,
        wanted,
        other_superadmins,
        target_in_owned_org,
    } = facts;

    if target == Role::Superadmin && wanted != Role::Superadmin {
        if actor != Role::Superadmin {
            return Err(AppError::CannotDowngradeSuperadmin);
        }
        if other_superadmins.unwrap_or(0) < 1 {
            return Err(AppError::LastSuperadminProtected);
        }
    }

    if !can_edit_target(actor, target) {
        return Err(AppError::ForbiddenTarget);
    }

    if needs_membership(actor) && !target_in_owned_org.unwrap_or(false) {
        return Err(AppError::NotMemberOfOwnedOrg);
    }

    if !can_assign(actor, wanted) {
        return Err(AppError::ForbiddenEscalation);
    }

    if target == wanted {
        return Ok(RoleChange::Unchanged);
    }

    Ok(RoleChange::Apply)
}

// ---
// Admin grant/revoke (somente fronteira user <-> admin)
// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminChange {
    Promote,
    Demote,
    AlreadyInPlace,
}

pub fn plan_admin_grant(target: Role) -> Result<AdminChange, AppError> {
    match target {
        Role::Superadmin => Err(AppError::ImmutableSuperadmin),
        Role::Admin => Ok(AdminChange::AlreadyInPlace),
        Role::User | Role::Viewer | Role::Deputy | Role::Owner => Ok(AdminChange::Promote),
    }
}

pub fn plan_admin_revoke(target: Role) -> Result<AdminChange, AppError> {
    match target {
        Role::Superadmin => Err(AppError::CannotRevokeSuperadmin),
        Role::Admin => Ok(AdminChange::Demote),
        Role::User | Role::Viewer | Role::Deputy | Role::Owner => Ok(AdminChange::AlreadyInPlace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(actor: Role, target: Role, wanted: Role) -> RoleChangeFacts {
        RoleChangeFacts {
            actor,
            target,
            wanted,
            other_superadmins: Some(1),
            target_in_owned_org: Some(true),
        }
    }

    fn code(result: Result<RoleChange, AppError>) -> &'static str {
        match result {
            Ok(RoleChange::Apply) => "APPLY",
            Ok(RoleChange::Unchanged) => "UNCHANGED",
            Err(e) => e.code(),
        }
    }

    #[test]
    fn assignable_roles_per_actor() {
        assert_eq!(assignable_roles(Role::Superadmin).len(), 6);
        assert!(!can_assign(Role::Admin, Role::Admin));
        assert!(!can_assign(Role::Admin, Role::Superadmin));
        assert!(can_assign(Role::Admin, Role::Owner));
        assert_eq!(assignable_roles(Role::Owner), &[Role::Viewer, Role::Deputy]);
        for actor in [Role::User, Role::Viewer, Role::Deputy] {
            assert!(assignable_roles(actor).is_empty());
        }
    }

    #[test]
    fn protected_targets_are_never_editable() {
        for actor in Role::ALL {
            for target in Role::ALL {
                if is_protected_target(actor, target) {
                    assert!(!can_edit_target(actor, target), "{actor} -> {target}");
                }
            }
        }
    }

    #[test]
    fn every_assignable_role_is_reachable() {
        for actor in Role::ALL {
            for &wanted in assignable_roles(actor) {
                let reachable = Role::ALL
                    .into_iter()
                    .filter(|&target| can_edit_target(actor, target) && !is_protected_target(actor, target))
                    .any(|target| plan_role_change(facts(actor, target, wanted)).is_ok());
                assert!(reachable, "{actor} não consegue conceder {wanted}");
            }
        }
    }

    #[test]
    fn invisible_targets_cannot_be_changed() {
        let actor_id = Uuid::new_v4();
        for actor in Role::ALL {
            let visibility = visibility_for(actor, actor_id);
            for target in Role::ALL {
                for member in [false, true] {
                    if visibility.can_see(target, member) {
                        continue;
                    }
                    for wanted in Role::ALL {
                        let result = plan_role_change(RoleChangeFacts {
                            actor,
                            target,
                            wanted,
                            other_superadmins: Some(5),
                            target_in_owned_org: Some(member),
                        });
                        assert!(result.is_err(), "{actor} alterou {target} invisível para {wanted}");
                    }
                }
            }
        }
    }

    #[test]
    fn last_superadmin_cannot_demote_self() {
        let mut f = facts(Role::Superadmin, Role::Superadmin, Role::Admin);
        f.other_superadmins = Some(0);
        assert_eq!(code(plan_role_change(f)), "LAST_SUPERADMIN");

        f.other_superadmins = None;
        assert_eq!(code(plan_role_change(f)), "LAST_SUPERADMIN");

        f.other_superadmins = Some(1);
        assert_eq!(code(plan_role_change(f)), "APPLY");
    }

    #[test]
    fn only_superadmin_may_downgrade_superadmin() {
        assert_eq!(
            code(plan_role_change(facts(Role::Admin, Role::Superadmin, Role::User))),
            "CANNOT_DOWNGRADE_SUPERADMIN"
        );
        assert_eq!(
            code(plan_role_change(facts(Role::Owner, Role::Superadmin, Role::Viewer))),
            "CANNOT_DOWNGRADE_SUPERADMIN"
        );
    }

    #[test]
    fn owner_limited_to_own_members() {
        let mut f = facts(Role::Owner, Role::Viewer, Role::Deputy);
        f.target_in_owned_org = Some(false);
        assert_eq!(code(plan_role_change(f)), "FORBIDDEN_NOT_MEMBER_OF_OWNER_ORG");

        f.target_in_owned_org = Some(true);
        assert_eq!(code(plan_role_change(f)), "APPLY");

        assert_eq!(
            code(plan_role_change(facts(Role::Owner, Role::Viewer, Role::Owner))),
            "FORBIDDEN_ESCALATION"
        );
        assert_eq!(
            code(plan_role_change(facts(Role::Owner, Role::Admin, Role::Viewer))),
            "FORBIDDEN_TARGET"
        );
    }

    #[test]
    fn admin_cannot_escalate_to_admin() {
        assert_eq!(
            code(plan_role_change(facts(Role::Admin, Role::User, Role::Admin))),
            "FORBIDDEN_ESCALATION"
        );
        assert_eq!(
            code(plan_role_change(facts(Role::Admin, Role::Admin, Role::User))),
            "FORBIDDEN_TARGET"
        );
    }

    #[test]
    fn same_role_is_a_no_op() {
        for actor in Role::ALL {
            for &wanted in assignable_roles(actor) {
                if can_edit_target(actor, wanted) {
                    assert_eq!(code(plan_role_change(facts(actor, wanted, wanted))), "UNCHANGED");
                }
            }
        }
    }

    #[test]
    fn checks_run_in_order() {
        // Escalada e alvo proibido ao mesmo tempo: o alvo é verificado antes
        assert_eq!(
            code(plan_role_change(facts(Role::Viewer, Role::Admin, Role::Superadmin))),
            "FORBIDDEN_TARGET"
        );
    }

    #[test]
    fn owner_without_orgs_sees_nobody_else() {
        let owner = Uuid::new_v4();
        let vis = visibility_for(Role::Owner, owner);
        assert_eq!(vis, Visibility::OwnedOrgMembers(owner));
        assert!(!vis.can_see(Role::Viewer, false));
        assert!(!vis.can_see(Role::Superadmin, true));
        assert!(vis.can_see(Role::Viewer, true));
        assert_eq!(visibility_for(Role::Deputy, owner), Visibility::Nobody);
    }

    #[test]
    fn superadmin_count_only_needed_for_demotions() {
        assert!(needs_superadmin_count(Role::Superadmin, Role::Superadmin, Role::Admin));
        assert!(!needs_superadmin_count(Role::Superadmin, Role::Superadmin, Role::Superadmin));
        assert!(!needs_superadmin_count(Role::Superadmin, Role::Admin, Role::User));
        assert!(!needs_superadmin_count(Role::Admin, Role::Superadmin, Role::User));
    }

    #[test]
    fn admin_grant_and_revoke() {
        assert_eq!(plan_admin_grant(Role::User).unwrap(), AdminChange::Promote);
        assert_eq!(plan_admin_grant(Role::Admin).unwrap(), AdminChange::AlreadyInPlace);
        assert_eq!(plan_admin_grant(Role::Superadmin).unwrap_err().code(), "IMMUTABLE_SUPERADMIN");

        assert_eq!(plan_admin_revoke(Role::Admin).unwrap(), AdminChange::Demote);
        assert_eq!(plan_admin_revoke(Role::Viewer).unwrap(), AdminChange::AlreadyInPlace);
        assert_eq!(plan_admin_revoke(Role::Superadmin).unwrap_err().code(), "CANNOT_REVOKE_SUPERADMIN");
    }
}
