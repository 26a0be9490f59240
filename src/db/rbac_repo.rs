// src/db/rbac_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::rbac::{AdminRow, OrganizationRow, Role, UserListItem, UserMembershipRow},
    services::policy::Visibility,
};

// Limite fixo das listagens administrativas
pub const LIST_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct RbacRepository {
    pool: PgPool,
}

/// Escapa os curingas do LIKE e envolve em `%...%`.
pub(crate) fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Anexa o predicado de visibilidade (precedido de AND) sobre o alias `u`.
/// O owner sem organizações cai no subselect vazio: nunca num "sem filtro".
pub(crate) fn push_visibility(qb: &mut QueryBuilder<'_, Postgres>, visibility: &Visibility) {
    match visibility {
        Visibility::All => {}
        Visibility::ExceptSuperadmins => {
            qb.push(" AND u.role <> ").push_bind(Role::Superadmin);
        }
        Visibility::OwnedOrgMembers(owner_id) => {
            qb.push(" AND u.role <> ")
                .push_bind(Role::Superadmin)
                .push(
                    " AND u.id IN (SELECT m.user_id FROM organization_members m \
                     JOIN organizations o ON o.id = m.org_id WHERE o.owner_id = ",
                )
                .push_bind(*owner_id)
                .push(")");
        }
        Visibility::Nobody => {
            qb.push(" AND FALSE");
        }
    }
}

fn push_user_search(qb: &mut QueryBuilder<'_, Postgres>, search: &str) {
    let pattern = contains_pattern(search);
    qb.push(" AND (u.email ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR p.first_name ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR p.last_name ILIKE ")
        .push_bind(pattern)
        .push(")");
}

fn users_query<'a>(
    visibility: &Visibility,
    search: Option<&str>,
    role: Option<Role>,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT u.id, u.email, u.role, u.created_at, p.first_name, p.last_name, p.avatar_url \
         FROM users u LEFT JOIN user_profiles p ON p.user_id = u.id WHERE TRUE",
    );
    push_visibility(&mut qb, visibility);
    if let Some(search) = search {
        push_user_search(&mut qb, search);
    }
    if let Some(role) = role {
        qb.push(" AND u.role = ").push_bind(role);
    }
    qb.push(" ORDER BY u.created_at DESC LIMIT ").push_bind(LIST_LIMIT);
    qb
}

fn organizations_query<'a>(owner: Option<Uuid>, search: Option<&str>) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT o.id, o.name, o.logo_url, o.status, o.plan, o.created_at, \
         ow.id AS owner_id, ow.email AS owner_email, ow.role AS owner_role, \
         (SELECT COUNT(*) FROM organization_members m WHERE m.org_id = o.id) AS member_count \
         FROM organizations o JOIN users ow ON ow.id = o.owner_id WHERE TRUE",
    );
    if let Some(owner) = owner {
        qb.push(" AND o.owner_id = ").push_bind(owner);
    }
    if let Some(search) = search {
        qb.push(" AND o.name ILIKE ").push_bind(contains_pattern(search));
    }
    qb.push(" ORDER BY o.created_at DESC LIMIT ").push_bind(LIST_LIMIT);
    qb
}

impl RbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // 1. Usuários visíveis ao ator (sem as organizações; ver `memberships_for`)
    pub async fn list_visible_users(
        &self,
        visibility: &Visibility,
        search: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<UserListItem>, AppError> {
        let items = users_query(visibility, search, role)
            .build_query_as::<UserListItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    // 2. Organizações de um lote de usuários, numa só consulta
    pub async fn memberships_for(&self, user_ids: &[Uuid]) -> Result<Vec<UserMembershipRow>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, UserMembershipRow>(
            r#"
            SELECT m.user_id, o.id AS org_id, o.name AS org_name, o.logo_url
            FROM organization_members m
            JOIN organizations o ON o.id = m.org_id
            WHERE m.user_id = ANY($1)
            ORDER BY o.name
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // 3. Organizações (todas, ou só as do owner)
    pub async fn list_organizations(
        &self,
        owner: Option<Uuid>,
        search: Option<&str>,
    ) -> Result<Vec<OrganizationRow>, AppError> {
        let rows = organizations_query(owner, search)
            .build_query_as::<OrganizationRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// O alvo é membro de alguma organização deste owner? Lido dentro da transação de papel.
    pub async fn is_member_of_owned_org<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM organization_members m
                JOIN organizations o ON o.id = m.org_id
                WHERE m.user_id = $1 AND o.owner_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(owner_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    // 4. Admins e superadmins, com dados de perfil
    pub async fn list_admins(&self) -> Result<Vec<AdminRow>, AppError> {
        let rows = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT u.id, u.email, u.role, u.created_at, p.first_name, p.last_name, p.avatar_url
            FROM users u
            LEFT JOIN user_profiles p ON p.user_id = u.id
            WHERE u.role IN ('admin', 'superadmin')
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(visibility: Visibility) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT u.id FROM users u WHERE TRUE");
        push_visibility(&mut qb, &visibility);
        qb.sql().to_string()
    }

    #[test]
    fn superadmin_has_no_filter() {
        assert_eq!(rendered(Visibility::All), "SELECT u.id FROM users u WHERE TRUE");
    }

    #[test]
    fn admin_excludes_superadmins() {
        assert_eq!(
            rendered(Visibility::ExceptSuperadmins),
            "SELECT u.id FROM users u WHERE TRUE AND u.role <> $1"
        );
    }

    #[test]
    fn owner_is_bounded_by_owned_org_subquery() {
        let sql = rendered(Visibility::OwnedOrgMembers(Uuid::new_v4()));
        assert!(sql.contains("u.role <> $1"));
        assert!(sql.contains("u.id IN (SELECT m.user_id FROM organization_members m"));
        assert!(sql.contains("WHERE o.owner_id = $2)"));
    }

    #[test]
    fn other_roles_match_nothing() {
        assert!(rendered(Visibility::Nobody).ends_with(" AND FALSE"));
    }

    #[test]
    fn filters_are_conjunctive() {
        let qb = users_query(&Visibility::ExceptSuperadmins, Some("anna"), Some(Role::Viewer));
        let sql = qb.sql();
        assert!(sql.contains(
            "AND u.role <> $1 AND (u.email ILIKE $2 OR p.first_name ILIKE $3 OR p.last_name ILIKE $4) AND u.role = $5"
        ));
        assert!(sql.ends_with("ORDER BY u.created_at DESC LIMIT $6"));
    }

    #[test]
    fn organizations_scoped_to_owner() {
        let scoped = organizations_query(Some(Uuid::new_v4()), None);
        assert!(scoped.sql().contains("AND o.owner_id = $1"));

        let all = organizations_query(None, Some("gmbh"));
        assert!(!all.sql().contains("owner_id = $"));
        assert!(all.sql().contains("AND o.name ILIKE $1"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("anna"), "%anna%");
    }
}
