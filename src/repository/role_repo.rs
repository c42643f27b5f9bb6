//! Role repository (角色、权限与成员关系读取)

use super::{membership_repo::MEMBERSHIP_SELECT, AccessRepository, PgStore};
use crate::{
    error::Result,
    models::{
        membership::{ContainerKind, Membership},
        role::{permission_catalog, role_catalog, Role},
    },
};
use async_trait::async_trait;
use uuid::Uuid;

impl PgStore {
    /// 写入内置权限与角色目录（幂等）
    pub async fn bootstrap_rbac(&self) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for (name, description) in permission_catalog() {
            sqlx::query(
                r#"
                INSERT INTO permissions (id, name, description)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(description)
            .execute(&mut *tx)
            .await?;
        }

        for (name, scope, description, permissions) in role_catalog() {
            let permissions: Vec<String> = permissions.into_iter().map(String::from).collect();

            sqlx::query(
                r#"
                INSERT INTO roles (id, name, description, scope)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(description)
            .bind(scope)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT r.id, p.id
                FROM roles r, permissions p
                WHERE r.name = $1 AND p.name = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(name)
            .bind(&permissions)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!("RBAC catalogue bootstrapped");
        Ok(())
    }
}

#[async_trait]
impl AccessRepository for PgStore {
    async fn find_membership(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "{} WHERE m.container_kind = $1 AND m.container_id = $2 AND m.user_id = $3",
            MEMBERSHIP_SELECT
        ))
        .bind(kind)
        .bind(container_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(membership)
    }

    async fn list_memberships(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "{} WHERE m.container_kind = $1 AND m.container_id = $2 ORDER BY m.created_at, m.id",
            MEMBERSHIP_SELECT
        ))
        .bind(kind)
        .bind(container_id)
        .fetch_all(&self.db)
        .await?;

        Ok(memberships)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        Ok(role)
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<String>> {
        let permissions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT p.name
            FROM permissions p
            JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    async fn user_global_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.*
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1 AND r.scope = 'global'
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }
}
