//! PostgreSQL store
//! 事务内使用 `SELECT ... FOR UPDATE` 锁定父节点和兄弟集合 / 成员集合

use super::{membership_repo, Store, StoreTx};
use crate::{
    error::{AppError, Result},
    models::{
        board::{Board, BoardList, Card, Workspace},
        membership::{ContainerKind, ContainerLock, Membership, MembershipStatus, NewMembership},
        position::{OrderedKind, Sibling},
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pub(crate) db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.db.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin transaction");
            AppError::from(e)
        })?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> Result<()> {
        match crate::db::health_check(&self.db).await {
            crate::db::HealthStatus::Healthy => Ok(()),
            crate::db::HealthStatus::Unhealthy(msg) => Err(AppError::Transient(msg)),
        }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_siblings(&mut self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        let (parent_sql, siblings_sql, parent_name) = match kind {
            OrderedKind::List => (
                "SELECT id FROM boards WHERE id = $1 FOR UPDATE",
                "SELECT id, position FROM lists WHERE board_id = $1 ORDER BY position, id FOR UPDATE",
                "board",
            ),
            OrderedKind::Card => (
                "SELECT id FROM lists WHERE id = $1 FOR UPDATE",
                "SELECT id, position FROM cards WHERE list_id = $1 ORDER BY position, id FOR UPDATE",
                "list",
            ),
        };

        // 先锁父节点，阻止并发插入新的兄弟节点
        let parent: Option<Uuid> = sqlx::query_scalar(parent_sql)
            .bind(parent_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        if parent.is_none() {
            return Err(AppError::not_found(parent_name));
        }

        let siblings = sqlx::query_as::<_, Sibling>(siblings_sql)
            .bind(parent_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(siblings)
    }

    async fn write_position(
        &mut self,
        kind: OrderedKind,
        id: Uuid,
        parent_id: Uuid,
        position: f64,
    ) -> Result<()> {
        let sql = match kind {
            OrderedKind::List => "UPDATE lists SET position = $2 WHERE id = $1 AND board_id = $3",
            OrderedKind::Card => "UPDATE cards SET position = $2, list_id = $3 WHERE id = $1",
        };

        let result = sqlx::query(sql)
            .bind(id)
            .bind(position)
            .bind(parent_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(kind.to_string()));
        }
        Ok(())
    }

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<()> {
        sqlx::query(
            "INSERT INTO workspaces (id, name, owner_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(workspace.owner_id)
        .bind(workspace.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_board(&mut self, board: &Board) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO boards (id, workspace_id, name, owner_id, permission_level, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(board.id)
        .bind(board.workspace_id)
        .bind(&board.name)
        .bind(board.owner_id)
        .bind(board.permission_level)
        .bind(board.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_list(&mut self, list: &BoardList) -> Result<()> {
        sqlx::query(
            "INSERT INTO lists (id, board_id, name, position, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(list.id)
        .bind(list.board_id)
        .bind(&list.name)
        .bind(list.position)
        .bind(list.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_card(&mut self, card: &Card) -> Result<()> {
        sqlx::query(
            "INSERT INTO cards (id, list_id, title, position, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(card.id)
        .bind(card.list_id)
        .bind(&card.title)
        .bind(card.position)
        .bind(card.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_container(
        &mut self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Option<ContainerLock>> {
        membership_repo::lock_container(&mut *self.tx, kind, container_id).await
    }

    async fn set_board_owner(&mut self, board_id: Uuid, owner_id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE boards SET owner_id = $2 WHERE id = $1")
            .bind(board_id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("board"));
        }
        Ok(())
    }

    async fn lock_memberships(
        &mut self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>> {
        membership_repo::lock_memberships(&mut *self.tx, kind, container_id).await
    }

    async fn insert_membership(&mut self, membership: &NewMembership) -> Result<Membership> {
        // 唯一约束 (container_kind, container_id, user_id) 冲突时映射为 Conflict
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO memberships (id, container_kind, container_id, user_id, role_id, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(membership.container_kind)
        .bind(membership.container_id)
        .bind(membership.user_id)
        .bind(membership.role_id)
        .bind(membership.status)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("already a member"),
            other => other,
        })?;

        membership_repo::fetch_membership_by_id(&mut *self.tx, id).await
    }

    async fn update_membership(
        &mut self,
        id: Uuid,
        role_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> Result<Membership> {
        let result = sqlx::query(
            "UPDATE memberships SET role_id = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(role_id)
        .bind(status)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("membership"));
        }

        membership_repo::fetch_membership_by_id(&mut *self.tx, id).await
    }

    async fn delete_membership(&mut self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM memberships WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn assign_global_role(&mut self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit transaction");
            AppError::from(e)
        })
    }
}
