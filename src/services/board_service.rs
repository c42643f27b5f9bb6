//! 工作区 / 看板 / 列表 / 卡片创建

use super::{retry_transient, PositionService};
use crate::{
    error::{AppError, Result},
    models::{
        board::{Board, BoardList, Card, PermissionLevel, Workspace},
        membership::{ContainerKind, MembershipStatus, NewMembership},
        position::OrderedKind,
        role::{roles, Role},
    },
    repository::Store,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct BoardService {
    store: Arc<dyn Store>,
    positions: Arc<PositionService>,
    max_retries: u32,
}

impl BoardService {
    pub fn new(store: Arc<dyn Store>, positions: Arc<PositionService>, max_retries: u32) -> Self {
        Self {
            store,
            positions,
            max_retries,
        }
    }

    async fn role(&self, name: &str) -> Result<Role> {
        self.store
            .find_role_by_name(name)
            .await?
            .ok_or_else(|| AppError::Internal(format!("built-in role {} is missing", name)))
    }

    /// 创建工作区，创建者成为 `workspace_admin`
    #[instrument(skip(self))]
    pub async fn create_workspace(&self, owner_id: Uuid, name: &str) -> Result<Workspace> {
        let admin = self.role(roles::WORKSPACE_ADMIN).await?;

        let workspace = retry_transient(self.max_retries, "create_workspace", || async {
            let workspace = Workspace {
                id: Uuid::new_v4(),
                name: name.to_string(),
                owner_id,
                created_at: Utc::now(),
            };

            let mut tx = self.store.begin().await?;
            tx.insert_workspace(&workspace).await?;
            tx.insert_membership(&NewMembership {
                container_kind: ContainerKind::Workspace,
                container_id: workspace.id,
                user_id: owner_id,
                role_id: admin.id,
                status: Some(MembershipStatus::Accepted),
            })
            .await?;
            tx.commit().await?;
            Ok(workspace)
        })
        .await?;

        info!(workspace_id = %workspace.id, owner_id = %owner_id, "Workspace created");
        Ok(workspace)
    }

    /// 创建看板，创建者成为所有者并持有 `board_admin`（同一事务）
    #[instrument(skip(self))]
    pub async fn create_board(
        &self,
        workspace_id: Uuid,
        owner_id: Uuid,
        name: &str,
        permission_level: PermissionLevel,
    ) -> Result<Board> {
        let admin = self.role(roles::BOARD_ADMIN).await?;

        let board = retry_transient(self.max_retries, "create_board", || async {
            let board = Board {
                id: Uuid::new_v4(),
                workspace_id,
                name: name.to_string(),
                owner_id,
                permission_level,
                created_at: Utc::now(),
            };

            let mut tx = self.store.begin().await?;
            tx.lock_container(ContainerKind::Workspace, workspace_id)
                .await?
                .ok_or_else(|| AppError::not_found("workspace"))?;
            tx.insert_board(&board).await?;
            tx.insert_membership(&NewMembership {
                container_kind: ContainerKind::Board,
                container_id: board.id,
                user_id: owner_id,
                role_id: admin.id,
                status: Some(MembershipStatus::Accepted),
            })
            .await?;
            tx.commit().await?;
            Ok(board)
        })
        .await?;

        info!(
            board_id = %board.id,
            workspace_id = %workspace_id,
            owner_id = %owner_id,
            "Board created"
        );
        Ok(board)
    }

    /// 在看板末尾创建列表
    #[instrument(skip(self))]
    pub async fn create_list(&self, board_id: Uuid, name: &str) -> Result<BoardList> {
        retry_transient(self.max_retries, "create_list", || async {
            let mut tx = self.store.begin().await?;
            let position = self
                .positions
                .append_in(tx.as_mut(), OrderedKind::List, board_id)
                .await?;

            let list = BoardList {
                id: Uuid::new_v4(),
                board_id,
                name: name.to_string(),
                position,
                created_at: Utc::now(),
            };
            tx.insert_list(&list).await?;
            tx.commit().await?;
            Ok(list)
        })
        .await
    }

    /// 在列表末尾创建卡片
    #[instrument(skip(self))]
    pub async fn create_card(&self, list_id: Uuid, title: &str) -> Result<Card> {
        retry_transient(self.max_retries, "create_card", || async {
            let mut tx = self.store.begin().await?;
            let position = self
                .positions
                .append_in(tx.as_mut(), OrderedKind::Card, list_id)
                .await?;

            let card = Card {
                id: Uuid::new_v4(),
                list_id,
                title: title.to_string(),
                position,
                created_at: Utc::now(),
            };
            tx.insert_card(&card).await?;
            tx.commit().await?;
            Ok(card)
        })
        .await
    }

    pub async fn get_workspace(&self, id: Uuid) -> Result<Workspace> {
        self.store
            .find_workspace(id)
            .await?
            .ok_or_else(|| AppError::not_found("workspace"))
    }

    pub async fn get_board(&self, id: Uuid) -> Result<Board> {
        self.store
            .find_board(id)
            .await?
            .ok_or_else(|| AppError::not_found("board"))
    }

    pub async fn get_card(&self, id: Uuid) -> Result<Card> {
        self.store
            .find_card(id)
            .await?
            .ok_or_else(|| AppError::not_found("card"))
    }
}
