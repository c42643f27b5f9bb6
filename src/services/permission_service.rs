//! 权限解析服务
//!
//! 目标 → 所属容器 → 可见性旁路 → 成员关系 → 角色 → 权限集合 → 匹配。
//! 卡片先看卡片成员，再向上合并看板成员；看板可见性只放行读类检查。

use super::retry_transient;
use crate::{
    error::{AppError, Result},
    models::{
        board::{Board, Card, PermissionLevel, Workspace},
        membership::ContainerKind,
        role::{is_read_class, perms, roles, MatchMode, PermissionSet, ResolvedPermissions, RoleScope},
    },
    repository::Store,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// 授权目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Workspace(Uuid),
    Board(Uuid),
    List(Uuid),
    Card(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Workspace,
    Board,
    List,
    Card,
}

impl TargetKind {
    pub fn target(self, id: Uuid) -> Target {
        match self {
            TargetKind::Workspace => Target::Workspace(id),
            TargetKind::Board => Target::Board(id),
            TargetKind::List => Target::List(id),
            TargetKind::Card => Target::Card(id),
        }
    }

    /// 卡片检查默认 ANY，其余默认 ALL
    pub fn default_mode(self) -> MatchMode {
        match self {
            TargetKind::Card => MatchMode::Any,
            _ => MatchMode::All,
        }
    }
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Workspace(_) => TargetKind::Workspace,
            Target::Board(_) => TargetKind::Board,
            Target::List(_) => TargetKind::List,
            Target::Card(_) => TargetKind::Card,
        }
    }
}

/// 目标所属的成员容器
#[derive(Debug, Clone)]
pub enum Container {
    Workspace(Workspace),
    Board(Board),
    Card { card: Card, board: Board },
}

impl Container {
    pub fn board(&self) -> Option<&Board> {
        match self {
            Container::Workspace(_) => None,
            Container::Board(board) | Container::Card { board, .. } => Some(board),
        }
    }
}

/// 对某个目标解析出的访问信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct Access {
    /// 生效成员关系的角色（卡片在前，看板在后）
    pub roles: Vec<String>,
    /// 成员关系授予的权限；不是成员时为 None
    pub member_permissions: Option<PermissionSet>,
    /// 可见性旁路授予的读权限
    pub bypass_permissions: PermissionSet,
}

impl Access {
    /// 读类需求才计入旁路权限
    fn effective_for(&self, required: &[&str]) -> Option<PermissionSet> {
        let read_only = !required.is_empty() && required.iter().all(|p| is_read_class(p));
        let bypass = read_only && !self.bypass_permissions.is_empty();

        match (&self.member_permissions, bypass) {
            (Some(member), true) => {
                let mut set = member.clone();
                set.extend(self.bypass_permissions.iter());
                Some(set)
            }
            (Some(member), false) => Some(member.clone()),
            (None, true) => Some(self.bypass_permissions.clone()),
            (None, false) => None,
        }
    }

    /// 成员权限与旁路权限的并集
    pub fn all_permissions(&self) -> PermissionSet {
        let mut set = self.member_permissions.clone().unwrap_or_default();
        set.extend(self.bypass_permissions.iter());
        set
    }
}

/// 看板可见性旁路可以授予的读权限
const BYPASS_READ: [&str; 3] = [perms::BOARD_READ, perms::LIST_READ, perms::CARD_READ];

pub struct PermissionService {
    store: Arc<dyn Store>,
    max_retries: u32,
}

impl PermissionService {
    pub fn new(store: Arc<dyn Store>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// 定位目标所属容器：卡片 → 列表 → 看板，列表 → 看板
    pub async fn resolve_container(&self, target: Target) -> Result<Container> {
        match target {
            Target::Workspace(id) => self
                .store
                .find_workspace(id)
                .await?
                .map(Container::Workspace)
                .ok_or_else(|| AppError::not_found("workspace")),
            Target::Board(id) => self.board(id).await.map(Container::Board),
            Target::List(id) => {
                let list = self
                    .store
                    .find_list(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("list"))?;
                self.board(list.board_id).await.map(Container::Board)
            }
            Target::Card(id) => {
                let card = self
                    .store
                    .find_card(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("card"))?;
                let list = self
                    .store
                    .find_list(card.list_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("list"))?;
                let board = self.board(list.board_id).await?;
                Ok(Container::Card { card, board })
            }
        }
    }

    async fn board(&self, id: Uuid) -> Result<Board> {
        self.store
            .find_board(id)
            .await?
            .ok_or_else(|| AppError::not_found("board"))
    }

    /// 解析用户对目标的访问信息
    pub async fn access(&self, user_id: Uuid, target: Target) -> Result<Access> {
        let container = self.resolve_container(target).await?;
        let mut access = Access::default();

        match &container {
            Container::Workspace(workspace) => {
                self.merge_membership(&mut access, ContainerKind::Workspace, workspace.id, user_id)
                    .await?;
            }
            Container::Board(board) => {
                self.merge_membership(&mut access, ContainerKind::Board, board.id, user_id)
                    .await?;
            }
            Container::Card { card, board } => {
                self.merge_membership(&mut access, ContainerKind::Card, card.id, user_id)
                    .await?;
                self.merge_membership(&mut access, ContainerKind::Board, board.id, user_id)
                    .await?;
            }
        }

        if let Some(board) = container.board() {
            if self.visibility_grants_read(board, user_id).await? {
                access.bypass_permissions.extend(BYPASS_READ);
            }
        }

        Ok(access)
    }

    async fn merge_membership(
        &self,
        access: &mut Access,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        let membership = match self.store.find_membership(kind, container_id, user_id).await? {
            Some(m) if m.is_effective() => m,
            _ => return Ok(()),
        };

        let permissions = self.store.role_permissions(membership.role_id).await?;
        access
            .member_permissions
            .get_or_insert_with(PermissionSet::new)
            .extend(permissions);
        access.roles.push(membership.role_name);
        Ok(())
    }

    /// 公开看板对所有人可读；工作区可见看板对已接受的工作区成员可读
    async fn visibility_grants_read(&self, board: &Board, user_id: Uuid) -> Result<bool> {
        match board.permission_level {
            PermissionLevel::Public => Ok(true),
            PermissionLevel::Workspace => Ok(self
                .store
                .find_membership(ContainerKind::Workspace, board.workspace_id, user_id)
                .await?
                .is_some_and(|m| m.is_effective())),
            PermissionLevel::Private => Ok(false),
        }
    }

    /// 用户对目标的全部有效权限（自省用）
    pub async fn permissions_for(&self, user_id: Uuid, target: Target) -> Result<PermissionSet> {
        let access = self.access(user_id, target).await?;
        if access.member_permissions.is_none() && access.bypass_permissions.is_empty() {
            return Err(AppError::not_a_member());
        }
        Ok(access.all_permissions())
    }

    /// 检查权限，失败时返回 NotFound（非成员）或 Forbidden（权限不足）
    #[instrument(skip(self))]
    pub async fn require(
        &self,
        user_id: Uuid,
        target: Target,
        required: &[&str],
        mode: MatchMode,
    ) -> Result<()> {
        let access = self.access(user_id, target).await?;

        let Some(effective) = access.effective_for(required) else {
            record_denial(target.kind(), "not_a_member");
            return Err(AppError::not_a_member());
        };

        if !effective.satisfies(required, mode) {
            record_denial(target.kind(), "insufficient");
            tracing::warn!(
                user_id = %user_id,
                target = ?target,
                required = ?required,
                roles = ?access.roles,
                "Permission denied"
            );
            return Err(AppError::Forbidden);
        }

        Ok(())
    }

    /// 全局角色解析；没有任何全局角色的用户按普通注册用户处理
    pub async fn global_permissions(&self, user_id: Uuid) -> Result<ResolvedPermissions> {
        let mut assigned = self.store.user_global_roles(user_id).await?;
        if assigned.is_empty() {
            if let Some(default) = self.store.find_role_by_name(roles::USER).await? {
                assigned.push(default);
            }
        }

        let mut permissions = PermissionSet::new();
        for role in &assigned {
            permissions.extend(self.store.role_permissions(role.id).await?);
        }

        Ok(ResolvedPermissions {
            user_id,
            roles: assigned.into_iter().map(|r| r.name).collect(),
            permissions,
        })
    }

    /// 全局路径检查
    pub async fn require_global(
        &self,
        user_id: Uuid,
        required: &[&str],
        mode: MatchMode,
    ) -> Result<ResolvedPermissions> {
        let resolved = self.global_permissions(user_id).await?;
        if !resolved.permissions.satisfies(required, mode) {
            record_denial_global();
            tracing::warn!(
                user_id = %user_id,
                required = ?required,
                roles = ?resolved.roles,
                "Global permission denied"
            );
            return Err(AppError::Forbidden);
        }
        Ok(resolved)
    }

    /// 给用户分配全局角色（需要 `user:manage`，由全局守卫在路由层检查）
    #[instrument(skip(self))]
    pub async fn assign_global_role(&self, user_id: Uuid, role_name: &str) -> Result<()> {
        let role = self
            .store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::not_found("role"))?;
        if role.scope != RoleScope::Global {
            return Err(AppError::bad_request("role is not a global role"));
        }

        retry_transient(self.max_retries, "assign_global_role", || async {
            let mut tx = self.store.begin().await?;
            tx.assign_global_role(user_id, role.id).await?;
            tx.commit().await
        })
        .await?;

        tracing::info!(user_id = %user_id, role = %role.name, "Global role assigned");
        Ok(())
    }
}

fn record_denial(kind: TargetKind, reason: &'static str) {
    let kind = match kind {
        TargetKind::Workspace => "workspace",
        TargetKind::Board => "board",
        TargetKind::List => "list",
        TargetKind::Card => "card",
    };
    metrics::counter!("authorization_denied_total", "target" => kind, "reason" => reason)
        .increment(1);
}

fn record_denial_global() {
    metrics::counter!("authorization_denied_total", "target" => "global", "reason" => "insufficient")
        .increment(1);
}
