//! In-memory store
//!
//! 写事务通过一把互斥锁串行化，在已提交状态的副本上暂存修改，
//! 提交时整体替换；事务被丢弃即回滚。读操作只看已提交状态。

use super::{AccessRepository, HierarchyRepository, Store, StoreTx};
use crate::{
    error::{AppError, Result},
    models::{
        board::{Board, BoardList, Card, Workspace},
        membership::{ContainerKind, ContainerLock, Membership, MembershipStatus, NewMembership},
        position::{sort_siblings, OrderedKind, Sibling},
        role::{permission_catalog, role_catalog, Role},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    workspaces: HashMap<Uuid, Workspace>,
    boards: HashMap<Uuid, Board>,
    lists: HashMap<Uuid, BoardList>,
    cards: HashMap<Uuid, Card>,
    roles: HashMap<Uuid, Role>,
    role_permissions: HashMap<Uuid, BTreeSet<String>>,
    user_roles: HashMap<Uuid, BTreeSet<Uuid>>,
    memberships: HashMap<Uuid, Membership>,
}

impl MemoryState {
    fn seeded() -> Self {
        let mut state = MemoryState::default();
        let known: BTreeSet<&str> = permission_catalog().into_iter().map(|(p, _)| p).collect();

        for (name, scope, description, permissions) in role_catalog() {
            let id = Uuid::new_v4();
            state.roles.insert(
                id,
                Role {
                    id,
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    scope,
                    created_at: Utc::now(),
                },
            );
            state.role_permissions.insert(
                id,
                permissions
                    .into_iter()
                    .filter(|p| known.contains(p))
                    .map(String::from)
                    .collect(),
            );
        }

        state
    }

    fn role_name(&self, role_id: Uuid) -> Result<String> {
        self.roles
            .get(&role_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| AppError::not_found("role"))
    }

    fn memberships_of(&self, kind: ContainerKind, container_id: Uuid) -> Vec<Membership> {
        let mut memberships: Vec<Membership> = self
            .memberships
            .values()
            .filter(|m| m.container_kind == kind && m.container_id == container_id)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        memberships
    }

    fn siblings_of(&self, kind: OrderedKind, parent_id: Uuid) -> Vec<Sibling> {
        let mut siblings: Vec<Sibling> = match kind {
            OrderedKind::List => self
                .lists
                .values()
                .filter(|l| l.board_id == parent_id)
                .map(|l| Sibling { id: l.id, position: l.position })
                .collect(),
            OrderedKind::Card => self
                .cards
                .values()
                .filter(|c| c.list_id == parent_id)
                .map(|c| Sibling { id: c.id, position: c.position })
                .collect(),
        };
        sort_siblings(&mut siblings);
        siblings
    }
}

/// 故障注入：让第 N 次位置写入失败一次（用于验证回滚与重试）
#[derive(Debug, Default)]
struct FaultInjector {
    fail_position_write_at: AtomicUsize,
}

impl FaultInjector {
    fn should_fail(&self) -> bool {
        self.fail_position_write_at
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    committed: Arc<RwLock<MemoryState>>,
    writer: Arc<Mutex<()>>,
    faults: Arc<FaultInjector>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// 创建并写入内置权限与角色目录
    pub fn new() -> Self {
        Self {
            committed: Arc::new(RwLock::new(MemoryState::seeded())),
            writer: Arc::new(Mutex::new(())),
            faults: Arc::new(FaultInjector::default()),
        }
    }

    /// 从现在起第 `n` 次位置写入返回 Transient 错误（仅一次）
    pub fn fail_position_write_at(&self, n: usize) {
        self.faults.fail_position_write_at.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl HierarchyRepository for MemoryStore {
    async fn find_workspace(&self, id: Uuid) -> Result<Option<Workspace>> {
        Ok(self.committed.read().await.workspaces.get(&id).cloned())
    }

    async fn find_board(&self, id: Uuid) -> Result<Option<Board>> {
        Ok(self.committed.read().await.boards.get(&id).cloned())
    }

    async fn find_list(&self, id: Uuid) -> Result<Option<BoardList>> {
        Ok(self.committed.read().await.lists.get(&id).cloned())
    }

    async fn find_card(&self, id: Uuid) -> Result<Option<Card>> {
        Ok(self.committed.read().await.cards.get(&id).cloned())
    }

    async fn list_siblings(&self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        Ok(self.committed.read().await.siblings_of(kind, parent_id))
    }
}

#[async_trait]
impl AccessRepository for MemoryStore {
    async fn find_membership(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>> {
        let state = self.committed.read().await;
        Ok(state
            .memberships
            .values()
            .find(|m| m.container_kind == kind && m.container_id == container_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_memberships(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>> {
        Ok(self.committed.read().await.memberships_of(kind, container_id))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let state = self.committed.read().await;
        Ok(state.roles.values().find(|r| r.name == name).cloned())
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<String>> {
        let state = self.committed.read().await;
        Ok(state
            .role_permissions
            .get(&role_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn user_global_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let state = self.committed.read().await;
        let mut roles: Vec<Role> = state
            .user_roles
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|role_id| state.roles.get(role_id))
            .filter(|r| r.scope == crate::models::role::RoleScope::Global)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let writer = self.writer.clone().lock_owned().await;
        let staged = self.committed.read().await.clone();

        Ok(Box::new(MemoryTx {
            _writer: writer,
            committed: self.committed.clone(),
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    _writer: OwnedMutexGuard<()>,
    committed: Arc<RwLock<MemoryState>>,
    staged: MemoryState,
    faults: Arc<FaultInjector>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_siblings(&mut self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        let parent_exists = match kind {
            OrderedKind::List => self.staged.boards.contains_key(&parent_id),
            OrderedKind::Card => self.staged.lists.contains_key(&parent_id),
        };
        if !parent_exists {
            return Err(AppError::not_found(match kind {
                OrderedKind::List => "board",
                OrderedKind::Card => "list",
            }));
        }

        Ok(self.staged.siblings_of(kind, parent_id))
    }

    async fn write_position(
        &mut self,
        kind: OrderedKind,
        id: Uuid,
        parent_id: Uuid,
        position: f64,
    ) -> Result<()> {
        if self.faults.should_fail() {
            return Err(AppError::Transient("injected write failure".to_string()));
        }

        match kind {
            OrderedKind::List => {
                let list = self
                    .staged
                    .lists
                    .get_mut(&id)
                    .filter(|l| l.board_id == parent_id)
                    .ok_or_else(|| AppError::not_found("list"))?;
                list.position = position;
            }
            OrderedKind::Card => {
                if !self.staged.lists.contains_key(&parent_id) {
                    return Err(AppError::not_found("list"));
                }
                let card = self
                    .staged
                    .cards
                    .get_mut(&id)
                    .ok_or_else(|| AppError::not_found("card"))?;
                card.list_id = parent_id;
                card.position = position;
            }
        }
        Ok(())
    }

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<()> {
        self.staged.workspaces.insert(workspace.id, workspace.clone());
        Ok(())
    }

    async fn insert_board(&mut self, board: &Board) -> Result<()> {
        if !self.staged.workspaces.contains_key(&board.workspace_id) {
            return Err(AppError::not_found("workspace"));
        }
        self.staged.boards.insert(board.id, board.clone());
        Ok(())
    }

    async fn insert_list(&mut self, list: &BoardList) -> Result<()> {
        if !self.staged.boards.contains_key(&list.board_id) {
            return Err(AppError::not_found("board"));
        }
        self.staged.lists.insert(list.id, list.clone());
        Ok(())
    }

    async fn insert_card(&mut self, card: &Card) -> Result<()> {
        if !self.staged.lists.contains_key(&card.list_id) {
            return Err(AppError::not_found("list"));
        }
        self.staged.cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn lock_container(
        &mut self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Option<ContainerLock>> {
        let lock = match kind {
            ContainerKind::Workspace => self
                .staged
                .workspaces
                .get(&container_id)
                .map(|w| ContainerLock { owner_id: Some(w.owner_id) }),
            ContainerKind::Board => self
                .staged
                .boards
                .get(&container_id)
                .map(|b| ContainerLock { owner_id: Some(b.owner_id) }),
            ContainerKind::Card => self
                .staged
                .cards
                .get(&container_id)
                .map(|_| ContainerLock { owner_id: None }),
        };
        Ok(lock)
    }

    async fn set_board_owner(&mut self, board_id: Uuid, owner_id: Uuid) -> Result<()> {
        let board = self
            .staged
            .boards
            .get_mut(&board_id)
            .ok_or_else(|| AppError::not_found("board"))?;
        board.owner_id = owner_id;
        Ok(())
    }

    async fn lock_memberships(
        &mut self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>> {
        Ok(self.staged.memberships_of(kind, container_id))
    }

    async fn insert_membership(&mut self, membership: &NewMembership) -> Result<Membership> {
        let exists = self.staged.memberships.values().any(|m| {
            m.container_kind == membership.container_kind
                && m.container_id == membership.container_id
                && m.user_id == membership.user_id
        });
        if exists {
            return Err(AppError::conflict("already a member"));
        }

        let now = Utc::now();
        let record = Membership {
            id: Uuid::new_v4(),
            container_kind: membership.container_kind,
            container_id: membership.container_id,
            user_id: membership.user_id,
            role_id: membership.role_id,
            role_name: self.staged.role_name(membership.role_id)?,
            status: membership.status,
            created_at: now,
            updated_at: now,
        };
        self.staged.memberships.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_membership(
        &mut self,
        id: Uuid,
        role_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> Result<Membership> {
        let role_name = self.staged.role_name(role_id)?;
        let membership = self
            .staged
            .memberships
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("membership"))?;

        membership.role_id = role_id;
        membership.role_name = role_name;
        membership.status = status;
        membership.updated_at = Utc::now();
        Ok(membership.clone())
    }

    async fn delete_membership(&mut self, id: Uuid) -> Result<()> {
        self.staged.memberships.remove(&id);
        Ok(())
    }

    async fn assign_global_role(&mut self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        if !self.staged.roles.contains_key(&role_id) {
            return Err(AppError::not_found("role"));
        }
        self.staged.user_roles.entry(user_id).or_default().insert(role_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            _writer,
            committed,
            staged,
            ..
        } = *self;

        *committed.write().await = staged;
        drop(_writer);
        Ok(())
    }
}
