//! Database repository layer
//!
//! 服务层只依赖这里的 trait，通过 `Arc<dyn Store>` 注入；
//! PostgreSQL 实现用于生产，内存实现用于测试和本地运行。
//! 所有写操作都经由 [`StoreTx`]，提交前的任何失败都会整体回滚。

pub mod hierarchy_repo;
pub mod memory;
pub mod membership_repo;
pub mod pg;
pub mod role_repo;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::{
    error::Result,
    models::{
        board::{Board, BoardList, Card, Workspace},
        membership::{ContainerKind, ContainerLock, Membership, MembershipStatus, NewMembership},
        position::{OrderedKind, Sibling},
        role::Role,
    },
};
use async_trait::async_trait;
use uuid::Uuid;

/// 所有权树读取
#[async_trait]
pub trait HierarchyRepository: Send + Sync {
    async fn find_workspace(&self, id: Uuid) -> Result<Option<Workspace>>;

    async fn find_board(&self, id: Uuid) -> Result<Option<Board>>;

    async fn find_list(&self, id: Uuid) -> Result<Option<BoardList>>;

    async fn find_card(&self, id: Uuid) -> Result<Option<Card>>;

    /// 按位置升序读取兄弟节点（不加锁）
    async fn list_siblings(&self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>>;
}

/// 角色、权限与成员关系读取
#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn find_membership(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>>;

    async fn list_memberships(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// 角色的权限名称
    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<String>>;

    /// 用户直接分配的全局角色
    async fn user_global_roles(&self, user_id: Uuid) -> Result<Vec<Role>>;
}

/// 事务性存储入口
#[async_trait]
pub trait Store: HierarchyRepository + AccessRepository {
    /// 开启事务
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// 连通性检查
    async fn ping(&self) -> Result<()>;
}

/// 一个存储事务。未提交即丢弃等同于回滚。
#[async_trait]
pub trait StoreTx: Send {
    // ==================== Ordering ====================

    /// 锁定父节点及其全部兄弟节点，按位置升序返回
    async fn lock_siblings(&mut self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>>;

    /// 写入位置；卡片会同时写入所属列表（跨列表移动）
    async fn write_position(
        &mut self,
        kind: OrderedKind,
        id: Uuid,
        parent_id: Uuid,
        position: f64,
    ) -> Result<()>;

    // ==================== Containers ====================

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<()>;

    async fn insert_board(&mut self, board: &Board) -> Result<()>;

    async fn insert_list(&mut self, list: &BoardList) -> Result<()>;

    async fn insert_card(&mut self, card: &Card) -> Result<()>;

    /// 锁定容器行；不存在时返回 None
    async fn lock_container(
        &mut self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Option<ContainerLock>>;

    async fn set_board_owner(&mut self, board_id: Uuid, owner_id: Uuid) -> Result<()>;

    // ==================== Memberships ====================

    /// 锁定容器的全部成员关系
    async fn lock_memberships(
        &mut self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>>;

    /// 插入成员关系；(kind, container, user) 已存在时返回 Conflict
    async fn insert_membership(&mut self, membership: &NewMembership) -> Result<Membership>;

    async fn update_membership(
        &mut self,
        id: Uuid,
        role_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> Result<Membership>;

    async fn delete_membership(&mut self, id: Uuid) -> Result<()>;

    /// 分配全局角色（已存在时忽略）
    async fn assign_global_role(&mut self, user_id: Uuid, role_id: Uuid) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
