//! Membership domain models
//! 工作区、看板、卡片成员统一为一条带容器类型标记的记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::role::{roles, RoleScope};

/// 可以持有成员关系的容器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "container_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Workspace,
    Board,
    Card,
}

impl ContainerKind {
    /// 该容器接受的角色作用域
    pub fn role_scope(self) -> RoleScope {
        match self {
            ContainerKind::Workspace => RoleScope::Workspace,
            ContainerKind::Board | ContainerKind::Card => RoleScope::Board,
        }
    }

    /// 必须始终至少保留一名成员持有的最高角色
    pub fn top_role(self) -> Option<&'static str> {
        match self {
            ContainerKind::Workspace => Some(roles::WORKSPACE_ADMIN),
            ContainerKind::Board => Some(roles::BOARD_ADMIN),
            ContainerKind::Card => None,
        }
    }

    /// 只有工作区和看板支持邀请流程
    pub fn supports_invitations(self) -> bool {
        !matches!(self, ContainerKind::Card)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Workspace => write!(f, "workspace"),
            ContainerKind::Board => write!(f, "board"),
            ContainerKind::Card => write!(f, "card"),
        }
    }
}

/// 邀请生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Accepted,
    Rejected,
}

/// 成员关系 (user, container, role)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub container_kind: ContainerKind,
    pub container_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String, // Joined from roles table
    pub status: Option<MembershipStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// 只有已接受（或无状态的卡片成员）才授予权限
    pub fn is_effective(&self) -> bool {
        matches!(self.status, None | Some(MembershipStatus::Accepted))
    }

    pub fn holds_role(&self, role_name: &str) -> bool {
        self.is_effective() && self.role_name == role_name
    }
}

/// 新建成员关系
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub container_kind: ContainerKind,
    pub container_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub status: Option<MembershipStatus>,
}

/// 容器加锁后的快照
#[derive(Debug, Clone, Copy)]
pub struct ContainerLock {
    pub owner_id: Option<Uuid>,
}

/// Invite a user directly (creates a pending membership)
#[derive(Debug, Deserialize, validator::Validate)]
pub struct InviteRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub role: String,
}

/// Respond to a pending invitation
#[derive(Debug, Deserialize)]
pub struct RespondInvitationRequest {
    pub accept: bool,
}

fn default_single_use() -> bool {
    true
}

/// Create a share link
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateShareLinkRequest {
    #[validate(length(min = 1, max = 64))]
    pub role: String,
    #[serde(default = "default_single_use")]
    pub single_use: bool,
    /// 有效期（秒），缺省使用配置值
    #[validate(range(min = 60, max = 2592000))]
    pub ttl_secs: Option<u64>,
}

/// Share link response
#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub token: String,
    pub container_kind: ContainerKind,
    pub container_id: Uuid,
    pub role: String,
    pub single_use: bool,
    pub expires_at: DateTime<Utc>,
}

/// Accept a share link
#[derive(Debug, Deserialize)]
pub struct AcceptShareLinkRequest {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(status: Option<MembershipStatus>) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            container_kind: ContainerKind::Board,
            container_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            role_name: roles::BOARD_ADMIN.to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_accepted_memberships_are_effective() {
        assert!(membership(Some(MembershipStatus::Accepted)).is_effective());
        assert!(membership(None).is_effective());
        assert!(!membership(Some(MembershipStatus::Pending)).is_effective());
        assert!(!membership(Some(MembershipStatus::Rejected)).is_effective());
    }

    #[test]
    fn test_pending_admin_does_not_hold_top_role() {
        assert!(!membership(Some(MembershipStatus::Pending)).holds_role(roles::BOARD_ADMIN));
        assert!(membership(Some(MembershipStatus::Accepted)).holds_role(roles::BOARD_ADMIN));
    }

    #[test]
    fn test_card_memberships_use_board_roles() {
        assert_eq!(ContainerKind::Card.role_scope(), RoleScope::Board);
        assert_eq!(ContainerKind::Card.top_role(), None);
        assert!(!ContainerKind::Card.supports_invitations());
    }
}
