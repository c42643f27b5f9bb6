//! Role and permission domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// 权限名称常量（`resource:action`）
pub mod perms {
    pub const WORKSPACE_CREATE: &str = "workspace:create";
    pub const WORKSPACE_READ: &str = "workspace:read";
    pub const WORKSPACE_UPDATE: &str = "workspace:update";
    pub const WORKSPACE_DELETE: &str = "workspace:delete";
    pub const WORKSPACE_INVITE: &str = "workspace:invite";
    pub const WORKSPACE_MANAGE_MEMBERS: &str = "workspace:manage_members";

    pub const BOARD_CREATE: &str = "board:create";
    pub const BOARD_READ: &str = "board:read";
    pub const BOARD_UPDATE: &str = "board:update";
    pub const BOARD_DELETE: &str = "board:delete";
    pub const BOARD_INVITE: &str = "board:invite";
    pub const BOARD_MANAGE_MEMBERS: &str = "board:manage_members";

    pub const LIST_CREATE: &str = "list:create";
    pub const LIST_READ: &str = "list:read";
    pub const LIST_UPDATE: &str = "list:update";
    pub const LIST_DELETE: &str = "list:delete";
    pub const LIST_REORDER: &str = "list:reorder";

    pub const CARD_CREATE: &str = "card:create";
    pub const CARD_READ: &str = "card:read";
    pub const CARD_UPDATE: &str = "card:update";
    pub const CARD_DELETE: &str = "card:delete";
    pub const CARD_MOVE: &str = "card:move";
    pub const CARD_COMMENT: &str = "card:comment";
    pub const CARD_ASSIGN: &str = "card:assign";

    pub const USER_READ: &str = "user:read";
    pub const USER_MANAGE: &str = "user:manage";
}

/// 角色名称常量
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const USER: &str = "user";
    pub const GUEST: &str = "guest";
    pub const WORKSPACE_ADMIN: &str = "workspace_admin";
    pub const WORKSPACE_MEMBER: &str = "workspace_member";
    pub const BOARD_ADMIN: &str = "board_admin";
    pub const BOARD_MEMBER: &str = "board_member";
    pub const BOARD_VIEWER: &str = "board_viewer";
}

/// 读类权限：action 为 `read`
pub fn is_read_class(permission: &str) -> bool {
    permission
        .split_once(':')
        .is_some_and(|(_, action)| action == "read")
}

/// 角色作用域层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "role_scope", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    /// 全局角色，直接分配给用户
    Global,
    /// 工作区角色
    Workspace,
    /// 看板角色（卡片成员同样使用看板角色）
    Board,
}

/// Role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scope: RoleScope,
    pub created_at: DateTime<Utc>,
}

/// 匹配策略：需要全部权限，或任意一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    All,
    Any,
}

/// 展开后的权限集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I, S>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(permissions.into_iter().map(Into::into));
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// 按匹配策略检查。空的需求列表在两种模式下都视为满足。
    pub fn satisfies(&self, required: &[&str], mode: MatchMode) -> bool {
        if required.is_empty() {
            return true;
        }
        match mode {
            MatchMode::All => required.iter().all(|p| self.contains(p)),
            MatchMode::Any => required.iter().any(|p| self.contains(p)),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PermissionSet::new();
        set.extend(iter);
        set
    }
}

/// 全局授权路径解析出的角色与权限，挂到请求扩展上供后续 handler 复用
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPermissions {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: PermissionSet,
}

/// 内置权限目录
pub fn permission_catalog() -> Vec<(&'static str, &'static str)> {
    use perms::*;
    vec![
        (WORKSPACE_CREATE, "Create workspaces"),
        (WORKSPACE_READ, "View a workspace"),
        (WORKSPACE_UPDATE, "Edit workspace settings"),
        (WORKSPACE_DELETE, "Delete a workspace"),
        (WORKSPACE_INVITE, "Invite users to a workspace"),
        (WORKSPACE_MANAGE_MEMBERS, "Manage workspace members"),
        (BOARD_CREATE, "Create boards"),
        (BOARD_READ, "View a board"),
        (BOARD_UPDATE, "Edit board settings"),
        (BOARD_DELETE, "Delete a board"),
        (BOARD_INVITE, "Invite users to a board"),
        (BOARD_MANAGE_MEMBERS, "Manage board members"),
        (LIST_CREATE, "Create lists"),
        (LIST_READ, "View lists"),
        (LIST_UPDATE, "Edit lists"),
        (LIST_DELETE, "Delete lists"),
        (LIST_REORDER, "Reorder lists"),
        (CARD_CREATE, "Create cards"),
        (CARD_READ, "View cards"),
        (CARD_UPDATE, "Edit cards"),
        (CARD_DELETE, "Delete cards"),
        (CARD_MOVE, "Move cards"),
        (CARD_COMMENT, "Comment on cards"),
        (CARD_ASSIGN, "Assign card members"),
        (USER_READ, "View users"),
        (USER_MANAGE, "Manage users"),
    ]
}

/// 内置角色目录：(名称, 作用域, 描述, 权限)
pub fn role_catalog() -> Vec<(&'static str, RoleScope, &'static str, Vec<&'static str>)> {
    use perms::*;

    let all: Vec<&'static str> = permission_catalog().into_iter().map(|(p, _)| p).collect();
    let with_prefix = |prefixes: &[&str]| -> Vec<&'static str> {
        all.iter()
            .copied()
            .filter(|p| prefixes.iter().any(|prefix| p.starts_with(prefix)))
            .collect()
    };

    let mut workspace_admin = with_prefix(&["workspace:"]);
    workspace_admin.extend([BOARD_CREATE, BOARD_READ]);

    vec![
        (roles::ADMIN, RoleScope::Global, "System administrator", all.clone()),
        (
            roles::USER,
            RoleScope::Global,
            "Registered user",
            vec![WORKSPACE_CREATE, BOARD_CREATE, USER_READ],
        ),
        (roles::GUEST, RoleScope::Global, "Guest user", vec![USER_READ]),
        (
            roles::WORKSPACE_ADMIN,
            RoleScope::Workspace,
            "Workspace administrator",
            workspace_admin,
        ),
        (
            roles::WORKSPACE_MEMBER,
            RoleScope::Workspace,
            "Workspace member",
            vec![WORKSPACE_READ, BOARD_CREATE, BOARD_READ],
        ),
        (
            roles::BOARD_ADMIN,
            RoleScope::Board,
            "Board administrator",
            with_prefix(&["board:", "list:", "card:"]),
        ),
        (
            roles::BOARD_MEMBER,
            RoleScope::Board,
            "Board member",
            vec![
                BOARD_READ,
                LIST_CREATE,
                LIST_READ,
                LIST_UPDATE,
                LIST_REORDER,
                CARD_CREATE,
                CARD_READ,
                CARD_UPDATE,
                CARD_MOVE,
                CARD_COMMENT,
                CARD_ASSIGN,
            ],
        ),
        (
            roles::BOARD_VIEWER,
            RoleScope::Board,
            "Board viewer",
            vec![BOARD_READ, LIST_READ, CARD_READ],
        ),
    ]
}

/// Add member request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub role: String,
}

/// Change role request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct ChangeRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub role: String,
}

/// Transfer ownership request
#[derive(Debug, Deserialize)]
pub struct TransferOwnershipRequest {
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_class_detection() {
        assert!(is_read_class(perms::BOARD_READ));
        assert!(is_read_class(perms::CARD_READ));
        assert!(!is_read_class(perms::BOARD_UPDATE));
        assert!(!is_read_class("malformed"));
    }

    #[test]
    fn test_permission_all_semantics() {
        let set: PermissionSet = ["a:x", "b:y"].into_iter().collect();
        assert!(set.satisfies(&["a:x"], MatchMode::All));
        assert!(set.satisfies(&["a:x", "b:y"], MatchMode::All));
        assert!(!set.satisfies(&["a:x", "b:y", "c:z"], MatchMode::All));
    }

    #[test]
    fn test_permission_any_semantics() {
        let set: PermissionSet = ["a:x"].into_iter().collect();
        assert!(set.satisfies(&["a:x", "c:z"], MatchMode::Any));
        assert!(!set.satisfies(&["b:y", "c:z"], MatchMode::Any));
    }

    #[test]
    fn test_permission_names_are_resource_action_pairs() {
        for (name, _) in permission_catalog() {
            let (resource, action) = name.split_once(':').unwrap_or(("", ""));
            assert!(!resource.is_empty() && !action.is_empty(), "bad permission name {}", name);
            assert!(!action.contains(':'), "bad permission name {}", name);
        }
    }

    #[test]
    fn test_role_catalog_references_known_permissions() {
        let known: BTreeSet<&str> = permission_catalog().into_iter().map(|(p, _)| p).collect();
        for (role, _, _, permissions) in role_catalog() {
            for p in permissions {
                assert!(known.contains(p), "{} references unknown permission {}", role, p);
            }
        }
    }

    #[test]
    fn test_board_admin_has_every_board_scoped_permission() {
        let catalog = role_catalog();
        let (_, scope, _, admin) = catalog
            .iter()
            .find(|(name, ..)| *name == roles::BOARD_ADMIN)
            .unwrap();
        assert_eq!(*scope, RoleScope::Board);
        assert!(admin.contains(&perms::BOARD_MANAGE_MEMBERS));
        assert!(admin.contains(&perms::LIST_REORDER));
        assert!(admin.contains(&perms::CARD_DELETE));
        assert!(!admin.contains(&perms::WORKSPACE_CREATE));
    }
}
