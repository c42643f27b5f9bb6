//! 成员关系管理
//!
//! 所有变更都在一个事务内完成：先锁容器行，再锁该容器的全部成员关系，
//! 然后检查所有者与最后一名管理员约束，最后写入。

use super::retry_transient;
use crate::{
    error::{AppError, Result},
    models::{
        membership::{ContainerKind, ContainerLock, Membership, MembershipStatus, NewMembership},
        role::{roles, Role},
    },
    repository::{Store, StoreTx},
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct MembershipService {
    store: Arc<dyn Store>,
    max_retries: u32,
}

impl MembershipService {
    pub fn new(store: Arc<dyn Store>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// 按名称查找角色，并校验其作用域与容器匹配
    pub(crate) async fn role_for(&self, kind: ContainerKind, role_name: &str) -> Result<Role> {
        let role = self
            .store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::not_found("role"))?;

        if role.scope != kind.role_scope() {
            return Err(AppError::BadRequest(format!(
                "role {} cannot be granted on a {}",
                role.name, kind
            )));
        }
        Ok(role)
    }

    pub async fn list_members(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
    ) -> Result<Vec<Membership>> {
        self.store.list_memberships(kind, container_id).await
    }

    /// 直接添加成员（已接受）；已存在时返回 Conflict
    #[instrument(skip(self))]
    pub async fn add_member(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<Membership> {
        let role = self.role_for(kind, role_name).await?;
        let status = if kind.supports_invitations() {
            Some(MembershipStatus::Accepted)
        } else {
            None
        };

        let membership = self
            .insert(kind, container_id, user_id, &role, status, "add_member")
            .await?;

        info!(
            kind = %kind,
            container_id = %container_id,
            user_id = %user_id,
            role = %role.name,
            "Member added"
        );
        Ok(membership)
    }

    /// 直接邀请：创建待处理的成员关系
    #[instrument(skip(self))]
    pub async fn invite(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<Membership> {
        if !kind.supports_invitations() {
            return Err(AppError::bad_request("cards do not support invitations"));
        }
        let role = self.role_for(kind, role_name).await?;

        let membership = self
            .insert(
                kind,
                container_id,
                user_id,
                &role,
                Some(MembershipStatus::Pending),
                "invite",
            )
            .await?;

        info!(
            kind = %kind,
            container_id = %container_id,
            user_id = %user_id,
            role = %role.name,
            "Invitation created"
        );
        Ok(membership)
    }

    async fn insert(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
        role: &Role,
        status: Option<MembershipStatus>,
        operation: &'static str,
    ) -> Result<Membership> {
        let new = NewMembership {
            container_kind: kind,
            container_id,
            user_id,
            role_id: role.id,
            status,
        };

        retry_transient(self.max_retries, operation, || async {
            let mut tx = self.store.begin().await?;
            lock_container(tx.as_mut(), kind, container_id).await?;
            let membership = tx.insert_membership(&new).await?;
            tx.commit().await?;
            Ok(membership)
        })
        .await
    }

    /// 接受或拒绝待处理的邀请
    #[instrument(skip(self))]
    pub async fn respond_invitation(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
        accept: bool,
    ) -> Result<Membership> {
        let status = if accept {
            MembershipStatus::Accepted
        } else {
            MembershipStatus::Rejected
        };

        let membership = retry_transient(self.max_retries, "respond_invitation", || async {
            let mut tx = self.store.begin().await?;
            lock_container(tx.as_mut(), kind, container_id).await?;
            let memberships = tx.lock_memberships(kind, container_id).await?;
            let invitation = find_member(&memberships, user_id)
                .ok_or_else(|| AppError::not_found("invitation"))?;

            if invitation.status != Some(MembershipStatus::Pending) {
                return Err(AppError::bad_request("invitation is not pending"));
            }

            let updated = tx
                .update_membership(invitation.id, invitation.role_id, Some(status))
                .await?;
            tx.commit().await?;
            Ok(updated)
        })
        .await?;

        info!(
            kind = %kind,
            container_id = %container_id,
            user_id = %user_id,
            accepted = accept,
            "Invitation answered"
        );
        Ok(membership)
    }

    /// 修改成员角色。降级所有者或最后一名管理员返回 Forbidden。
    #[instrument(skip(self))]
    pub async fn change_role(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<Membership> {
        let role = self.role_for(kind, role_name).await?;

        let membership = retry_transient(self.max_retries, "change_role", || async {
            let mut tx = self.store.begin().await?;
            let lock = lock_container(tx.as_mut(), kind, container_id).await?;
            let memberships = tx.lock_memberships(kind, container_id).await?;
            let target = find_member(&memberships, user_id).ok_or_else(AppError::not_a_member)?;

            if kind.top_role() != Some(role.name.as_str()) {
                ensure_top_role_survives(kind, &lock, &memberships, target)?;
            }

            let updated = tx.update_membership(target.id, role.id, target.status).await?;
            tx.commit().await?;
            Ok(updated)
        })
        .await?;

        info!(
            kind = %kind,
            container_id = %container_id,
            user_id = %user_id,
            role = %role.name,
            "Member role changed"
        );
        Ok(membership)
    }

    /// 移除成员。移除所有者或最后一名管理员返回 Forbidden。
    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        retry_transient(self.max_retries, "remove_member", || async {
            let mut tx = self.store.begin().await?;
            let lock = lock_container(tx.as_mut(), kind, container_id).await?;
            let memberships = tx.lock_memberships(kind, container_id).await?;
            let target = find_member(&memberships, user_id).ok_or_else(AppError::not_a_member)?;

            ensure_top_role_survives(kind, &lock, &memberships, target)?;

            tx.delete_membership(target.id).await?;
            tx.commit().await
        })
        .await?;

        info!(
            kind = %kind,
            container_id = %container_id,
            user_id = %user_id,
            "Member removed"
        );
        Ok(())
    }

    /// 用户主动退出，与移除成员受相同约束
    pub async fn leave(&self, kind: ContainerKind, container_id: Uuid, user_id: Uuid) -> Result<()> {
        self.remove_member(kind, container_id, user_id).await
    }

    /// 转移看板所有权。调用者必须是当前所有者，新所有者必须是已接受的成员，
    /// 转移后新所有者持有 `board_admin`。
    #[instrument(skip(self))]
    pub async fn transfer_ownership(
        &self,
        board_id: Uuid,
        caller_id: Uuid,
        new_owner_id: Uuid,
    ) -> Result<Membership> {
        let admin = self.role_for(ContainerKind::Board, roles::BOARD_ADMIN).await?;

        let membership = retry_transient(self.max_retries, "transfer_ownership", || async {
            let mut tx = self.store.begin().await?;
            let lock = lock_container(tx.as_mut(), ContainerKind::Board, board_id).await?;
            if lock.owner_id != Some(caller_id) {
                return Err(AppError::Forbidden);
            }

            let memberships = tx.lock_memberships(ContainerKind::Board, board_id).await?;
            let target = find_member(&memberships, new_owner_id)
                .filter(|m| m.is_effective())
                .ok_or_else(|| {
                    AppError::bad_request("new owner must be an accepted board member")
                })?;

            let promoted = if target.role_id == admin.id {
                target.clone()
            } else {
                tx.update_membership(target.id, admin.id, target.status).await?
            };
            tx.set_board_owner(board_id, new_owner_id).await?;
            tx.commit().await?;
            Ok(promoted)
        })
        .await?;

        info!(
            board_id = %board_id,
            previous_owner = %caller_id,
            new_owner = %new_owner_id,
            "Board ownership transferred"
        );
        Ok(membership)
    }
}

async fn lock_container(
    tx: &mut dyn StoreTx,
    kind: ContainerKind,
    container_id: Uuid,
) -> Result<ContainerLock> {
    tx.lock_container(kind, container_id)
        .await?
        .ok_or_else(|| AppError::NotFound(kind.to_string()))
}

fn find_member(memberships: &[Membership], user_id: Uuid) -> Option<&Membership> {
    memberships.iter().find(|m| m.user_id == user_id)
}

/// 目标失去最高角色后，容器必须仍有所有者并且至少剩一名已接受的最高角色成员
fn ensure_top_role_survives(
    kind: ContainerKind,
    lock: &ContainerLock,
    memberships: &[Membership],
    target: &Membership,
) -> Result<()> {
    if lock.owner_id == Some(target.user_id) {
        return Err(AppError::Forbidden);
    }

    let Some(top_role) = kind.top_role() else {
        return Ok(());
    };

    if target.holds_role(top_role) {
        let remaining = memberships
            .iter()
            .filter(|m| m.id != target.id && m.holds_role(top_role))
            .count();
        if remaining == 0 {
            return Err(AppError::Forbidden);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn member(user_id: Uuid, role: &str, status: Option<MembershipStatus>) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            container_kind: ContainerKind::Board,
            container_id: Uuid::nil(),
            user_id,
            role_id: Uuid::new_v4(),
            role_name: role.to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_is_protected() {
        let owner = Uuid::new_v4();
        let members = vec![
            member(owner, roles::BOARD_ADMIN, Some(MembershipStatus::Accepted)),
            member(Uuid::new_v4(), roles::BOARD_ADMIN, Some(MembershipStatus::Accepted)),
        ];
        let lock = ContainerLock { owner_id: Some(owner) };
        let result = ensure_top_role_survives(ContainerKind::Board, &lock, &members, &members[0]);
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn test_pending_admins_do_not_count() {
        let members = vec![
            member(Uuid::new_v4(), roles::BOARD_ADMIN, Some(MembershipStatus::Accepted)),
            member(Uuid::new_v4(), roles::BOARD_ADMIN, Some(MembershipStatus::Pending)),
        ];
        let lock = ContainerLock { owner_id: Some(Uuid::new_v4()) };
        let result = ensure_top_role_survives(ContainerKind::Board, &lock, &members, &members[0]);
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn test_second_admin_can_be_removed() {
        let members = vec![
            member(Uuid::new_v4(), roles::BOARD_ADMIN, Some(MembershipStatus::Accepted)),
            member(Uuid::new_v4(), roles::BOARD_ADMIN, Some(MembershipStatus::Accepted)),
        ];
        let lock = ContainerLock { owner_id: Some(members[0].user_id) };
        assert!(ensure_top_role_survives(ContainerKind::Board, &lock, &members, &members[1]).is_ok());
    }

    #[test]
    fn test_card_members_have_no_top_role() {
        let members = vec![member(Uuid::new_v4(), roles::BOARD_ADMIN, None)];
        let lock = ContainerLock { owner_id: None };
        assert!(ensure_top_role_survives(ContainerKind::Card, &lock, &members, &members[0]).is_ok());
    }
}
