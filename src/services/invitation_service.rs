//! 分享链接邀请
//!
//! 令牌只保存在缓存里；接受链接时直接创建已接受的成员关系，不经过授权守卫。

use super::MembershipService;
use crate::{
    auth::share_token::ShareTokenGenerator,
    cache::{ShareGrant, TokenCache},
    config::InvitationConfig,
    error::{AppError, Result},
    models::membership::{ContainerKind, Membership, ShareLinkResponse},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct InvitationService {
    cache: Arc<dyn TokenCache>,
    memberships: Arc<MembershipService>,
    config: InvitationConfig,
}

impl InvitationService {
    pub fn new(
        cache: Arc<dyn TokenCache>,
        memberships: Arc<MembershipService>,
        config: InvitationConfig,
    ) -> Self {
        Self {
            cache,
            memberships,
            config,
        }
    }

    /// 为容器创建分享链接
    #[instrument(skip(self))]
    pub async fn create_share_link(
        &self,
        kind: ContainerKind,
        container_id: Uuid,
        role_name: &str,
        single_use: bool,
        ttl_secs: Option<u64>,
        created_by: Uuid,
    ) -> Result<ShareLinkResponse> {
        if !kind.supports_invitations() {
            return Err(AppError::bad_request("cards do not support share links"));
        }
        let role = self.memberships.role_for(kind, role_name).await?;

        let ttl = ttl_secs.unwrap_or(self.config.token_ttl_secs);
        let expires_at = Utc::now() + Duration::seconds(ttl as i64);
        let token = ShareTokenGenerator::generate(self.config.token_bytes);

        let grant = ShareGrant {
            container_kind: kind,
            container_id,
            role: role.name.clone(),
            single_use,
            created_by,
            expires_at,
        };
        self.cache.put(&token, grant).await;

        info!(
            kind = %kind,
            container_id = %container_id,
            role = %role.name,
            single_use,
            expires_at = %expires_at,
            "Share link created"
        );

        Ok(ShareLinkResponse {
            token,
            container_kind: kind,
            container_id,
            role: role.name,
            single_use,
            expires_at,
        })
    }

    /// 查看令牌内容（未知或过期返回 NotFound）
    pub async fn inspect(&self, token: &str) -> Result<ShareGrant> {
        if !ShareTokenGenerator::looks_valid(token) {
            return Err(AppError::not_found("share link"));
        }
        self.cache
            .get(token)
            .await
            .ok_or_else(|| AppError::not_found("share link"))
    }

    /// 接受分享链接。一次性令牌在成功后即失效；创建成员关系失败时令牌保留。
    #[instrument(skip(self, token))]
    pub async fn accept_share_link(&self, token: &str, user_id: Uuid) -> Result<Membership> {
        let grant = self.inspect(token).await?;

        if !grant.single_use {
            return self.join(&grant, user_id).await;
        }

        // 先取出令牌，避免并发请求重复使用
        let grant = self
            .cache
            .take(token)
            .await
            .ok_or_else(|| AppError::not_found("share link"))?;

        match self.join(&grant, user_id).await {
            Ok(membership) => Ok(membership),
            Err(e) => {
                self.cache.put(token, grant).await;
                Err(e)
            }
        }
    }

    async fn join(&self, grant: &ShareGrant, user_id: Uuid) -> Result<Membership> {
        let membership = self
            .memberships
            .add_member(grant.container_kind, grant.container_id, user_id, &grant.role)
            .await?;

        info!(
            kind = %grant.container_kind,
            container_id = %grant.container_id,
            user_id = %user_id,
            created_by = %grant.created_by,
            "Share link accepted"
        );
        Ok(membership)
    }

    /// 撤销分享链接
    pub async fn revoke(&self, token: &str) {
        self.cache.delete(token).await;
    }
}
