//! 分享令牌缓存
//!
//! 令牌只存在于缓存中，过期即失效。进程内实现基于 DashMap：读取和写入时
//! 顺带清理过期项，另有后台任务按固定间隔清扫没人再读的令牌。

use crate::models::membership::ContainerKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// 分享链接授予的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub container_kind: ContainerKind,
    pub container_id: Uuid,
    pub role: String,
    pub single_use: bool,
    pub created_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl ShareGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn put(&self, token: &str, grant: ShareGrant);

    /// 读取未过期的授予
    async fn get(&self, token: &str) -> Option<ShareGrant>;

    /// 原子地取出（并删除）未过期的授予
    async fn take(&self, token: &str) -> Option<ShareGrant>;

    async fn delete(&self, token: &str);

    /// 删除全部过期令牌，返回删除数量
    async fn purge_expired(&self) -> usize;
}

/// 后台定期清扫过期令牌；返回的句柄 abort 即停止
pub fn spawn_purge_task(cache: Arc<dyn TokenCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Expired share tokens purged");
            }
        }
    })
}

/// In-process token cache
#[derive(Clone, Default)]
pub struct MemoryTokenCache {
    entries: Arc<DashMap<String, ShareGrant>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, grant| !grant.is_expired(now));
        before - self.entries.len()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn put(&self, token: &str, grant: ShareGrant) {
        self.purge();
        self.entries.insert(token.to_string(), grant);
    }

    async fn get(&self, token: &str) -> Option<ShareGrant> {
        let now = Utc::now();
        let grant = self.entries.get(token).map(|entry| entry.value().clone())?;
        if grant.is_expired(now) {
            self.entries.remove(token);
            return None;
        }
        Some(grant)
    }

    async fn take(&self, token: &str) -> Option<ShareGrant> {
        let (_, grant) = self.entries.remove(token)?;
        if grant.is_expired(Utc::now()) {
            return None;
        }
        Some(grant)
    }

    async fn delete(&self, token: &str) {
        self.entries.remove(token);
    }

    async fn purge_expired(&self) -> usize {
        self.purge()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(expires_in: Duration) -> ShareGrant {
        ShareGrant {
            container_kind: ContainerKind::Board,
            container_id: Uuid::new_v4(),
            role: "board_member".to_string(),
            single_use: true,
            created_by: Uuid::new_v4(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_expired_tokens_are_invisible() {
        let cache = MemoryTokenCache::new();
        cache.put("old", grant(Duration::seconds(-1))).await;

        assert!(cache.get("old").await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_take_removes_token() {
        let cache = MemoryTokenCache::new();
        let g = grant(Duration::hours(1));
        cache.put("t", g.clone()).await;

        assert_eq!(cache.take("t").await, Some(g));
        assert!(cache.take("t").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryTokenCache::new();
        cache.put("live", grant(Duration::hours(1))).await;
        cache.put("dead", grant(Duration::seconds(-5))).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_put_sweeps_abandoned_tokens() {
        let cache = MemoryTokenCache::new();
        for i in 0..5 {
            cache.put(&format!("abandoned-{}", i), grant(Duration::seconds(-1))).await;
        }
        cache.put("fresh", grant(Duration::hours(1))).await;

        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_purge_task_clears_unread_tokens() {
        let cache = MemoryTokenCache::new();
        cache.put("soon", grant(Duration::milliseconds(20))).await;
        cache.put("live", grant(Duration::hours(1))).await;

        let handle = spawn_purge_task(Arc::new(cache.clone()), std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        handle.abort();

        assert_eq!(cache.len(), 1);
    }
}
