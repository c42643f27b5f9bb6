//! PostgreSQL 连接池与迁移
//!
//! 每条连接都带上 `lock_timeout`：排序和成员变更会 `FOR UPDATE` 锁住兄弟集合，
//! 等锁超时返回 55P03，由服务层按可重试错误处理。

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::{str::FromStr, time::Duration};

const APPLICATION_NAME: &str = "board-service";

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, DbError> {
    let lock_timeout = format!("{}ms", config.lock_timeout_ms);
    let options = PgConnectOptions::from_str(config.url.expose_secret())
        .map_err(|e| DbError::InvalidUrl(e.to_string()))?
        .application_name(APPLICATION_NAME)
        .options([("lock_timeout", lock_timeout.as_str())]);
    Ok(options)
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let options = connect_options(config)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Board store unreachable");
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        lock_timeout_ms = config.lock_timeout_ms,
        "Board store pool ready"
    );
    Ok(pool)
}

/// 建表并写入权限目录和内置角色
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationFailed(e.to_string()))?;

    tracing::info!("Board schema up to date");
    Ok(())
}

/// 就绪探针使用
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Board store ping failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Invalid database url: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}
