//! 服务配置
//!
//! 全部来自 `BOARD_` 前缀的环境变量，层级用 `__` 分隔，例如
//! `BOARD_ORDERING__GAP=1024`。数据库地址和 JWT 密钥用 [`Secret`] 包装。

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

const ENV_PREFIX: &str = "BOARD";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 例如 "0.0.0.0:3000"
    pub addr: String,
    pub graceful_shutdown_timeout_secs: u64,
    /// 请求体上限（字节）
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// 行锁等待上限（毫秒），超时按可重试错误处理
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// trace / debug / info / warn / error
    pub level: String,
    /// json / pretty
    pub format: String,
}

/// 访问令牌由外部登录服务签发，这里只需要共享密钥
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: Secret<String>,
    pub access_token_exp_secs: u64,
}

/// 排序位置配置
#[derive(Debug, Clone, Deserialize)]
pub struct OrderingConfig {
    /// 相邻位置间隔，也是空集合的起始位置
    pub gap: f64,
    /// 事务冲突（死锁、序列化失败、锁超时）时的最大重试次数
    pub max_retries: u32,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            gap: 16384.0,
            max_retries: 3,
        }
    }
}

/// 分享链接配置
#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    /// 链接默认有效期（秒）
    pub token_ttl_secs: u64,
    /// 令牌随机字节数，十六进制编码后长度翻倍
    pub token_bytes: usize,
    /// 后台清扫过期令牌的间隔（秒）
    pub purge_interval_secs: u64,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 7 * 24 * 3600,
            token_bytes: 24,
            purge_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub ordering: OrderingConfig,
    pub invitations: InvitationConfig,
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        // 端口 0 交给系统分配
        let port = self
            .addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok());
        match port {
            Some(p) if p != 0 && p < 1024 => Err(invalid("server.addr port should be >= 1024")),
            _ if self.body_limit_bytes == 0 => Err(invalid("server.body_limit_bytes must be > 0")),
            _ => Ok(()),
        }
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections < self.min_connections {
            return Err(invalid(
                "database.max_connections must be >= database.min_connections",
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(invalid("database.lock_timeout_ms must be > 0"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        const FORMATS: [&str; 2] = ["json", "pretty"];

        let level = self.level.to_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(invalid(format!(
                "Invalid log level: {} (expected one of {})",
                self.level,
                LEVELS.join(", ")
            )));
        }
        let format = self.format.to_lowercase();
        if !FORMATS.contains(&format.as_str()) {
            return Err(invalid(format!(
                "Invalid log format: {} (expected one of {})",
                self.format,
                FORMATS.join(", ")
            )));
        }
        Ok(())
    }
}

impl OrderingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        // 间隔必须大于 2
        if !self.gap.is_finite() || self.gap <= 2.0 {
            return Err(invalid("ordering.gap must be a finite number greater than 2"));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.body_limit_bytes", 1024 * 1024)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("database.lock_timeout_ms", 2000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.access_token_exp_secs", 900)?
            .set_default("ordering.gap", 16384.0)?
            .set_default("ordering.max_retries", 3)?
            .set_default("invitations.token_ttl_secs", 604800)?
            .set_default("invitations.token_bytes", 24)?
            .set_default("invitations.purge_interval_secs", 300)?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.ordering.validate()?;

        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(invalid("security.jwt_secret must be at least 32 characters"));
        }
        if self.invitations.token_bytes < 16 {
            return Err(invalid("invitations.token_bytes must be >= 16"));
        }
        if self.invitations.purge_interval_secs == 0 {
            return Err(invalid("invitations.purge_interval_secs must be > 0"));
        }
        Ok(())
    }
}
