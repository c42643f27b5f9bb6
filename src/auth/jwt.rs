//! 访问令牌校验
//!
//! 令牌由外部登录服务用共享密钥签发（HS256），看板服务只还原调用者身份，
//! 不保存任何会话状态。

use crate::{config::SecurityConfig, error::AppError};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 唯一接受的令牌类型
const ACCESS: &str = "access";

/// HS256 密钥最小长度
const MIN_SECRET_LEN: usize = 32;

/// Access token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    pub username: String,
    /// 刷新令牌等其他类型一律拒绝
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl JwtService {
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        let secret = config.jwt_secret.expose_secret();
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "JWT secret too short (min {} chars)",
                MIN_SECRET_LEN
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: config.access_token_exp_secs as i64,
        })
    }

    /// 签发访问令牌（与登录服务使用同一套 claims 布局，本地运行和测试用）
    pub fn generate_access_token(&self, user_id: &Uuid, username: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        self.encode(&Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            token_type: ACCESS.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        })
    }

    fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to encode access token: {}", e)))
    }

    /// 校验签名、过期时间和令牌类型
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AppError::Unauthorized
            })?
            .claims;

        if claims.token_type != ACCESS {
            tracing::debug!(token_type = %claims.token_type, "Non-access token rejected");
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}
