//! 错误模型
//!
//! 服务、存储和处理器统一返回 [`AppError`]；转换成 HTTP 响应时只暴露
//! 面向调用方的消息，内部细节写进日志。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed")]
    Unauthorized,

    /// 是成员但权限不足
    #[error("Access denied")]
    Forbidden,

    /// 目标不存在，或调用者不是它的成员
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// 写冲突、死锁或锁等待超时，整个事务可以安全重试
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// 响应体里的消息；5xx 不带任何内部细节
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(what) => format!("Resource not found: {}", what),
            AppError::BadRequest(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::Unauthorized | AppError::Forbidden => self.to_string(),
            AppError::Transient(_) => "Temporarily unavailable, please retry".to_string(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    /// 非成员与目标不存在返回同一种错误，不泄露看板是否存在
    pub fn not_a_member() -> Self {
        AppError::not_found("not a member")
    }

    pub fn bad_request(msg: &str) -> Self {
        AppError::BadRequest(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        AppError::Conflict(msg.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = ErrorDetail {
            code: status.as_u16(),
            message: self.user_message(),
            request_id: uuid::Uuid::new_v4().to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code = detail.code, request_id = %detail.request_id, error = %self, "Request failed");
        } else {
            tracing::warn!(code = detail.code, request_id = %detail.request_id, error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// SQLSTATE 分类：并发冲突可重试，唯一约束冲突映射为 409
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        let code = match &e {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };
        match code.as_deref() {
            // serialization_failure / deadlock_detected / lock_not_available
            Some("40001" | "40P01" | "55P03") => AppError::Transient(e.to_string()),
            Some("23505") => AppError::conflict("already exists"),
            _ => AppError::Database(e),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized.code(), 401);
        assert_eq!(AppError::Forbidden.code(), 403);
        assert_eq!(AppError::not_found("board").code(), 404);
        assert_eq!(AppError::bad_request("inverted neighbours").code(), 400);
        assert_eq!(AppError::conflict("already a member").code(), 409);
        assert_eq!(AppError::Transient("lock timeout".to_string()).code(), 503);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let message = AppError::Database(sqlx::Error::RowNotFound).user_message();
        assert_eq!(message, "Database error occurred");

        let message = AppError::Internal("rebalance exhausted twice".to_string()).user_message();
        assert!(!message.contains("rebalance"));
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(AppError::Transient("deadlock".to_string()).is_retryable());
        assert!(!AppError::Forbidden.is_retryable());
        assert!(!AppError::not_a_member().is_retryable());
    }

    #[test]
    fn test_not_a_member_is_not_found() {
        let err = AppError::not_a_member();
        assert_eq!(err.code(), 404);
        assert_eq!(err.user_message(), "Resource not found: not a member");
    }
}
