//! Bearer 令牌认证
//!
//! 令牌有效时把 [`AuthContext`] 放进请求扩展，守卫和处理器都从扩展里读取调用者。

use crate::{
    auth::jwt::{Claims, JwtService},
    error::AppError,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 已认证的调用者
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
}

impl AuthContext {
    fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
        Ok(Self {
            user_id,
            username: claims.username,
        })
    }

    /// 读取认证中间件放入的调用者；路由没有经过认证层时返回 401
    pub fn of(req: &Request) -> Result<Self, AppError> {
        req.extensions()
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// `Authorization: Bearer <token>` 中的令牌部分
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 认证层：所有 `/api/v1` 路由都必须携带有效的访问令牌
pub async fn authenticate(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let claims = jwt_service.validate_access_token(token)?;
    let caller = AuthContext::from_claims(claims)?;

    tracing::debug!(user_id = %caller.user_id, path = %req.uri().path(), "Request authenticated");
    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes_and_blank_tokens() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer    ")), None);
    }

    #[test]
    fn test_claims_with_invalid_subject_are_unauthorized() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            username: "someone".to_string(),
            token_type: "access".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(matches!(
            AuthContext::from_claims(claims),
            Err(AppError::Unauthorized)
        ));
    }
}
