//! 授权守卫
//!
//! 路由层中间件：从路径参数 `id` 取目标，按目标类型解析权限。
//! 未认证 → 401，目标不存在或不是成员 → 404，权限不足 → 403。

use super::middleware::AuthContext;
use crate::{
    error::AppError,
    models::role::{MatchMode, ResolvedPermissions},
    services::permission_service::{PermissionService, TargetKind},
};
use axum::{
    extract::{FromRequestParts, Path, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 目标级守卫
#[derive(Clone)]
pub struct Guard {
    permissions: Arc<PermissionService>,
    kind: TargetKind,
    required: &'static [&'static str],
    mode: MatchMode,
}

impl Guard {
    /// 使用该目标类型的默认匹配策略
    pub fn new(
        permissions: Arc<PermissionService>,
        kind: TargetKind,
        required: &'static [&'static str],
    ) -> Self {
        Self {
            permissions,
            kind,
            required,
            mode: kind.default_mode(),
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }
}

/// 目标级授权中间件（配合 `route_layer` 使用，需要路径参数 `id`）
pub async fn authorize(
    State(guard): State<Guard>,
    Path(params): Path<HashMap<String, String>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = AuthContext::of(&req)?;

    let id = params
        .get("id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::not_found("target"))?;

    guard
        .permissions
        .require(auth.user_id, guard.kind.target(id), guard.required, guard.mode)
        .await?;

    Ok(next.run(req).await)
}

/// 全局守卫：检查全局角色权限，并把解析结果挂到请求扩展上
#[derive(Clone)]
pub struct GlobalGuard {
    permissions: Arc<PermissionService>,
    required: &'static [&'static str],
    mode: MatchMode,
}

impl GlobalGuard {
    pub fn new(permissions: Arc<PermissionService>, required: &'static [&'static str]) -> Self {
        Self {
            permissions,
            required,
            mode: MatchMode::All,
        }
    }
}

pub async fn authorize_global(
    State(guard): State<GlobalGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = AuthContext::of(&req)?;

    let resolved = guard
        .permissions
        .require_global(auth.user_id, guard.required, guard.mode)
        .await?;
    req.extensions_mut().insert(resolved);

    Ok(next.run(req).await)
}

// handler 中直接提取全局守卫解析出的权限
impl<S> FromRequestParts<S> for ResolvedPermissions
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedPermissions>()
            .cloned()
            .ok_or_else(|| AppError::Internal("global guard did not run".to_string()))
    }
}
