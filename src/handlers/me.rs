//! 当前用户权限自省与全局角色管理

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::role::{ChangeRoleRequest, ResolvedPermissions},
    services::permission_service::TargetKind,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 当前用户的全局角色与权限
pub async fn global_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<Json<ResolvedPermissions>, AppError> {
    let resolved = state
        .permission_service
        .global_permissions(auth_context.user_id)
        .await?;
    Ok(Json(resolved))
}

async fn target_permissions(
    state: &AppState,
    auth_context: &AuthContext,
    kind: TargetKind,
    id: Uuid,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state
        .permission_service
        .permissions_for(auth_context.user_id, kind.target(id))
        .await?;

    Ok(Json(json!({
        "target": kind,
        "id": id,
        "permissions": permissions,
    })))
}

/// 当前用户在工作区上的有效权限
pub async fn workspace_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    target_permissions(&state, &auth_context, TargetKind::Workspace, id).await
}

/// 当前用户在看板上的有效权限
pub async fn board_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    target_permissions(&state, &auth_context, TargetKind::Board, id).await
}

/// 当前用户在卡片上的有效权限
pub async fn card_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    target_permissions(&state, &auth_context, TargetKind::Card, id).await
}

/// 分配全局角色（全局守卫要求 `user:manage`）
pub async fn assign_global_role(
    State(state): State<Arc<AppState>>,
    resolved: ResolvedPermissions,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    state
        .permission_service
        .assign_global_role(id, &req.role)
        .await?;

    tracing::info!(
        assigned_by = %resolved.user_id,
        user_id = %id,
        role = %req.role,
        "Global role assignment completed"
    );

    Ok(Json(json!({
        "user_id": id,
        "role": req.role,
    })))
}
