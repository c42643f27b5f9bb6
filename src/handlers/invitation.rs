//! 分享链接的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        membership::{AcceptShareLinkRequest, ContainerKind, CreateShareLinkRequest},
        role::{perms, MatchMode},
    },
    services::permission_service::TargetKind,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

async fn create(
    state: &AppState,
    auth_context: &AuthContext,
    kind: ContainerKind,
    id: Uuid,
    req: CreateShareLinkRequest,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let link = state
        .invitation_service
        .create_share_link(kind, id, &req.role, req.single_use, req.ttl_secs, auth_context.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// 创建工作区分享链接
pub async fn create_workspace_share_link(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateShareLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, &auth_context, ContainerKind::Workspace, id, req).await
}

/// 创建看板分享链接
pub async fn create_board_share_link(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateShareLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, &auth_context, ContainerKind::Board, id, req).await
}

/// 接受分享链接，不经过授权守卫
pub async fn accept_share_link(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<AcceptShareLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    let membership = state
        .invitation_service
        .accept_share_link(&req.token, auth_context.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

/// 撤销分享链接（需要在目标容器上有邀请权限）
pub async fn revoke_share_link(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    let grant = state.invitation_service.inspect(&token).await?;

    let (kind, required) = match grant.container_kind {
        ContainerKind::Workspace => (TargetKind::Workspace, perms::WORKSPACE_INVITE),
        ContainerKind::Board => (TargetKind::Board, perms::BOARD_INVITE),
        ContainerKind::Card => return Err(AppError::not_found("share link")),
    };
    state
        .permission_service
        .require(
            auth_context.user_id,
            kind.target(grant.container_id),
            &[required],
            MatchMode::All,
        )
        .await?;

    state.invitation_service.revoke(&token).await;
    Ok(StatusCode::NO_CONTENT)
}
