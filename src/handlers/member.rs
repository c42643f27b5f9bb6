//! 成员管理的 HTTP 处理器
//! 工作区、看板、卡片共用同一套逻辑，按容器类型区分

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        membership::{ContainerKind, InviteRequest, RespondInvitationRequest},
        role::{AddMemberRequest, ChangeRoleRequest},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

// ==================== Shared ====================

async fn list(state: &AppState, kind: ContainerKind, id: Uuid) -> Result<impl IntoResponse, AppError> {
    let members = state.membership_service.list_members(kind, id).await?;
    Ok(Json(json!({
        "members": members,
        "count": members.len()
    })))
}

async fn add(
    state: &AppState,
    kind: ContainerKind,
    id: Uuid,
    req: AddMemberRequest,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let membership = state
        .membership_service
        .add_member(kind, id, req.user_id, &req.role)
        .await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

async fn change_role(
    state: &AppState,
    kind: ContainerKind,
    id: Uuid,
    user_id: Uuid,
    req: ChangeRoleRequest,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let membership = state
        .membership_service
        .change_role(kind, id, user_id, &req.role)
        .await?;

    Ok(Json(membership))
}

async fn remove(
    state: &AppState,
    kind: ContainerKind,
    id: Uuid,
    user_id: Uuid,
) -> Result<StatusCode, AppError> {
    state.membership_service.remove_member(kind, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn invite(
    state: &AppState,
    kind: ContainerKind,
    id: Uuid,
    req: InviteRequest,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let membership = state
        .membership_service
        .invite(kind, id, req.user_id, &req.role)
        .await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

async fn respond(
    state: &AppState,
    kind: ContainerKind,
    id: Uuid,
    user_id: Uuid,
    req: RespondInvitationRequest,
) -> Result<impl IntoResponse, AppError> {
    let membership = state
        .membership_service
        .respond_invitation(kind, id, user_id, req.accept)
        .await?;

    Ok(Json(membership))
}

async fn leave(
    state: &AppState,
    kind: ContainerKind,
    id: Uuid,
    user_id: Uuid,
) -> Result<StatusCode, AppError> {
    state.membership_service.leave(kind, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Workspace ====================

pub async fn list_workspace_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    list(&state, ContainerKind::Workspace, id).await
}

pub async fn add_workspace_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    add(&state, ContainerKind::Workspace, id, req).await
}

pub async fn change_workspace_member_role(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    change_role(&state, ContainerKind::Workspace, id, user_id, req).await
}

pub async fn remove_workspace_member(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    remove(&state, ContainerKind::Workspace, id, user_id).await
}

pub async fn invite_to_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    invite(&state, ContainerKind::Workspace, id, req).await
}

pub async fn respond_workspace_invitation(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    respond(&state, ContainerKind::Workspace, id, auth_context.user_id, req).await
}

pub async fn leave_workspace(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    leave(&state, ContainerKind::Workspace, id, auth_context.user_id).await
}

// ==================== Board ====================

pub async fn list_board_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    list(&state, ContainerKind::Board, id).await
}

pub async fn add_board_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    add(&state, ContainerKind::Board, id, req).await
}

pub async fn change_board_member_role(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    change_role(&state, ContainerKind::Board, id, user_id, req).await
}

pub async fn remove_board_member(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    remove(&state, ContainerKind::Board, id, user_id).await
}

pub async fn invite_to_board(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    invite(&state, ContainerKind::Board, id, req).await
}

pub async fn respond_board_invitation(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    respond(&state, ContainerKind::Board, id, auth_context.user_id, req).await
}

pub async fn leave_board(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    leave(&state, ContainerKind::Board, id, auth_context.user_id).await
}

// ==================== Card ====================

pub async fn list_card_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    list(&state, ContainerKind::Card, id).await
}

pub async fn add_card_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    add(&state, ContainerKind::Card, id, req).await
}

pub async fn remove_card_member(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    remove(&state, ContainerKind::Card, id, user_id).await
}
