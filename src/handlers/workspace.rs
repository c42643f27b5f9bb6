//! 工作区与看板创建的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::board::{CreateBoardRequest, CreateWorkspaceRequest},
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

/// 创建工作区（全局守卫要求 `workspace:create`）
pub async fn create_workspace(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let workspace = state
        .board_service
        .create_workspace(auth_context.user_id, &req.name)
        .await?;

    Ok((StatusCode::CREATED, Json(workspace)))
}

/// 获取工作区详情
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let workspace = state.board_service.get_workspace(id).await?;
    Ok(Json(workspace))
}

/// 在工作区下创建看板，创建者成为所有者
pub async fn create_board(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let board = state
        .board_service
        .create_board(id, auth_context.user_id, &req.name, req.permission_level)
        .await?;

    Ok((StatusCode::CREATED, Json(board)))
}
