//! 看板与列表的 HTTP 处理器（含列表排序）

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        board::{CreateCardRequest, CreateListRequest},
        position::{MoveRequest, OrderedKind, PositionResponse},
        role::TransferOwnershipRequest,
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

/// 获取看板详情
pub async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let board = state.board_service.get_board(id).await?;
    Ok(Json(board))
}

/// 按位置顺序列出看板下的列表
pub async fn list_lists(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lists = state.position_service.siblings(OrderedKind::List, id).await?;
    Ok(Json(json!({
        "lists": lists,
        "count": lists.len()
    })))
}

/// 在看板末尾创建列表
pub async fn create_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateListRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let list = state.board_service.create_list(id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// 重排看板下的全部列表
pub async fn rebalance_lists(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lists = state.position_service.rebalance(OrderedKind::List, id).await?;
    Ok(Json(json!({
        "lists": lists,
        "count": lists.len()
    })))
}

/// 移动列表
pub async fn move_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.list_id.is_some() {
        return Err(AppError::bad_request("lists cannot change parent"));
    }

    let position = state
        .position_service
        .move_list(id, req.before_id, req.after_id)
        .await?;

    Ok(Json(PositionResponse { id, position }))
}

/// 按位置顺序列出列表下的卡片
pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let cards = state.position_service.siblings(OrderedKind::Card, id).await?;
    Ok(Json(json!({
        "cards": cards,
        "count": cards.len()
    })))
}

/// 在列表末尾创建卡片
pub async fn create_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let card = state.board_service.create_card(id, &req.title).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// 转移看板所有权（调用者必须是当前所有者）
pub async fn transfer_ownership(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<TransferOwnershipRequest>,
) -> Result<impl IntoResponse, AppError> {
    let membership = state
        .membership_service
        .transfer_ownership(id, auth_context.user_id, req.user_id)
        .await?;

    Ok(Json(json!({
        "board_id": id,
        "owner_id": req.user_id,
        "membership": membership
    })))
}
