//! 卡片的 HTTP 处理器

use crate::{
    error::AppError,
    middleware::AppState,
    models::position::{MoveRequest, PositionResponse},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// 获取卡片详情
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let card = state.board_service.get_card(id).await?;
    Ok(Json(card))
}

/// 移动卡片（可跨列表，仅限同一看板）
pub async fn move_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let position = state
        .position_service
        .move_card(id, req.list_id, req.before_id, req.after_id)
        .await?;

    Ok(Json(PositionResponse { id, position }))
}
