//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::{
    auth::guard::{authorize, authorize_global, GlobalGuard, Guard},
    handlers,
    middleware::AppState,
    models::role::perms::*,
    services::permission_service::TargetKind,
};

type SharedState = Arc<AppState>;

/// 单条受目标级守卫保护的路由
fn guarded(
    state: &SharedState,
    path: &str,
    kind: TargetKind,
    required: &'static [&'static str],
    method_router: MethodRouter<SharedState>,
) -> Router<SharedState> {
    let guard = Guard::new(state.permission_service.clone(), kind, required);
    Router::new()
        .route(path, method_router)
        .route_layer(from_fn_with_state(guard, authorize))
}

/// 单条受全局守卫保护的路由
fn guarded_global(
    state: &SharedState,
    path: &str,
    required: &'static [&'static str],
    method_router: MethodRouter<SharedState>,
) -> Router<SharedState> {
    let guard = GlobalGuard::new(state.permission_service.clone(), required);
    Router::new()
        .route(path, method_router)
        .route_layer(from_fn_with_state(guard, authorize_global))
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    use TargetKind::{Board, Card, List, Workspace};

    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 全局角色
    let global_routes = Router::new()
        .route("/api/v1/me/permissions", get(handlers::me::global_permissions))
        .merge(guarded_global(
            &state,
            "/api/v1/workspaces",
            &[WORKSPACE_CREATE],
            post(handlers::workspace::create_workspace),
        ))
        .merge(guarded_global(
            &state,
            "/api/v1/users/{id}/roles",
            &[USER_MANAGE],
            put(handlers::me::assign_global_role),
        ));

    // 工作区
    let workspace_routes = Router::new()
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}",
            Workspace,
            &[WORKSPACE_READ],
            get(handlers::workspace::get_workspace),
        ))
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}/boards",
            Workspace,
            &[BOARD_CREATE],
            post(handlers::workspace::create_board),
        ))
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}/members",
            Workspace,
            &[WORKSPACE_READ],
            get(handlers::member::list_workspace_members),
        ))
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}/members",
            Workspace,
            &[WORKSPACE_MANAGE_MEMBERS],
            post(handlers::member::add_workspace_member),
        ))
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}/members/{user_id}",
            Workspace,
            &[WORKSPACE_MANAGE_MEMBERS],
            put(handlers::member::change_workspace_member_role)
                .delete(handlers::member::remove_workspace_member),
        ))
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}/invitations",
            Workspace,
            &[WORKSPACE_INVITE],
            post(handlers::member::invite_to_workspace),
        ))
        .merge(guarded(
            &state,
            "/api/v1/workspaces/{id}/share-links",
            Workspace,
            &[WORKSPACE_INVITE],
            post(handlers::invitation::create_workspace_share_link),
        ))
        // 被邀请者自己应答，成员本人退出：只需要认证
        .route(
            "/api/v1/workspaces/{id}/invitation",
            post(handlers::member::respond_workspace_invitation),
        )
        .route("/api/v1/workspaces/{id}/leave", post(handlers::member::leave_workspace))
        .route(
            "/api/v1/workspaces/{id}/permissions",
            get(handlers::me::workspace_permissions),
        );

    // 看板与列表
    let board_routes = Router::new()
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}",
            Board,
            &[BOARD_READ],
            get(handlers::board::get_board),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/lists",
            Board,
            &[LIST_READ],
            get(handlers::board::list_lists),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/lists",
            Board,
            &[LIST_CREATE],
            post(handlers::board::create_list),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/lists/rebalance",
            Board,
            &[LIST_REORDER],
            post(handlers::board::rebalance_lists),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/members",
            Board,
            &[BOARD_READ],
            get(handlers::member::list_board_members),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/members",
            Board,
            &[BOARD_MANAGE_MEMBERS],
            post(handlers::member::add_board_member),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/members/{user_id}",
            Board,
            &[BOARD_MANAGE_MEMBERS],
            put(handlers::member::change_board_member_role)
                .delete(handlers::member::remove_board_member),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/invitations",
            Board,
            &[BOARD_INVITE],
            post(handlers::member::invite_to_board),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/share-links",
            Board,
            &[BOARD_INVITE],
            post(handlers::invitation::create_board_share_link),
        ))
        .merge(guarded(
            &state,
            "/api/v1/boards/{id}/transfer-ownership",
            Board,
            &[BOARD_MANAGE_MEMBERS],
            post(handlers::board::transfer_ownership),
        ))
        .route(
            "/api/v1/boards/{id}/invitation",
            post(handlers::member::respond_board_invitation),
        )
        .route("/api/v1/boards/{id}/leave", post(handlers::member::leave_board))
        .route(
            "/api/v1/boards/{id}/permissions",
            get(handlers::me::board_permissions),
        )
        .merge(guarded(
            &state,
            "/api/v1/lists/{id}/move",
            List,
            &[LIST_REORDER],
            post(handlers::board::move_list),
        ))
        .merge(guarded(
            &state,
            "/api/v1/lists/{id}/cards",
            List,
            &[CARD_READ],
            get(handlers::board::list_cards),
        ))
        .merge(guarded(
            &state,
            "/api/v1/lists/{id}/cards",
            List,
            &[CARD_CREATE],
            post(handlers::board::create_card),
        ));

    // 卡片
    let card_routes = Router::new()
        .merge(guarded(
            &state,
            "/api/v1/cards/{id}",
            Card,
            &[CARD_READ],
            get(handlers::card::get_card),
        ))
        .merge(guarded(
            &state,
            "/api/v1/cards/{id}/move",
            Card,
            &[CARD_MOVE],
            post(handlers::card::move_card),
        ))
        .merge(guarded(
            &state,
            "/api/v1/cards/{id}/members",
            Card,
            &[CARD_READ],
            get(handlers::member::list_card_members),
        ))
        .merge(guarded(
            &state,
            "/api/v1/cards/{id}/members",
            Card,
            &[CARD_ASSIGN],
            post(handlers::member::add_card_member),
        ))
        .merge(guarded(
            &state,
            "/api/v1/cards/{id}/members/{user_id}",
            Card,
            &[CARD_ASSIGN],
            delete(handlers::member::remove_card_member),
        ))
        .route(
            "/api/v1/cards/{id}/permissions",
            get(handlers::me::card_permissions),
        );

    // 分享链接：接受不经过守卫；撤销在处理器内按令牌指向的容器检查
    let share_link_routes = Router::new()
        .route(
            "/api/v1/share-links/accept",
            post(handlers::invitation::accept_share_link),
        )
        .route(
            "/api/v1/share-links/{token}",
            delete(handlers::invitation::revoke_share_link),
        );

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .merge(global_routes)
        .merge(workspace_routes)
        .merge(board_routes)
        .merge(card_routes)
        .merge(share_link_routes)
        .layer(from_fn_with_state(
            state.jwt_service.clone(),
            crate::auth::middleware::authenticate,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(state.config.server.body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(crate::middleware::track_requests))
        .with_state(state)
}
