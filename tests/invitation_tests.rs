//! 分享链接集成测试

use board_service::{
    cache::MemoryTokenCache,
    error::AppError,
    middleware::AppState,
    models::{
        board::PermissionLevel,
        membership::{ContainerKind, MembershipStatus},
        role::{perms, roles, MatchMode},
    },
    repository::MemoryStore,
    services::permission_service::Target,
};
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{create_cards, create_test_config, setup, setup_board};

#[tokio::test]
async fn test_single_use_link_is_consumed() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let link = state
        .invitation_service
        .create_share_link(
            ContainerKind::Board,
            tb.board.id,
            roles::BOARD_MEMBER,
            true,
            None,
            tb.owner,
        )
        .await
        .unwrap();
    assert!(link.token.starts_with("shr_"));

    let joiner = Uuid::new_v4();
    let membership = state
        .invitation_service
        .accept_share_link(&link.token, joiner)
        .await
        .unwrap();
    assert_eq!(membership.status, Some(MembershipStatus::Accepted));
    assert_eq!(membership.role_name, roles::BOARD_MEMBER);

    state
        .permission_service
        .require(joiner, Target::List(tb.list.id), &[perms::LIST_CREATE], MatchMode::All)
        .await
        .unwrap();

    let err = state
        .invitation_service
        .accept_share_link(&link.token, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reusable_link_admits_many_users() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let link = state
        .invitation_service
        .create_share_link(
            ContainerKind::Workspace,
            tb.workspace.id,
            roles::WORKSPACE_MEMBER,
            false,
            Some(3600),
            tb.owner,
        )
        .await
        .unwrap();

    for _ in 0..3 {
        let membership = state
            .invitation_service
            .accept_share_link(&link.token, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(membership.role_name, roles::WORKSPACE_MEMBER);
    }

    let members = state
        .membership_service
        .list_members(ContainerKind::Workspace, tb.workspace.id)
        .await
        .unwrap();
    assert_eq!(members.len(), 4);
}

#[tokio::test]
async fn test_failed_accept_keeps_single_use_link() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let link = state
        .invitation_service
        .create_share_link(
            ContainerKind::Board,
            tb.board.id,
            roles::BOARD_VIEWER,
            true,
            None,
            tb.owner,
        )
        .await
        .unwrap();

    // 所有者已经是成员：Conflict，令牌不会被消耗
    let err = state
        .invitation_service
        .accept_share_link(&link.token, tb.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    state
        .invitation_service
        .accept_share_link(&link.token, Uuid::new_v4())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_malformed_and_expired_links_are_not_found() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let err = state
        .invitation_service
        .accept_share_link("not-a-token", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state
        .invitation_service
        .accept_share_link(&format!("shr_{}", "0".repeat(64)), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let expired = state
        .invitation_service
        .create_share_link(
            ContainerKind::Board,
            tb.board.id,
            roles::BOARD_VIEWER,
            false,
            Some(0),
            tb.owner,
        )
        .await
        .unwrap();
    let err = state
        .invitation_service
        .accept_share_link(&expired.token, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_revoked_link_is_not_found() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let link = state
        .invitation_service
        .create_share_link(
            ContainerKind::Board,
            tb.board.id,
            roles::BOARD_MEMBER,
            false,
            None,
            tb.owner,
        )
        .await
        .unwrap();

    let grant = state.invitation_service.inspect(&link.token).await.unwrap();
    assert_eq!(grant.container_id, tb.board.id);
    assert_eq!(grant.created_by, tb.owner);

    state.invitation_service.revoke(&link.token).await;

    let err = state
        .invitation_service
        .inspect(&link.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_share_links_reject_cards_and_wrong_roles() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let cards = create_cards(&state, tb.list.id, 1).await;

    let err = state
        .invitation_service
        .create_share_link(
            ContainerKind::Card,
            cards[0].id,
            roles::BOARD_MEMBER,
            true,
            None,
            tb.owner,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = state
        .invitation_service
        .create_share_link(
            ContainerKind::Board,
            tb.board.id,
            roles::WORKSPACE_ADMIN,
            true,
            None,
            tb.owner,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_links_live_in_the_injected_cache() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryTokenCache::new());
    let state = AppState::with_token_cache(create_test_config(), store, cache.clone()).unwrap();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let link = state
        .invitation_service
        .create_share_link(
            ContainerKind::Board,
            tb.board.id,
            roles::BOARD_MEMBER,
            true,
            None,
            tb.owner,
        )
        .await
        .unwrap();
    assert_eq!(cache.len(), 1);

    state
        .invitation_service
        .accept_share_link(&link.token, Uuid::new_v4())
        .await
        .unwrap();
    assert!(cache.is_empty());
}
