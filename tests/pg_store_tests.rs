//! PostgreSQL 存储集成测试（需要数据库，默认忽略）
//!
//! 运行方式：`TEST_DATABASE_URL=... cargo test --test pg_store_tests -- --ignored`

use board_service::{
    error::AppError,
    middleware::AppState,
    models::{
        board::PermissionLevel,
        membership::ContainerKind,
        position::OrderedKind,
        role::{perms, roles, MatchMode},
    },
    repository::{AccessRepository, HierarchyRepository, PgStore},
    services::permission_service::Target,
};
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{create_cards, create_test_config, setup_board, setup_test_db};

async fn pg_state() -> (Arc<PgStore>, Arc<AppState>) {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let store = Arc::new(PgStore::new(pool));
    let state = Arc::new(AppState::new(config, store.clone()).expect("Failed to create app state"));
    (store, state)
}

#[tokio::test]
#[ignore] // 需要数据库
#[serial]
async fn test_bootstrap_is_idempotent() {
    let (store, _state) = pg_state().await;
    store.bootstrap_rbac().await.unwrap();

    let admin = store.find_role_by_name(roles::BOARD_ADMIN).await.unwrap().unwrap();
    let permissions = store.role_permissions(admin.id).await.unwrap();
    assert!(permissions.iter().any(|p| p == perms::BOARD_MANAGE_MEMBERS));
}

#[tokio::test]
#[ignore] // 需要数据库
#[serial]
async fn test_move_and_rebalance_on_postgres() {
    let (store, state) = pg_state().await;
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let cards = create_cards(&state, tb.list.id, 3).await;

    let position = state
        .position_service
        .move_card(cards[2].id, None, Some(cards[0].id), Some(cards[1].id))
        .await
        .unwrap();
    assert_eq!(position, 24576.0);

    let rebalanced = state
        .position_service
        .rebalance(OrderedKind::Card, tb.list.id)
        .await
        .unwrap();
    let order: Vec<Uuid> = rebalanced.iter().map(|s| s.id).collect();
    assert_eq!(order, vec![cards[0].id, cards[2].id, cards[1].id]);

    let siblings = store
        .list_siblings(OrderedKind::Card, tb.list.id)
        .await
        .unwrap();
    let positions: Vec<f64> = siblings.iter().map(|s| s.position).collect();
    assert_eq!(positions, vec![16384.0, 32768.0, 49152.0]);
}

#[tokio::test]
#[ignore] // 需要数据库
#[serial]
async fn test_membership_rules_on_postgres() {
    let (_store, state) = pg_state().await;
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let viewer = Uuid::new_v4();

    state
        .membership_service
        .add_member(ContainerKind::Board, tb.board.id, viewer, roles::BOARD_VIEWER)
        .await
        .unwrap();

    let err = state
        .membership_service
        .add_member(ContainerKind::Board, tb.board.id, viewer, roles::BOARD_MEMBER)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = state
        .permission_service
        .require(viewer, Target::List(tb.list.id), &[perms::LIST_CREATE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = state
        .membership_service
        .remove_member(ContainerKind::Board, tb.board.id, tb.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}
