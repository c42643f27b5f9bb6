//! 权限解析与检查集成测试

use board_service::{
    error::AppError,
    models::{
        board::PermissionLevel,
        membership::ContainerKind,
        role::{perms, roles, MatchMode},
    },
    services::permission_service::Target,
};
use uuid::Uuid;

mod common;
use common::{add_board_member, create_cards, setup, setup_board};

#[tokio::test]
async fn test_owner_holds_board_admin_permissions() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    state
        .permission_service
        .require(
            tb.owner,
            Target::Board(tb.board.id),
            &[perms::BOARD_UPDATE, perms::BOARD_MANAGE_MEMBERS],
            MatchMode::All,
        )
        .await
        .unwrap();

    state
        .permission_service
        .require(
            tb.owner,
            Target::Workspace(tb.workspace.id),
            &[perms::WORKSPACE_MANAGE_MEMBERS],
            MatchMode::All,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_viewer_cannot_write() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let viewer = add_board_member(&state, tb.board.id, roles::BOARD_VIEWER).await;

    state
        .permission_service
        .require(viewer, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap();

    let err = state
        .permission_service
        .require(viewer, Target::Board(tb.board.id), &[perms::BOARD_UPDATE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = state
        .permission_service
        .require(viewer, Target::List(tb.list.id), &[perms::LIST_CREATE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_non_member_of_private_board_is_not_found() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let outsider = Uuid::new_v4();

    let err = state
        .permission_service
        .require(outsider, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state
        .permission_service
        .permissions_for(outsider, Target::Board(tb.board.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_missing_target_is_not_found() {
    let (_store, state) = setup();

    let err = state
        .permission_service
        .require(
            Uuid::new_v4(),
            Target::Card(Uuid::new_v4()),
            &[perms::CARD_READ],
            MatchMode::Any,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_public_board_is_readable_but_not_writable_by_outsiders() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Public).await;
    let cards = create_cards(&state, tb.list.id, 1).await;
    let outsider = Uuid::new_v4();

    state
        .permission_service
        .require(outsider, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap();
    state
        .permission_service
        .require(outsider, Target::Card(cards[0].id), &[perms::CARD_READ], MatchMode::Any)
        .await
        .unwrap();

    // 写操作不走旁路：非成员仍然是 NotFound
    let err = state
        .permission_service
        .require(outsider, Target::Card(cards[0].id), &[perms::CARD_UPDATE], MatchMode::Any)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let granted = state
        .permission_service
        .permissions_for(outsider, Target::Board(tb.board.id))
        .await
        .unwrap();
    let granted: Vec<&str> = granted.iter().collect();
    assert_eq!(granted, vec![perms::BOARD_READ, perms::CARD_READ, perms::LIST_READ]);
}

#[tokio::test]
async fn test_public_board_viewer_still_cannot_write() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Public).await;
    let viewer = add_board_member(&state, tb.board.id, roles::BOARD_VIEWER).await;

    let err = state
        .permission_service
        .require(viewer, Target::List(tb.list.id), &[perms::LIST_CREATE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_workspace_level_board_readable_by_workspace_members_only() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Workspace).await;

    let colleague = Uuid::new_v4();
    state
        .membership_service
        .add_member(
            ContainerKind::Workspace,
            tb.workspace.id,
            colleague,
            roles::WORKSPACE_MEMBER,
        )
        .await
        .unwrap();

    state
        .permission_service
        .require(colleague, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap();

    let err = state
        .permission_service
        .require(colleague, Target::List(tb.list.id), &[perms::LIST_CREATE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state
        .permission_service
        .require(
            Uuid::new_v4(),
            Target::Board(tb.board.id),
            &[perms::BOARD_READ],
            MatchMode::All,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_pending_workspace_member_gets_no_bypass() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Workspace).await;

    let invitee = Uuid::new_v4();
    state
        .membership_service
        .invite(
            ContainerKind::Workspace,
            tb.workspace.id,
            invitee,
            roles::WORKSPACE_MEMBER,
        )
        .await
        .unwrap();

    let err = state
        .permission_service
        .require(invitee, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_pending_board_membership_grants_nothing_until_accepted() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;

    let invitee = Uuid::new_v4();
    state
        .membership_service
        .invite(ContainerKind::Board, tb.board.id, invitee, roles::BOARD_MEMBER)
        .await
        .unwrap();

    let err = state
        .permission_service
        .require(invitee, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    state
        .membership_service
        .respond_invitation(ContainerKind::Board, tb.board.id, invitee, true)
        .await
        .unwrap();

    state
        .permission_service
        .require(invitee, Target::List(tb.list.id), &[perms::LIST_CREATE], MatchMode::All)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_card_membership_grants_access_to_that_card_only() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let cards = create_cards(&state, tb.list.id, 2).await;

    let assignee = Uuid::new_v4();
    state
        .membership_service
        .add_member(ContainerKind::Card, cards[0].id, assignee, roles::BOARD_MEMBER)
        .await
        .unwrap();

    state
        .permission_service
        .require(assignee, Target::Card(cards[0].id), &[perms::CARD_UPDATE], MatchMode::Any)
        .await
        .unwrap();

    let err = state
        .permission_service
        .require(assignee, Target::Card(cards[1].id), &[perms::CARD_READ], MatchMode::Any)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state
        .permission_service
        .require(assignee, Target::Board(tb.board.id), &[perms::BOARD_READ], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_card_checks_union_card_and_board_memberships() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let cards = create_cards(&state, tb.list.id, 1).await;

    // 看板只读，卡片上是成员：卡片上的写权限来自卡片成员关系
    let viewer = add_board_member(&state, tb.board.id, roles::BOARD_VIEWER).await;
    state
        .membership_service
        .add_member(ContainerKind::Card, cards[0].id, viewer, roles::BOARD_MEMBER)
        .await
        .unwrap();

    let access = state
        .permission_service
        .access(viewer, Target::Card(cards[0].id))
        .await
        .unwrap();
    assert_eq!(access.roles, vec![roles::BOARD_MEMBER, roles::BOARD_VIEWER]);

    state
        .permission_service
        .require(viewer, Target::Card(cards[0].id), &[perms::CARD_MOVE], MatchMode::Any)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_card_checks_default_to_any() {
    let (_store, state) = setup();
    let tb = setup_board(&state, PermissionLevel::Private).await;
    let cards = create_cards(&state, tb.list.id, 1).await;
    let viewer = add_board_member(&state, tb.board.id, roles::BOARD_VIEWER).await;
    let target = Target::Card(cards[0].id);

    assert_eq!(target.kind().default_mode(), MatchMode::Any);

    state
        .permission_service
        .require(viewer, target, &[perms::CARD_UPDATE, perms::CARD_READ], MatchMode::Any)
        .await
        .unwrap();

    let err = state
        .permission_service
        .require(viewer, target, &[perms::CARD_UPDATE, perms::CARD_READ], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_global_permissions_default_to_user_role() {
    let (_store, state) = setup();
    let user = Uuid::new_v4();

    let resolved = state.permission_service.global_permissions(user).await.unwrap();
    assert_eq!(resolved.roles, vec![roles::USER.to_string()]);
    assert!(resolved.permissions.contains(perms::WORKSPACE_CREATE));

    let err = state
        .permission_service
        .require_global(user, &[perms::USER_MANAGE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    state
        .permission_service
        .assign_global_role(user, roles::ADMIN)
        .await
        .unwrap();

    let resolved = state
        .permission_service
        .require_global(user, &[perms::USER_MANAGE], MatchMode::All)
        .await
        .unwrap();
    assert_eq!(resolved.roles, vec![roles::ADMIN.to_string()]);
}

#[tokio::test]
async fn test_guest_role_replaces_default() {
    let (_store, state) = setup();
    let guest = Uuid::new_v4();
    state
        .permission_service
        .assign_global_role(guest, roles::GUEST)
        .await
        .unwrap();

    let err = state
        .permission_service
        .require_global(guest, &[perms::WORKSPACE_CREATE], MatchMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_assigning_non_global_role_is_rejected() {
    let (_store, state) = setup();

    let err = state
        .permission_service
        .assign_global_role(Uuid::new_v4(), roles::BOARD_ADMIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = state
        .permission_service
        .assign_global_role(Uuid::new_v4(), "superuser")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
