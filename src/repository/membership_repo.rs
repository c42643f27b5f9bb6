//! Membership SQL shared by the pool-level reads and the transaction writes

use crate::{
    error::{AppError, Result},
    models::membership::{ContainerKind, ContainerLock, Membership},
};
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

/// 成员关系查询（关联角色名称）
pub(crate) const MEMBERSHIP_SELECT: &str = r#"
    SELECT
        m.id,
        m.container_kind,
        m.container_id,
        m.user_id,
        m.role_id,
        r.name AS role_name,
        m.status,
        m.created_at,
        m.updated_at
    FROM memberships m
    JOIN roles r ON m.role_id = r.id
"#;

pub(crate) async fn fetch_membership_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Membership> {
    let membership = sqlx::query_as::<Postgres, Membership>(&format!(
        "{} WHERE m.id = $1",
        MEMBERSHIP_SELECT
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("membership"))?;

    Ok(membership)
}

pub(crate) async fn lock_memberships(
    conn: &mut PgConnection,
    kind: ContainerKind,
    container_id: Uuid,
) -> Result<Vec<Membership>> {
    let memberships = sqlx::query_as::<Postgres, Membership>(&format!(
        "{} WHERE m.container_kind = $1 AND m.container_id = $2 ORDER BY m.created_at, m.id FOR UPDATE OF m",
        MEMBERSHIP_SELECT
    ))
    .bind(kind)
    .bind(container_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(memberships)
}

/// 锁定容器行，返回其所有者
pub(crate) async fn lock_container(
    conn: &mut PgConnection,
    kind: ContainerKind,
    container_id: Uuid,
) -> Result<Option<ContainerLock>> {
    let sql = match kind {
        ContainerKind::Workspace => "SELECT owner_id FROM workspaces WHERE id = $1 FOR UPDATE",
        ContainerKind::Board => "SELECT owner_id FROM boards WHERE id = $1 FOR UPDATE",
        ContainerKind::Card => "SELECT NULL::uuid AS owner_id FROM cards WHERE id = $1 FOR UPDATE",
    };

    let row: Option<Option<Uuid>> = sqlx::query_scalar(sql)
        .bind(container_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|owner_id| ContainerLock { owner_id }))
}
