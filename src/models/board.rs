//! Workspace / board / list / card models
//! 所有权树：Workspace → Board → List → Card

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 看板可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "permission_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// 仅看板成员
    #[default]
    Private,
    /// 工作区已接受成员可读
    Workspace,
    /// 任何人可读
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub permission_level: PermissionLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BoardList {
    pub id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    pub position: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Card {
    pub id: Uuid,
    pub list_id: Uuid,
    pub title: String,
    pub position: f64,
    pub created_at: DateTime<Utc>,
}

/// Create workspace request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateWorkspaceRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Create board request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateBoardRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub permission_level: PermissionLevel,
}

/// Create list request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateListRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Create card request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateCardRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
}
