//! Ownership tree reads (PostgreSQL)

use super::{HierarchyRepository, PgStore};
use crate::{
    error::Result,
    models::{
        board::{Board, BoardList, Card, Workspace},
        position::{OrderedKind, Sibling},
    },
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl HierarchyRepository for PgStore {
    async fn find_workspace(&self, id: Uuid) -> Result<Option<Workspace>> {
        let workspace = sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(workspace)
    }

    async fn find_board(&self, id: Uuid) -> Result<Option<Board>> {
        let board = sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(board)
    }

    async fn find_list(&self, id: Uuid) -> Result<Option<BoardList>> {
        let list = sqlx::query_as::<_, BoardList>("SELECT * FROM lists WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(list)
    }

    async fn find_card(&self, id: Uuid) -> Result<Option<Card>> {
        let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(card)
    }

    async fn list_siblings(&self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        let sql = match kind {
            OrderedKind::List => {
                "SELECT id, position FROM lists WHERE board_id = $1 ORDER BY position, id"
            }
            OrderedKind::Card => {
                "SELECT id, position FROM cards WHERE list_id = $1 ORDER BY position, id"
            }
        };

        let siblings = sqlx::query_as::<_, Sibling>(sql)
            .bind(parent_id)
            .fetch_all(&self.db)
            .await?;

        Ok(siblings)
    }
}
