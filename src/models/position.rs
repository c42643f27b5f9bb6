//! Ordering models

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 有序实体类型：列表在看板下排序，卡片在列表下排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderedKind {
    List,
    Card,
}

impl OrderedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderedKind::List => "list",
            OrderedKind::Card => "card",
        }
    }
}

impl fmt::Display for OrderedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 兄弟节点（id + 位置）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sibling {
    pub id: Uuid,
    pub position: f64,
}

/// 兄弟节点排序：位置升序，位置相同按 id
pub fn sort_siblings(siblings: &mut [Sibling]) {
    siblings.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.id.cmp(&b.id)));
}

/// Move a list or card between two neighbours.
/// 两端都缺省表示追加到目标集合末尾。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoveRequest {
    /// 目标列表（仅卡片，跨列表移动）
    pub list_id: Option<Uuid>,
    /// 移动后位于其后的兄弟（前一个邻居）
    pub before_id: Option<Uuid>,
    /// 移动后位于其前的兄弟（后一个邻居）
    pub after_id: Option<Uuid>,
}

/// Position response
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub id: Uuid,
    pub position: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_siblings_breaks_ties_by_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let mut siblings = vec![
            Sibling { id: high, position: 5.0 },
            Sibling { id: Uuid::from_u128(3), position: 1.0 },
            Sibling { id: low, position: 5.0 },
        ];
        sort_siblings(&mut siblings);
        let ids: Vec<Uuid> = siblings.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(3), low, high]);
    }
}
