//! 排序位置分配与重排
//!
//! 位置是分数键：插入两邻居之间取中点，只有当两邻居之间已无可用间隔时
//! 才把整个兄弟集合重排为 `GAP, 2*GAP, 3*GAP, ...`。

use super::retry_transient;
use crate::{
    config::OrderingConfig,
    error::{AppError, Result},
    models::position::{OrderedKind, Sibling},
    repository::{Store, StoreTx},
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// 一次请求内最多尝试两次：原始邻居一次，重排后一次
const MAX_ATTEMPTS: usize = 2;

/// 分配结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Key(f64),
    /// 邻居之间已无可用间隔，需要重排
    Exhausted,
}

/// 计算插入到 `before` 与 `after` 之间的新位置。
///
/// - 两端都缺省：`gap`
/// - 只有 `after`（插到最前）：`after / 2`；`after <= 1` 视为耗尽
/// - 只有 `before`（插到最后）：`before + gap`
/// - 两端都有：间隔大于 1 取中点，否则耗尽
///
/// 调用方保证 `before <= after`。
pub fn next_key(before: Option<f64>, after: Option<f64>, gap: f64) -> Slot {
    let candidate = match (before, after) {
        (None, None) => return Slot::Key(gap),
        (None, Some(after)) if after > 1.0 => after / 2.0,
        (Some(before), None) => before + gap,
        (Some(before), Some(after)) if after - before > 1.0 => (before + after) / 2.0,
        _ => return Slot::Exhausted,
    };

    // 浮点精度耗尽时候选值会落在边界上
    let above = before.map_or(true, |b| candidate > b);
    let below = after.map_or(true, |a| candidate < a);
    if above && below {
        Slot::Key(candidate)
    } else {
        Slot::Exhausted
    }
}

/// 重排后的位置：`(i + 1) * gap`
pub fn rebalanced_positions(count: usize, gap: f64) -> Vec<f64> {
    (1..=count).map(|i| i as f64 * gap).collect()
}

/// 邻居顺序校验：`before` 不能排在 `after` 之后
pub fn validate_neighbours(before: Option<f64>, after: Option<f64>) -> Result<()> {
    if let (Some(before), Some(after)) = (before, after) {
        if before > after {
            return Err(AppError::bad_request(
                "before neighbour must not be positioned after the after neighbour",
            ));
        }
    }
    Ok(())
}

pub struct PositionService {
    store: Arc<dyn Store>,
    config: OrderingConfig,
}

impl PositionService {
    pub fn new(store: Arc<dyn Store>, config: OrderingConfig) -> Self {
        Self { store, config }
    }

    pub fn gap(&self) -> f64 {
        self.config.gap
    }

    /// 按位置键分配新位置。键需要重排时在单独事务中重排 `parent_id` 的兄弟集合，
    /// 并以邻居重排后的新键再分配一次。
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        kind: OrderedKind,
        parent_id: Uuid,
        before_key: Option<f64>,
        after_key: Option<f64>,
    ) -> Result<f64> {
        validate_neighbours(before_key, after_key)?;

        if let Slot::Key(key) = next_key(before_key, after_key, self.config.gap) {
            return Ok(key);
        }

        retry_transient(self.config.max_retries, "allocate", || {
            self.allocate_after_rebalance(kind, parent_id, before_key, after_key)
        })
        .await
    }

    async fn allocate_after_rebalance(
        &self,
        kind: OrderedKind,
        parent_id: Uuid,
        before_key: Option<f64>,
        after_key: Option<f64>,
    ) -> Result<f64> {
        let mut tx = self.store.begin().await?;
        let siblings = tx.lock_siblings(kind, parent_id).await?;

        // 位置相同时，前邻居取最后一个、后邻居取第一个
        let before_index = before_key
            .map(|key| {
                siblings
                    .iter()
                    .rposition(|s| s.position == key)
                    .ok_or_else(|| AppError::bad_request("before key is not a sibling position"))
            })
            .transpose()?;
        let after_index = after_key
            .map(|key| {
                siblings
                    .iter()
                    .position(|s| s.position == key)
                    .ok_or_else(|| AppError::bad_request("after key is not a sibling position"))
            })
            .transpose()?;

        let rebalanced = self.rebalance_in(tx.as_mut(), kind, parent_id).await?;
        let before = before_index.map(|i| rebalanced[i].position);
        let after = after_index.map(|i| rebalanced[i].position);

        match next_key(before, after, self.config.gap) {
            Slot::Key(key) => {
                tx.commit().await?;
                record_rebalance(kind);
                Ok(key)
            }
            Slot::Exhausted => Err(AppError::Internal(
                "position space exhausted after rebalance".to_string(),
            )),
        }
    }

    /// 重排一个父节点下的全部兄弟（单事务，全部成功或全部回滚）
    #[instrument(skip(self))]
    pub async fn rebalance(&self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        retry_transient(self.config.max_retries, "rebalance", || {
            self.try_rebalance(kind, parent_id)
        })
        .await
    }

    async fn try_rebalance(&self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        let mut tx = self.store.begin().await?;
        let rebalanced = self.rebalance_in(tx.as_mut(), kind, parent_id).await?;
        tx.commit().await?;
        record_rebalance(kind);
        Ok(rebalanced)
    }

    /// 在调用方的事务中重排
    async fn rebalance_in(
        &self,
        tx: &mut dyn StoreTx,
        kind: OrderedKind,
        parent_id: Uuid,
    ) -> Result<Vec<Sibling>> {
        let siblings = tx.lock_siblings(kind, parent_id).await?;
        let positions = rebalanced_positions(siblings.len(), self.config.gap);

        let mut rebalanced = Vec::with_capacity(siblings.len());
        for (sibling, position) in siblings.iter().zip(positions) {
            tx.write_position(kind, sibling.id, parent_id, position).await?;
            rebalanced.push(Sibling {
                id: sibling.id,
                position,
            });
        }

        info!(
            kind = %kind,
            parent_id = %parent_id,
            siblings = rebalanced.len(),
            "Sibling positions rebalanced"
        );

        Ok(rebalanced)
    }

    /// 把列表移动到同一看板内两个兄弟之间
    #[instrument(skip(self))]
    pub async fn move_list(
        &self,
        list_id: Uuid,
        before_id: Option<Uuid>,
        after_id: Option<Uuid>,
    ) -> Result<f64> {
        let list = self
            .store
            .find_list(list_id)
            .await?
            .ok_or_else(|| AppError::not_found("list"))?;

        self.reposition(OrderedKind::List, list_id, list.board_id, before_id, after_id)
            .await
    }

    /// 移动卡片；`target_list_id` 缺省时在原列表内移动，跨列表只允许在同一看板内
    #[instrument(skip(self))]
    pub async fn move_card(
        &self,
        card_id: Uuid,
        target_list_id: Option<Uuid>,
        before_id: Option<Uuid>,
        after_id: Option<Uuid>,
    ) -> Result<f64> {
        let card = self
            .store
            .find_card(card_id)
            .await?
            .ok_or_else(|| AppError::not_found("card"))?;

        let target = target_list_id.unwrap_or(card.list_id);
        if target != card.list_id {
            let source = self
                .store
                .find_list(card.list_id)
                .await?
                .ok_or_else(|| AppError::not_found("list"))?;
            let destination = self
                .store
                .find_list(target)
                .await?
                .ok_or_else(|| AppError::not_found("list"))?;
            if source.board_id != destination.board_id {
                return Err(AppError::bad_request("cards can only move within one board"));
            }
        }

        self.reposition(OrderedKind::Card, card_id, target, before_id, after_id)
            .await
    }

    async fn reposition(
        &self,
        kind: OrderedKind,
        item_id: Uuid,
        parent_id: Uuid,
        before_id: Option<Uuid>,
        after_id: Option<Uuid>,
    ) -> Result<f64> {
        if before_id == Some(item_id) || after_id == Some(item_id) {
            return Err(AppError::bad_request("an item cannot be its own neighbour"));
        }
        if before_id.is_some() && before_id == after_id {
            return Err(AppError::bad_request("before and after neighbours must differ"));
        }

        retry_transient(self.config.max_retries, "reposition", || {
            self.try_reposition(kind, item_id, parent_id, before_id, after_id)
        })
        .await
    }

    /// 锁定兄弟集合 → 分配 → 必要时重排 → 写入，全部在一个事务内
    async fn try_reposition(
        &self,
        kind: OrderedKind,
        item_id: Uuid,
        parent_id: Uuid,
        before_id: Option<Uuid>,
        after_id: Option<Uuid>,
    ) -> Result<f64> {
        let mut tx = self.store.begin().await?;
        let mut siblings = tx.lock_siblings(kind, parent_id).await?;
        let mut rebalanced = false;

        for attempt in 1..=MAX_ATTEMPTS {
            let (before, after) = if before_id.is_none() && after_id.is_none() {
                // 未给邻居：追加到其他兄弟之后，空集合才取起始间隔
                (last_other_position(&siblings, item_id), None)
            } else {
                let before = neighbour_position(&siblings, before_id, "before_id")?;
                let after = neighbour_position(&siblings, after_id, "after_id")?;
                validate_neighbours(before, after)?;
                (before, after)
            };

            match next_key(before, after, self.config.gap) {
                Slot::Key(position) => {
                    tx.write_position(kind, item_id, parent_id, position).await?;
                    tx.commit().await?;
                    if rebalanced {
                        record_rebalance(kind);
                    }

                    info!(
                        kind = %kind,
                        id = %item_id,
                        parent_id = %parent_id,
                        position,
                        "Position updated"
                    );
                    return Ok(position);
                }
                Slot::Exhausted if attempt < MAX_ATTEMPTS => {
                    siblings = self.rebalance_in(tx.as_mut(), kind, parent_id).await?;
                    rebalanced = true;
                }
                Slot::Exhausted => break,
            }
        }

        Err(AppError::Internal(
            "position space exhausted after rebalance".to_string(),
        ))
    }

    /// 在调用方事务中取追加到末尾的位置（新建列表 / 卡片）
    pub(crate) async fn append_in(
        &self,
        tx: &mut dyn StoreTx,
        kind: OrderedKind,
        parent_id: Uuid,
    ) -> Result<f64> {
        let siblings = tx.lock_siblings(kind, parent_id).await?;
        let last = siblings.last().map(|s| s.position);

        match next_key(last, None, self.config.gap) {
            Slot::Key(position) => Ok(position),
            Slot::Exhausted => {
                let rebalanced = self.rebalance_in(tx, kind, parent_id).await?;
                match next_key(rebalanced.last().map(|s| s.position), None, self.config.gap) {
                    Slot::Key(position) => Ok(position),
                    Slot::Exhausted => Err(AppError::Internal(
                        "position space exhausted after rebalance".to_string(),
                    )),
                }
            }
        }
    }

    /// 按位置顺序列出兄弟节点
    pub async fn siblings(&self, kind: OrderedKind, parent_id: Uuid) -> Result<Vec<Sibling>> {
        self.store.list_siblings(kind, parent_id).await
    }
}

fn neighbour_position(
    siblings: &[Sibling],
    neighbour: Option<Uuid>,
    field: &str,
) -> Result<Option<f64>> {
    neighbour
        .map(|id| {
            siblings
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.position)
                .ok_or_else(|| AppError::BadRequest(format!("{} is not a sibling in the target", field)))
        })
        .transpose()
}

fn last_other_position(siblings: &[Sibling], item_id: Uuid) -> Option<f64> {
    siblings
        .iter()
        .filter(|s| s.id != item_id)
        .map(|s| s.position)
        .last()
}

fn record_rebalance(kind: OrderedKind) {
    metrics::counter!("positions_rebalanced_total", "kind" => kind.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: f64 = 16384.0;

    #[test]
    fn test_empty_set_gets_default_key() {
        assert_eq!(next_key(None, None, GAP), Slot::Key(GAP));
    }

    #[test]
    fn test_front_insertion_halves_first_key() {
        assert_eq!(next_key(None, Some(16384.0), GAP), Slot::Key(8192.0));
    }

    #[test]
    fn test_front_insertion_below_one_is_exhausted() {
        assert_eq!(next_key(None, Some(1.0), GAP), Slot::Exhausted);
        assert_eq!(next_key(None, Some(0.5), GAP), Slot::Exhausted);
    }

    #[test]
    fn test_end_insertion_adds_gap() {
        assert_eq!(next_key(Some(32768.0), None, GAP), Slot::Key(49152.0));
    }

    #[test]
    fn test_midpoint_between_neighbours() {
        assert_eq!(next_key(Some(16384.0), Some(32768.0), GAP), Slot::Key(24576.0));
    }

    #[test]
    fn test_gap_of_one_or_less_is_exhausted() {
        assert_eq!(next_key(Some(10.0), Some(11.0), GAP), Slot::Exhausted);
        assert_eq!(next_key(Some(10.0), Some(10.5), GAP), Slot::Exhausted);
        assert_eq!(next_key(Some(10.0), Some(10.0), GAP), Slot::Exhausted);
    }

    #[test]
    fn test_precision_exhaustion_is_detected() {
        let huge = 1.0e300;
        assert_eq!(next_key(Some(huge), None, GAP), Slot::Exhausted);
    }

    #[test]
    fn test_allocated_keys_strictly_separate_neighbours() {
        let pairs = [
            (0.0, 2.5),
            (1.0, 1000.0),
            (8192.0, 16384.0),
            (123.25, 125.0),
            (16384.0, 1.0e9),
        ];
        for (before, after) in pairs {
            match next_key(Some(before), Some(after), GAP) {
                Slot::Key(key) => assert!(before < key && key < after, "{} < {} < {}", before, key, after),
                Slot::Exhausted => panic!("gap {} should be usable", after - before),
            }
        }
    }

    #[test]
    fn test_boundary_keys_stay_on_the_right_side() {
        for key in [1.5, 2.0, 100.0, 16384.0, 1.0e12] {
            match next_key(None, Some(key), GAP) {
                Slot::Key(k) => assert!(k < key),
                Slot::Exhausted => panic!("front slot before {} should be usable", key),
            }
            match next_key(Some(key), None, GAP) {
                Slot::Key(k) => assert!(k > key),
                Slot::Exhausted => panic!("end slot after {} should be usable", key),
            }
        }
    }

    #[test]
    fn test_rebalanced_positions_are_evenly_spaced() {
        assert_eq!(rebalanced_positions(3, GAP), vec![16384.0, 32768.0, 49152.0]);
        assert!(rebalanced_positions(0, GAP).is_empty());
    }

    #[test]
    fn test_validate_neighbours_rejects_inverted_order() {
        assert!(validate_neighbours(Some(20.0), Some(10.0)).is_err());
        assert!(validate_neighbours(Some(10.0), Some(10.0)).is_ok());
        assert!(validate_neighbours(None, Some(10.0)).is_ok());
    }
}
