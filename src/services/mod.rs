//! Business logic services layer

pub mod board_service;
pub mod invitation_service;
pub mod membership_service;
pub mod permission_service;
pub mod position_service;

pub use board_service::BoardService;
pub use invitation_service::InvitationService;
pub use membership_service::MembershipService;
pub use permission_service::PermissionService;
pub use position_service::PositionService;

use crate::error::Result;
use std::future::Future;

/// 对可重试错误（锁冲突、序列化失败）重新执行整个事务
pub(crate) async fn retry_transient<T, F, Fut>(
    max_retries: u32,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && retries < max_retries => {
                retries += 1;
                tracing::warn!(
                    operation,
                    retry = retries,
                    max_retries,
                    error = %e,
                    "Transient failure, retrying transaction"
                );
            }
            result => return result,
        }
    }
}
