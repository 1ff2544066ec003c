//! DeliveryQueue port - 配送キュー
//!
//! DeliveryQueue は task_id のみを流します（状態や payload は TaskRegistry 側）。

use async_trait::async_trait;

use crate::domain::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is closed; rejected {0}")]
    Closed(TaskId),
}

/// DeliveryQueue は task_id を配送するためのキュー
///
/// # 設計原則
/// - FIFO（retry も末尾に入る）
/// - 容量制限なし（backpressure は worker 数のみ）
/// - 重複排除なし（同じ id を二重に push しないのは呼び出し側の責任）
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Append an id at the tail.
    async fn push(&self, task_id: TaskId) -> Result<(), QueueError>;

    /// Wait for the next id. Returns `None` once the queue is closed and drained.
    async fn pop(&self) -> Option<TaskId>;

    /// Stop accepting ids and wake every waiting `pop`.
    async fn close(&self);

    async fn is_closed(&self) -> bool;

    /// Number of ids waiting to be popped.
    async fn len(&self) -> usize;
}
