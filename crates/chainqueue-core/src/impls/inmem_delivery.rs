//! InMemoryDeliveryQueue - プロセス内の配送キュー
//!
//! # 実装詳細
//! - tokio Mutex<VecDeque<TaskId>> で FIFO を管理
//! - Notify で push 時に待機中の pop を起こす（sleep によるポーリングはしない）
//! - close() 後の pop は残りを吐き出してから None を返す

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::TaskId;
use crate::ports::{DeliveryQueue, QueueError};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<TaskId>,
    closed: bool,
}

#[derive(Default)]
pub struct InMemoryDeliveryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn push(&self, task_id: TaskId) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed(task_id));
            }
            state.ready.push_back(task_id);
        }
        // ロック外で通知
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self) -> Option<TaskId> {
        loop {
            // 先に Notified を登録してから中身を確認する（通知の取りこぼし防止）
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(task_id) = state.ready.pop_front() {
                    return Some(task_id);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }
}
