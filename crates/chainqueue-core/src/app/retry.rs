//! Retry policy and scheduler.
//!
//! RetryScheduler は「遅延後に queue に戻す」だけで、タスク自体は実行しません。
//! 待機は独立した tokio task（timer）で行うので worker の枠を占有しません。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::TaskId;
use crate::ports::DeliveryQueue;

/// Retry policy for failed tasks.
///
/// delay = base_delay * multiplier^(retry_count - 1), capped at max_delay.
///
/// With the defaults (base 2 min, multiplier 2.0):
/// - retry 1: 2 min
/// - retry 2: 4 min
/// - retry 3: 8 min
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(120),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry_count` (1-indexed; 0 is treated as 1).
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        // 負の multiplier で符号が反転しうる
        if delay_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(delay_secs)
    }
}

/// Re-admits retryable tasks to the queue after their backoff elapses.
pub struct RetryScheduler {
    policy: RetryPolicy,
    queue: Arc<dyn DeliveryQueue>,
    shutdown_rx: watch::Receiver<bool>,
    in_flight: Arc<AtomicUsize>,
}

impl RetryScheduler {
    pub fn new(
        policy: RetryPolicy,
        queue: Arc<dyn DeliveryQueue>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            policy,
            queue,
            shutdown_rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of timers currently waiting to re-enqueue a task.
    pub fn scheduled(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start a timer that pushes `task_id` back after the backoff for `retry_count`.
    ///
    /// Returns the computed delay. The timer is dropped without pushing if
    /// shutdown is requested first.
    pub fn schedule(&self, task_id: TaskId, retry_count: u32) -> Duration {
        let delay = self.policy.next_delay(retry_count);
        let queue = Arc::clone(&self.queue);
        let in_flight = Arc::clone(&self.in_flight);
        let mut shutdown_rx = self.shutdown_rx.clone();

        in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    match queue.push(task_id).await {
                        Ok(()) => tracing::info!(%task_id, retry_count, "re-queued for retry"),
                        Err(e) => tracing::warn!(%task_id, error = %e, "retry dropped"),
                    }
                }
                _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                    tracing::debug!(%task_id, "retry timer cancelled by shutdown");
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        delay
    }
}
