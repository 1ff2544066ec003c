//! RetentionSweeper - 終了済みレコードの定期回収
//!
//! interval ごとに `TaskRegistry::evict` を呼ぶだけ。
//! retention が無制限なら engine はこのループを起動しない。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::TaskRegistry;

pub struct RetentionSweeper {
    registry: Arc<TaskRegistry>,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(registry: Arc<TaskRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run one sweep and return the number of evicted records.
    pub async fn sweep(&self) -> usize {
        let evicted = self.registry.evict().await;
        if evicted > 0 {
            tracing::info!(evicted, "evicted finished tasks");
        }
        evicted
    }

    pub fn spawn(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // 最初の tick は即時に返るので読み捨てる
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    // watch::Ref は !Send なのでブランチ内で捨てる
                    _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => break,
                }
            }
            tracing::debug!("retention sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PrivateKey, SubmitAnswer, TaskStatus};
    use crate::ports::{FixedClock, UlidGenerator};
    use crate::registry::RetentionPolicy;
    use crate::typed::Task;
    use chrono::{TimeZone, Utc};

    fn answer() -> SubmitAnswer {
        SubmitAnswer {
            market_id: "0xm".into(),
            outcome: "Yes".into(),
            confidence: 0.9,
            reasoning: "milestones delivered".into(),
            from_private_key: PrivateKey::new("0xkey"),
            bond_amount_xdai: 0.01,
            safe_address: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_until_shutdown() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        ));
        let registry = Arc::new(TaskRegistry::new(
            clock.clone(),
            Arc::new(UlidGenerator::new(clock.clone())),
            RetentionPolicy {
                max_age: Some(chrono::Duration::minutes(5)),
                max_terminal_records: None,
            },
        ));
        let id = registry.create(answer().into_request(), 0).await;
        registry
            .update(id, |r, now| {
                r.start_attempt(now).unwrap();
                r.mark_completed(serde_json::json!({ "tx": "0x1" }), now).unwrap();
            })
            .await
            .unwrap();
        assert_eq!(registry.get(id).await.unwrap().status, TaskStatus::Completed);

        let (tx, rx) = watch::channel(false);
        let join = RetentionSweeper::new(registry.clone(), Duration::from_secs(60)).spawn(rx);

        clock.advance(chrono::Duration::minutes(10));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(registry.get(id).await.is_none());

        tx.send(true).unwrap();
        join.await.unwrap();
    }
}
