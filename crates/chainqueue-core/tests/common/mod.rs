#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use chainqueue_core::domain::{CreateMarket, FinalizeResolution, PrivateKey};
use chainqueue_core::{Engine, OperationError, Task, TaskContext, TaskId, TaskStatus, TaskView};
use chainqueue_core::typed::Handler;

#[derive(Default)]
pub struct Stats {
    pub calls: AtomicU32,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl Stats {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Fails the first `failures` calls (across all tasks), sleeping `latency` per call.
#[derive(Clone)]
pub struct ScriptedHandler {
    failures: u32,
    latency: Duration,
    stats: Arc<Stats>,
}

impl ScriptedHandler {
    pub fn new(failures: u32, latency: Duration) -> Self {
        Self {
            failures,
            latency,
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn succeeding(latency: Duration) -> Self {
        Self::new(0, latency)
    }

    pub fn failing(latency: Duration) -> Self {
        Self::new(u32::MAX, latency)
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl<T: Task> Handler<T> for ScriptedHandler {
    async fn handle(&self, _task: &T, ctx: &TaskContext) -> Result<serde_json::Value, OperationError> {
        let call = self.stats.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(active, Ordering::SeqCst);

        ctx.report_progress(format!("broadcasting transaction (call {call})"))
            .await;
        tokio::time::sleep(self.latency).await;
        self.stats.active.fetch_sub(1, Ordering::SeqCst);

        if call <= self.failures {
            return Err(OperationError::transient(format!("rpc timeout (call {call})")));
        }
        Ok(json!({ "tx_hash": format!("0x{call:064x}") }))
    }
}

pub fn create_market(application_id: &str) -> CreateMarket {
    CreateMarket {
        application_id: application_id.to_string(),
        application_details: json!({ "project_name": "Gitcoin Grants", "amount": 5000 }),
    }
}

pub fn finalize(market_id: &str) -> FinalizeResolution {
    FinalizeResolution {
        market_id: market_id.to_string(),
        from_private_key: PrivateKey::new("0x4c0883a69102937d6231471b5dbb6204fe512961708279f"),
        safe_address: None,
    }
}

/// Poll once per (virtual) second until the task is terminal.
///
/// Returns the final view and the sequence of distinct statuses observed.
pub async fn wait_terminal(engine: &Engine, task_id: TaskId) -> (TaskView, Vec<TaskStatus>) {
    let mut seen: Vec<TaskStatus> = Vec::new();
    for _ in 0..(4 * 3600) {
        let view = engine.status(task_id).await.expect("task exists");
        if seen.last() != Some(&view.status) {
            seen.push(view.status);
        }
        if view.status.is_terminal() {
            return (view, seen);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("task {task_id} did not finish; saw {seen:?}");
}
