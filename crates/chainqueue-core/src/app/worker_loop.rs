//! WorkerPool - 固定数のワーカーで queue を消費する
//!
//! 1 ワーカーの 1 サイクル:
//! 1. pop（shutdown と select で競合させる）
//! 2. claim: Pending/Retrying → Processing（pop 直後、handler より前）
//! 3. handler 実行（別 task で実行し、panic は Infrastructure エラーとして扱う）
//! 4. 結果を registry に反映し、必要なら RetryScheduler に渡す
//!
//! ワーカーは handler を同時に 1 つしか実行しないので、
//! Processing の数は常に pool size 以下になる。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::retry::RetryScheduler;
use crate::domain::{FailureDisposition, OperationError, TaskId, TaskRequest};
use crate::ports::DeliveryQueue;
use crate::registry::TaskRegistry;
use crate::typed::{TaskContext, TypedRegistry};

/// Shared collaborators of every worker.
#[derive(Clone)]
pub(crate) struct WorkerDeps {
    pub registry: Arc<TaskRegistry>,
    pub queue: Arc<dyn DeliveryQueue>,
    pub handlers: Arc<TypedRegistry>,
    pub retry: Arc<RetryScheduler>,
}

/// Handle to the spawned workers.
///
/// Workers stop taking new ids once the shutdown watch flips to `true`
/// or the queue is closed; in-flight attempts run to completion.
pub struct WorkerPool {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn spawn(size: usize, deps: WorkerDeps, shutdown_rx: watch::Receiver<bool>) -> Self {
        let joins = (0..size)
            .map(|worker_id| {
                let deps = deps.clone();
                let rx = shutdown_rx.clone();
                tokio::spawn(async move { worker_loop(worker_id, deps, rx).await })
            })
            .collect();
        Self { joins }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker terminated abnormally");
            }
        }
    }
}

async fn worker_loop(worker_id: usize, deps: WorkerDeps, mut shutdown_rx: watch::Receiver<bool>) {
    tracing::debug!(worker = worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // pop は待つ可能性があるので shutdown と競合させる
        let popped = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // sender が drop された = engine が消えた
                    break;
                }
                continue;
            }
            popped = deps.queue.pop() => popped,
        };

        let Some(task_id) = popped else {
            // closed and drained
            break;
        };

        process(worker_id, &deps, task_id).await;
    }
    tracing::debug!(worker = worker_id, "worker stopped");
}

async fn process(worker_id: usize, deps: &WorkerDeps, task_id: TaskId) {
    let claimed = deps
        .registry
        .update(task_id, |record, now| {
            record
                .start_attempt(now)
                .map(|()| (record.request.clone(), record.attempt()))
        })
        .await;

    let (request, attempt) = match claimed {
        Ok(Ok(claimed)) => claimed,
        Ok(Err(e)) => {
            tracing::warn!(worker = worker_id, %task_id, error = %e, "skipping task");
            return;
        }
        Err(e) => {
            tracing::warn!(worker = worker_id, %task_id, error = %e, "skipping task");
            return;
        }
    };

    let kind = request.kind();
    let span = tracing::info_span!("task", worker = worker_id, %task_id, %kind, attempt);
    run_attempt(deps, task_id, request, attempt)
        .instrument(span)
        .await;
}

async fn run_attempt(deps: &WorkerDeps, task_id: TaskId, request: TaskRequest, attempt: u32) {
    tracing::info!(subject = request.subject(), "processing");

    let ctx = TaskContext::new(task_id, attempt, Arc::clone(&deps.registry));
    match run_handler(Arc::clone(&deps.handlers), request, ctx).await {
        Ok(result) => {
            match deps
                .registry
                .update(task_id, |record, now| record.mark_completed(result, now))
                .await
            {
                Ok(Ok(())) => tracing::info!("completed"),
                Ok(Err(e)) => tracing::warn!(error = %e, "could not record completion"),
                Err(e) => tracing::warn!(error = %e, "could not record completion"),
            }
        }
        Err(err) => {
            let disposition = deps
                .registry
                .update(task_id, |record, now| record.record_failure(&err, now))
                .await;
            match disposition {
                Ok(Ok(FailureDisposition::Retry { retry_count })) => {
                    let delay = deps.retry.schedule(task_id, retry_count);
                    tracing::warn!(
                        error = %err,
                        retry_count,
                        delay_secs = delay.as_secs(),
                        "attempt failed, retry scheduled"
                    );
                }
                Ok(Ok(FailureDisposition::Exhausted)) => {
                    tracing::error!(error = %err, "task failed, retries exhausted");
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "could not record failure"),
                Err(e) => tracing::warn!(error = %e, "could not record failure"),
            }
        }
    }
}

/// Run one attempt on its own tokio task so a panicking handler fails the
/// task instead of killing the worker.
async fn run_handler(
    handlers: Arc<TypedRegistry>,
    request: TaskRequest,
    ctx: TaskContext,
) -> Result<serde_json::Value, OperationError> {
    let attempt = tokio::spawn(async move { handlers.dispatch(&request, &ctx).await });
    match attempt.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(OperationError::infrastructure("handler panicked")),
        Err(e) => Err(OperationError::infrastructure(format!("handler aborted: {e}"))),
    }
}
