//! Engine - 呼び出し側に見える唯一の入口
//!
//! # 責務
//! - submit: 検証 → レコード作成 → queue に push（ここで即座に返る）
//! - status / recent / queue_metrics: registry のスナップショットをビューに変換
//! - shutdown: 新規受付停止 → ワーカー停止 → join（以降も参照系は使える）
//!
//! 実行はすべてバックグラウンドのワーカーが行い、submit は handler を待ちません。

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::retry::RetryScheduler;
use super::status::{QueueMetrics, RecentQuery, SubmitReceipt, TaskView};
use super::worker_loop::WorkerPool;
use crate::config::EngineConfig;
use crate::domain::{TaskId, TaskKind, TaskRequest};
use crate::error::{StatusError, SubmitError};
use crate::ports::DeliveryQueue;
use crate::registry::{TaskFilter, TaskRegistry};
use crate::typed::{Task, TypedRegistry};

/// Start of a lookback window; `None` when it reaches past the representable range.
fn window_start(now: DateTime<Utc>, hours: u32) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(chrono::Duration::hours(i64::from(hours)))
}

/// Background tasks owned by a running engine; taken by the first shutdown.
pub(crate) struct Background {
    pub(crate) workers: WorkerPool,
    pub(crate) sweeper: Option<JoinHandle<()>>,
}

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) queue: Arc<dyn DeliveryQueue>,
    pub(crate) handlers: Arc<TypedRegistry>,
    pub(crate) retry: Arc<RetryScheduler>,
    pub(crate) background: Mutex<Option<Background>>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registered_kinds(&self) -> Vec<TaskKind> {
        self.handlers.registered_kinds()
    }

    /// Submit an untyped payload by task type name (e.g. `"place_bet"`).
    pub async fn submit_named(
        &self,
        task_type: &str,
        payload: serde_json::Value,
    ) -> Result<SubmitReceipt, SubmitError> {
        let kind: TaskKind = task_type.parse()?;
        self.submit(kind, payload).await
    }

    /// Submit an untyped JSON payload for `kind`.
    ///
    /// The payload is decoded up front; a malformed payload is rejected here
    /// and no task is created.
    pub async fn submit(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
    ) -> Result<SubmitReceipt, SubmitError> {
        if !self.handlers.contains(kind) {
            return Err(SubmitError::HandlerNotFound(kind));
        }
        let request = TaskRequest::decode(kind, payload)
            .map_err(|source| SubmitError::InvalidPayload { kind, source })?;
        self.enqueue(request, None).await
    }

    /// Submit a typed task with the kind's default retry ceiling.
    pub async fn submit_task<T: Task>(&self, task: T) -> Result<SubmitReceipt, SubmitError> {
        self.submit_task_with_retries(task, None).await
    }

    /// Submit a typed task, optionally overriding its retry ceiling.
    pub async fn submit_task_with_retries<T: Task>(
        &self,
        task: T,
        max_retries: Option<u32>,
    ) -> Result<SubmitReceipt, SubmitError> {
        if !self.handlers.contains(T::KIND) {
            return Err(SubmitError::HandlerNotFound(T::KIND));
        }
        self.enqueue(task.into_request(), max_retries).await
    }

    async fn enqueue(
        &self,
        request: TaskRequest,
        max_retries: Option<u32>,
    ) -> Result<SubmitReceipt, SubmitError> {
        if self.queue.is_closed().await {
            return Err(SubmitError::ShuttingDown);
        }

        let kind = request.kind();
        let max_retries = max_retries
            .or(self.config.default_max_retries)
            .unwrap_or_else(|| kind.default_max_retries());
        let subject = request.subject().to_string();

        let task_id = self.registry.create(request, max_retries).await;
        if let Err(e) = self.queue.push(task_id).await {
            // close() と競合した: レコードを残すと永久に Pending になる
            self.registry.discard(task_id).await;
            tracing::warn!(%task_id, %kind, error = %e, "submission rejected");
            return Err(SubmitError::ShuttingDown);
        }

        tracing::info!(%task_id, %kind, %subject, max_retries, "task submitted");
        Ok(SubmitReceipt::accepted(task_id, kind))
    }

    pub async fn status(&self, task_id: TaskId) -> Result<TaskView, StatusError> {
        let record = self
            .registry
            .get(task_id)
            .await
            .ok_or_else(|| StatusError::NotFound(task_id.to_string()))?;
        Ok(TaskView::from_record(&record, self.registry.now()))
    }

    /// Status lookup by the textual id; malformed ids are reported as not found.
    pub async fn status_str(&self, task_id: &str) -> Result<TaskView, StatusError> {
        let task_id: TaskId = task_id.parse()?;
        self.status(task_id).await
    }

    /// Tasks created within the window (most recent first).
    pub async fn recent(&self, query: RecentQuery) -> Vec<TaskView> {
        let now = self.registry.now();
        let window_hours = query.window_hours.unwrap_or(self.config.recent_window_hours);
        let filter = TaskFilter {
            status: query.status,
            created_after: window_start(now, window_hours),
            limit: query.limit,
        };
        self.registry
            .list(&filter)
            .await
            .iter()
            .map(|record| TaskView::from_record(record, now))
            .collect()
    }

    pub async fn queue_metrics(&self) -> QueueMetrics {
        let window_hours = self.config.recent_window_hours;
        let cutoff = window_start(self.registry.now(), window_hours);
        let all = self.registry.counts(None).await;
        let recent = self.registry.counts(cutoff).await;
        QueueMetrics::new(
            all,
            recent,
            window_hours,
            self.queue.len().await,
            self.retry.scheduled(),
            self.config.pool_size,
        )
    }

    /// Stop accepting work, cancel retry timers and wait for the workers.
    ///
    /// Attempts already running finish and record their outcome; tasks still
    /// waiting in the queue or on a backoff timer stay in their current state.
    /// Status queries keep working afterwards. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let Some(background) = self.background.lock().await.take() else {
            return;
        };
        tracing::info!("shutting down");
        let _ = self.shutdown_tx.send(true);
        self.queue.close().await;
        background.workers.join().await;
        if let Some(sweeper) = background.sweeper
            && let Err(e) = sweeper.await
        {
            tracing::error!(error = %e, "retention sweeper terminated abnormally");
        }
        tracing::info!("shutdown complete");
    }
}
