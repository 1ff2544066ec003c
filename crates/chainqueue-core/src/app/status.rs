//! Status - 外部に返すビュー（TaskView / QueueMetrics / SubmitReceipt）
//!
//! TaskRecord をそのまま返すと payload（秘密鍵を含む）が漏れるので、
//! クエリ結果は必ずこのモジュールのビューを経由させる。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{TaskError, TaskId, TaskKind, TaskRecord, TaskStatus};
use crate::error::StatusError;
use crate::observability::StatusCounts;

/// Cap for `estimated_progress`; completion is only reported once the task finishes.
const PROGRESS_CEILING: f64 = 90.0;

/// Snapshot of one task as seen by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub task_type: TaskKind,
    /// Market or application id the operation targets.
    pub subject: String,
    pub status: TaskStatus,
    pub progress: String,
    /// Percentage estimate based on elapsed time; only for Processing tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<TaskError>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskView {
    pub fn from_record(record: &TaskRecord, now: DateTime<Utc>) -> Self {
        Self {
            task_id: record.id,
            task_type: record.kind(),
            subject: record.request.subject().to_string(),
            status: record.status,
            progress: record.progress.clone(),
            estimated_progress: estimated_progress(record, now),
            result: record.result.clone(),
            error: record.error.clone(),
            last_error: record.last_error.clone(),
            retry_count: record.retry_count,
            max_retries: record.max_retries,
            created_at: record.created_at,
            updated_at: record.updated_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
        }
    }
}

fn estimated_progress(record: &TaskRecord, now: DateTime<Utc>) -> Option<f64> {
    if record.status != TaskStatus::Processing {
        return None;
    }
    let started_at = record.started_at?;
    let elapsed = (now - started_at).num_milliseconds().max(0) as f64 / 1000.0;
    let expected = record.kind().expected_duration().as_secs_f64();
    if expected <= 0.0 {
        return Some(PROGRESS_CEILING);
    }
    let percent = (elapsed / expected * 100.0).min(PROGRESS_CEILING);
    Some((percent * 10.0).round() / 10.0)
}

/// Parameters of a "recent tasks" listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentQuery {
    /// Lookback window; the engine's configured window when `None`.
    pub window_hours: Option<u32>,
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
}

impl RecentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_hours(mut self, hours: u32) -> Self {
        self.window_hours = Some(hours);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Parse a status filter from user input ("completed", "failed", ...).
    pub fn status_str(self, status: &str) -> Result<Self, StatusError> {
        Ok(self.status(status.parse()?))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Terminal outcomes within the recent window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPerformance {
    pub window_hours: u32,
    pub completed: usize,
    pub failed: usize,
    /// `None` when nothing in the window has finished yet.
    pub success_rate_percent: Option<f64>,
}

/// Aggregate view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueMetrics {
    /// Tasks waiting for their first attempt.
    pub pending: usize,
    pub processing: usize,
    /// Tasks waiting out a backoff delay.
    pub retrying: usize,
    /// Ids currently sitting in the delivery queue.
    pub queue_depth: usize,
    /// Backoff timers still running.
    pub scheduled_retries: usize,
    pub max_concurrent_tasks: usize,
    pub recent_performance: RecentPerformance,
}

impl QueueMetrics {
    pub(crate) fn new(
        all: StatusCounts,
        recent: StatusCounts,
        window_hours: u32,
        queue_depth: usize,
        scheduled_retries: usize,
        max_concurrent_tasks: usize,
    ) -> Self {
        Self {
            pending: all.pending,
            processing: all.processing,
            retrying: all.retrying,
            queue_depth,
            scheduled_retries,
            max_concurrent_tasks,
            recent_performance: RecentPerformance {
                window_hours,
                completed: recent.completed,
                failed: recent.failed,
                success_rate_percent: recent.success_rate_percent(),
            },
        }
    }
}

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub task_id: TaskId,
    pub status: &'static str,
    pub message: String,
    pub estimated_completion: &'static str,
}

impl SubmitReceipt {
    pub(crate) fn accepted(task_id: TaskId, kind: TaskKind) -> Self {
        Self {
            task_id,
            status: "accepted",
            message: format!("{kind} task queued for processing"),
            estimated_completion: kind.estimated_completion(),
        }
    }
}
