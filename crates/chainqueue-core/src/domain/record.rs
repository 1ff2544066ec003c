//! Task record: the single source of truth for one task's state.

use chrono::{DateTime, Utc};

use super::errors::{OperationError, TaskError};
use super::ids::TaskId;
use super::kind::TaskKind;
use super::payload::TaskRequest;
use super::state::TaskStatus;

/// Metadata + typed payload for a task in the registry.
///
/// Design:
/// - Queue structures hold TaskId only.
/// - All state transitions happen here and are checked against
///   [`TaskStatus::can_transition_to`].
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub request: TaskRequest,
    pub status: TaskStatus,

    /// Human-readable description of the current stage.
    pub progress: String,

    /// Set only when Completed.
    pub result: Option<serde_json::Value>,

    /// Set only when Failed.
    pub error: Option<TaskError>,

    /// Most recent attempt error, kept while Retrying for diagnostics.
    pub last_error: Option<TaskError>,

    pub retry_count: u32,
    pub max_retries: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the current (or last) attempt began.
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal state was reached.
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from} -> {to} for {id}")]
pub struct InvalidTransition {
    pub id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// What the worker should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Hand the task to the retry scheduler; `retry_count` is the new count.
    Retry { retry_count: u32 },
    /// Retries exhausted; the task is now Failed.
    Exhausted,
}

impl TaskRecord {
    pub fn new(id: TaskId, request: TaskRequest, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            request,
            status: TaskStatus::Pending,
            progress: "task queued".to_string(),
            result: None,
            error: None,
            last_error: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.request.kind()
    }

    /// 1-indexed number of the current (or next) attempt.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    fn transition(&mut self, next: TaskStatus, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Mark as processing (Pending/Retrying -> Processing).
    pub fn start_attempt(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Processing, now)?;
        self.error = None;
        self.started_at = Some(now);
        self.progress = format!(
            "executing {} (attempt {}/{})",
            self.kind(),
            self.attempt(),
            self.max_retries + 1
        );
        Ok(())
    }

    /// Mark as completed and store the operation result.
    pub fn mark_completed(
        &mut self,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Completed, now)?;
        self.result = Some(result);
        self.completed_at = Some(now);
        self.progress = "completed".to_string();
        Ok(())
    }

    /// Record a failed attempt and decide between Retrying and Failed.
    ///
    /// `retry_count` is capped at `max_retries`: a task that exhausts its
    /// retries ends with `retry_count == max_retries`.
    pub fn record_failure(
        &mut self,
        err: &OperationError,
        now: DateTime<Utc>,
    ) -> Result<FailureDisposition, InvalidTransition> {
        let task_error = TaskError::from_operation(err, self.attempt(), now);

        if self.retry_count < self.max_retries {
            self.transition(TaskStatus::Retrying, now)?;
            self.retry_count += 1;
            self.progress = format!(
                "attempt {} failed, retry {}/{} scheduled",
                task_error.attempt, self.retry_count, self.max_retries
            );
            self.last_error = Some(task_error);
            Ok(FailureDisposition::Retry {
                retry_count: self.retry_count,
            })
        } else {
            self.transition(TaskStatus::Failed, now)?;
            self.progress = format!("failed after {} retries", self.retry_count);
            self.completed_at = Some(now);
            self.last_error = Some(task_error.clone());
            self.error = Some(task_error);
            Ok(FailureDisposition::Exhausted)
        }
    }

    /// Update the progress text of a running attempt.
    ///
    /// Returns false (and changes nothing) unless the task is Processing.
    pub fn set_progress(&mut self, progress: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        self.progress = progress.into();
        self.updated_at = now;
        true
    }
}
