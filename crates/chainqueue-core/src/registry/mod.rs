//! TaskRegistry - タスクレコードの正本（in-memory）
//!
//! # ロック設計
//! - 外側: `RwLock<HashMap<TaskId, Arc<Mutex<TaskRecord>>>>`（挿入・削除のときだけ write）
//! - 内側: レコードごとの `Mutex`（同じ id への read-modify-write を直列化）
//!
//! 異なる id の更新は互いにブロックしません。
//! update のクロージャは同期関数なので、ロックを握ったまま await することはありません。

mod retention;

pub use retention::RetentionPolicy;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{TaskId, TaskRecord, TaskRequest, TaskStatus};
use crate::error::RecordError;
use crate::observability::StatusCounts;
use crate::ports::{Clock, IdGenerator};

type Slot = Arc<Mutex<TaskRecord>>;

/// Selection criteria for [`TaskRegistry::list`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Only records created strictly after this instant.
    pub created_after: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    fn matches(&self, record: &TaskRecord) -> bool {
        self.status.is_none_or(|status| record.status == status)
            && self
                .created_after
                .is_none_or(|cutoff| record.created_at > cutoff)
    }
}

pub struct TaskRegistry {
    records: RwLock<HashMap<TaskId, Slot>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    retention: RetentionPolicy,
}

impl TaskRegistry {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>, retention: RetentionPolicy) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
            ids,
            retention,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert a new Pending record and return its id.
    pub async fn create(&self, request: TaskRequest, max_retries: u32) -> TaskId {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let id = loop {
            let id = self.ids.generate_task_id();
            if !records.contains_key(&id) {
                break id;
            }
        };
        let record = TaskRecord::new(id, request, max_retries, now);
        records.insert(id, Arc::new(Mutex::new(record)));
        id
    }

    async fn slot(&self, id: TaskId) -> Option<Slot> {
        self.records.read().await.get(&id).cloned()
    }

    /// Snapshot of one record.
    pub async fn get(&self, id: TaskId) -> Option<TaskRecord> {
        let slot = self.slot(id).await?;
        let record = slot.lock().await;
        Some(record.clone())
    }

    /// Apply `mutation` to the record under its own lock.
    ///
    /// The closure receives the registry's current time so every mutation can
    /// refresh `updated_at` consistently.
    pub async fn update<R>(
        &self,
        id: TaskId,
        mutation: impl FnOnce(&mut TaskRecord, DateTime<Utc>) -> R,
    ) -> Result<R, RecordError> {
        let slot = self.slot(id).await.ok_or(RecordError::NotFound(id))?;
        let mut record = slot.lock().await;
        let now = self.clock.now();
        Ok(mutation(&mut record, now))
    }

    /// Records matching `filter`, most recent first.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<TaskRecord> {
        let slots: Vec<Slot> = self.records.read().await.values().cloned().collect();

        let mut matched = Vec::new();
        for slot in slots {
            let record = slot.lock().await;
            if filter.matches(&record) {
                matched.push(record.clone());
            }
        }

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Counts per status, optionally restricted to records created after `created_after`.
    pub async fn counts(&self, created_after: Option<DateTime<Utc>>) -> StatusCounts {
        let slots: Vec<Slot> = self.records.read().await.values().cloned().collect();

        let mut counts = StatusCounts::default();
        for slot in slots {
            let record = slot.lock().await;
            if created_after.is_none_or(|cutoff| record.created_at > cutoff) {
                counts.add(record.status);
            }
        }
        counts
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Drop a record that never reached the queue (submission rollback).
    pub(crate) async fn discard(&self, id: TaskId) {
        self.records.write().await.remove(&id);
    }

    /// Evict terminal records according to the retention policy.
    ///
    /// Records that are Pending, Processing or Retrying are never evicted.
    /// Records whose lock is currently held are skipped until the next sweep.
    pub async fn evict(&self) -> usize {
        if self.retention.is_unbounded() {
            return 0;
        }
        let now = self.clock.now();
        let mut records = self.records.write().await;

        let mut terminal: Vec<(TaskId, DateTime<Utc>)> = records
            .iter()
            .filter_map(|(id, slot)| {
                let record = slot.try_lock().ok()?;
                record
                    .status
                    .is_terminal()
                    .then(|| (*id, record.completed_at.unwrap_or(record.updated_at)))
            })
            .collect();

        let victims = self.retention.select_victims(&mut terminal, now);
        for id in &victims {
            records.remove(id);
        }
        victims.len()
    }
}
