//! Retention policy for terminal records.

use chrono::{DateTime, Duration, Utc};

use crate::domain::TaskId;

/// Bounds on how long finished tasks stay queryable.
///
/// Both limits are optional; with neither set the registry grows without bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Evict terminal records that finished longer ago than this.
    pub max_age: Option<Duration>,
    /// Keep at most this many terminal records (newest win).
    pub max_terminal_records: Option<usize>,
}

impl RetentionPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_age.is_none() && self.max_terminal_records.is_none()
    }

    /// Pick which terminal records to drop.
    ///
    /// `terminal` holds `(id, finished_at)` pairs and is reordered in place.
    pub(crate) fn select_victims(
        &self,
        terminal: &mut [(TaskId, DateTime<Utc>)],
        now: DateTime<Utc>,
    ) -> Vec<TaskId> {
        // newest first
        terminal.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        terminal
            .iter()
            .enumerate()
            .filter(|(rank, (_, finished_at))| {
                let too_old = self.max_age.is_some_and(|max_age| now - *finished_at > max_age);
                let over_cap = self.max_terminal_records.is_some_and(|cap| *rank >= cap);
                too_old || over_cap
            })
            .map(|(_, (id, _))| *id)
            .collect()
    }
}
