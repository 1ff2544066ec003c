use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

/// Number of registry records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Processing => self.processing += 1,
            TaskStatus::Retrying => self.retrying += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn non_terminal(&self) -> usize {
        self.pending + self.processing + self.retrying
    }

    pub fn total(&self) -> usize {
        self.non_terminal() + self.completed + self.failed
    }

    /// completed / (completed + failed) as a percentage with two decimals.
    ///
    /// `None` when no task has reached a terminal state.
    pub fn success_rate_percent(&self) -> Option<f64> {
        let finished = self.completed + self.failed;
        if finished == 0 {
            return None;
        }
        let rate = self.completed as f64 / finished as f64 * 100.0;
        Some((rate * 100.0).round() / 100.0)
    }
}

impl FromIterator<TaskStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}
