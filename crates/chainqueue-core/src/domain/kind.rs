//! TaskKind - 固定された操作種別の列挙

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The closed set of on-chain operations the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CreateMarket,
    PlaceBet,
    SubmitAnswer,
    ResearchAndSubmit,
    FinalizeResolution,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::CreateMarket,
        TaskKind::PlaceBet,
        TaskKind::SubmitAnswer,
        TaskKind::ResearchAndSubmit,
        TaskKind::FinalizeResolution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::CreateMarket => "create_market",
            TaskKind::PlaceBet => "place_bet",
            TaskKind::SubmitAnswer => "submit_answer",
            TaskKind::ResearchAndSubmit => "research_and_submit",
            TaskKind::FinalizeResolution => "finalize_resolution",
        }
    }

    /// Retry ceiling used when the submitter does not override it.
    pub fn default_max_retries(self) -> u32 {
        match self {
            TaskKind::CreateMarket | TaskKind::PlaceBet | TaskKind::SubmitAnswer => 3,
            TaskKind::ResearchAndSubmit | TaskKind::FinalizeResolution => 2,
        }
    }

    /// Human-readable estimate returned in submission receipts.
    pub fn estimated_completion(self) -> &'static str {
        match self {
            TaskKind::CreateMarket => "2-5 minutes",
            TaskKind::PlaceBet => "1-3 minutes",
            TaskKind::SubmitAnswer | TaskKind::FinalizeResolution => "1-2 minutes",
            TaskKind::ResearchAndSubmit => "3-5 minutes",
        }
    }

    /// Typical duration of one attempt; drives `estimated_progress`.
    pub fn expected_duration(self) -> Duration {
        match self {
            TaskKind::CreateMarket => Duration::from_secs(180),
            TaskKind::PlaceBet => Duration::from_secs(120),
            _ => Duration::from_secs(90),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type '{0}'")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    /// Accepts the snake_case wire name as well as the kebab-case spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}
