//! Errors - 外部操作のエラー型と分類
//!
//! ErrorKind は記録のための分類です。リトライ判定には使いません
//! （すべての失敗を max_retries まで一律にリトライする）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（RPC タイムアウト、ネットワーク断など）
/// - Permanent: 恒久的なエラー（不正な payload、チェーン側の revert など）
/// - Infrastructure: 実行基盤の障害（handler の panic など）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// OperationError is what a handler returns when its single attempt fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} operation error: {message}")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }
}

/// Failure description stored on a task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
    /// 1-indexed attempt that produced this error.
    pub attempt: u32,
    pub occurred_at: DateTime<Utc>,
}

impl TaskError {
    pub fn from_operation(err: &OperationError, attempt: u32, now: DateTime<Utc>) -> Self {
        Self {
            kind: err.kind,
            message: err.message.clone(),
            attempt,
            occurred_at: now,
        }
    }
}
