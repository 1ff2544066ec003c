//! Task trait - 型付き payload と TaskKind の対応付け
//!
//! # Trait Bounds
//! - `Serialize` / `DeserializeOwned`: 未型付け JSON からの decode のため
//! - `Send + Sync + 'static`: Arc に格納して worker 間で共有するため

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{TaskKind, TaskRequest};

/// Task は payload 型と [`TaskKind`] を 1:1 で対応付ける
///
/// 実装は `domain::payload` にある 5 種類の payload 型のみです
/// （TaskRequest が閉じた enum なので、外部から種類は増やせません）。
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: TaskKind;

    /// Wrap into the tagged union stored on the task record.
    fn into_request(self) -> TaskRequest;

    /// Borrow the payload back out if `request` is of this kind.
    fn from_request(request: &TaskRequest) -> Option<&Self>;
}
