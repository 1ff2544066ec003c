//! chainqueue-core
//!
//! Asynchronous execution engine for blockchain operations
//! (market creation, bets, answers, resolutions).
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, kind, payload, state, record, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, DeliveryQueue）
//! - **impls**: ports の実装（InMemoryDeliveryQueue）
//! - **registry**: タスクレコードの正本と retention
//! - **typed**: 型付き Task API（Task trait, Handler trait, TypedRegistry）
//! - **app**: builder, engine, worker pool, retry scheduler, retention sweeper
//! - **config**: EngineConfig（TOML + 環境変数）
//! - **error**: 呼び出し側に返すエラー
//! - **observability**: status ごとの集計

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod registry;
pub mod typed;

pub use app::{AppBuilder, BuildError, Engine, QueueMetrics, RecentQuery, SubmitReceipt, TaskView};
pub use config::{ConfigError, EngineConfig};
pub use domain::{OperationError, TaskId, TaskKind, TaskRequest, TaskStatus};
pub use error::{StatusError, SubmitError};
pub use typed::{Handler, Task, TaskContext};
