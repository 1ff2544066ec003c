//! App - アプリケーション層
//!
//! ports と registry を組み合わせてエンジンを動かします。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 構築とワイヤリング、起動時検証
//! - **Engine**: submit / status / metrics / shutdown の入口
//! - **WorkerPool**: タスク実行ループ（pop→claim→handle→record）
//! - **RetryScheduler**: バックオフ後の再投入
//! - **RetentionSweeper**: 終了済みレコードの回収

pub mod builder;
pub mod gc_loop;
pub mod retry;
pub mod runtime;
pub mod status;
pub mod worker_loop;

pub use self::builder::{AppBuilder, BuildError};
pub use self::gc_loop::RetentionSweeper;
pub use self::retry::{RetryPolicy, RetryScheduler};
pub use self::runtime::Engine;
pub use self::status::{QueueMetrics, RecentPerformance, RecentQuery, SubmitReceipt, TaskView};
pub use self::worker_loop::WorkerPool;
