//! Ports - 抽象化レイヤー
//!
//! 各 trait はエンジンが依存する外部要素（時刻、ID 採番、配送キュー）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod delivery_queue;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery_queue::{DeliveryQueue, QueueError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
