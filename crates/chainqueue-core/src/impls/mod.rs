//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryDeliveryQueue**: プロセス内の配送キュー

pub mod inmem_delivery;

pub use self::inmem_delivery::InMemoryDeliveryQueue;
