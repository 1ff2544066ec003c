//! Typed - 型付き Task API
//!
//! payload 型と TaskKind の対応付けを静的に保証し、
//! Handler を TaskKind キーのテーブルで引きます。
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, Handler, TaskContext};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
