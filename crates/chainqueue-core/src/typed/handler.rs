//! Handler trait - 外部操作（チェーン上のトランザクション）を 1 回実行する
//!
//! - 表層（Typed）: `Handler<T>` - payload 型ごとに型安全
//! - 内部（Dyn）: `DynHandler` - object-safe, `TypedRegistry` に格納するための型消去

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::task::Task;
use crate::domain::{OperationError, TaskId, TaskRequest};
use crate::registry::TaskRegistry;

/// Execution context handed to a handler for one attempt.
#[derive(Clone)]
pub struct TaskContext {
    task_id: TaskId,
    attempt: u32,
    registry: Option<Arc<TaskRegistry>>,
}

impl TaskContext {
    pub(crate) fn new(task_id: TaskId, attempt: u32, registry: Arc<TaskRegistry>) -> Self {
        Self {
            task_id,
            attempt,
            registry: Some(registry),
        }
    }

    /// A context whose progress reports go nowhere (handler unit tests).
    pub fn detached(task_id: TaskId, attempt: u32) -> Self {
        Self {
            task_id,
            attempt,
            registry: None,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// 1-indexed attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Publish a human-readable stage description on the task record.
    pub async fn report_progress(&self, progress: impl Into<String>) {
        let Some(registry) = &self.registry else {
            return;
        };
        let progress = progress.into();
        if let Err(e) = registry
            .update(self.task_id, |record, now| record.set_progress(progress, now))
            .await
        {
            tracing::debug!(task_id = %self.task_id, error = %e, "progress report dropped");
        }
    }
}

/// Handler は Task を 1 回だけ実行して結果を返す
///
/// リトライ・キューイング・状態管理は一切しない（それは worker の責務）。
///
/// # 使用例
/// ```ignore
/// struct PlaceBetHandler { client: OmenClient }
///
/// #[async_trait]
/// impl Handler<PlaceBet> for PlaceBetHandler {
///     async fn handle(&self, bet: &PlaceBet, ctx: &TaskContext) -> Result<Value, OperationError> {
///         let tx = self.client.place_bet(bet).await?;
///         ctx.report_progress("submitted to chain, waiting for confirmation").await;
///         Ok(json!({ "tx_hash": tx.wait().await? }))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: &T, ctx: &TaskContext) -> Result<serde_json::Value, OperationError>;
}

/// DynHandler は object-safe な Handler の抽象化
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(
        &self,
        request: &TaskRequest,
        ctx: &TaskContext,
    ) -> Result<serde_json::Value, OperationError>;

    fn kind(&self) -> crate::domain::TaskKind;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(
        &self,
        request: &TaskRequest,
        ctx: &TaskContext,
    ) -> Result<serde_json::Value, OperationError> {
        let task = T::from_request(request).ok_or_else(|| {
            OperationError::permanent(format!(
                "handler for {} received a {} payload",
                T::KIND,
                request.kind()
            ))
        })?;
        self.handler.handle(task, ctx).await
    }

    fn kind(&self) -> crate::domain::TaskKind {
        T::KIND
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Handlers shared by unit tests across the crate.

    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::domain::{CreateMarket, FinalizeResolution};

    /// Fails the first `failures` calls, then succeeds.
    pub struct FlakyCreateMarket {
        pub failures: u32,
        pub calls: AtomicU32,
    }

    impl FlakyCreateMarket {
        pub fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Handler<CreateMarket> for FlakyCreateMarket {
        async fn handle(
            &self,
            task: &CreateMarket,
            _ctx: &TaskContext,
        ) -> Result<serde_json::Value, OperationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(OperationError::transient(format!("rpc timeout (call {call})")));
            }
            Ok(serde_json::json!({ "market_id": format!("0xmarket-{}", task.application_id) }))
        }
    }

    pub struct AlwaysFailFinalize;

    #[async_trait]
    impl Handler<FinalizeResolution> for AlwaysFailFinalize {
        async fn handle(
            &self,
            _task: &FinalizeResolution,
            _ctx: &TaskContext,
        ) -> Result<serde_json::Value, OperationError> {
            Err(OperationError::permanent("market not closed yet"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::FlakyCreateMarket;
    use super::*;
    use crate::domain::{CreateMarket, ErrorKind, PlaceBet, PrivateKey, TaskKind};
    use ulid::Ulid;

    fn ctx() -> TaskContext {
        TaskContext::detached(TaskId::from_ulid(Ulid::new()), 1)
    }

    #[tokio::test]
    async fn typed_handler_dispatches_matching_payload() {
        let typed = TypedHandler::<CreateMarket, _>::new(FlakyCreateMarket::new(0));
        let request = CreateMarket {
            application_id: "app-7".into(),
            application_details: serde_json::json!({}),
        }
        .into_request();

        let result = typed.handle_dyn(&request, &ctx()).await.unwrap();
        assert_eq!(result["market_id"], "0xmarket-app-7");
        assert_eq!(typed.kind(), TaskKind::CreateMarket);
    }

    #[tokio::test]
    async fn typed_handler_rejects_other_payloads() {
        let typed = TypedHandler::<CreateMarket, _>::new(FlakyCreateMarket::new(0));
        let request = PlaceBet {
            market_id: "0x1".into(),
            amount_usd: 1.0,
            outcome: "Yes".into(),
            from_private_key: PrivateKey::new("k"),
            safe_address: None,
            auto_deposit: true,
        }
        .into_request();

        let err = typed.handle_dyn(&request, &ctx()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permanent);
        assert!(err.message.contains("place_bet"));
    }

    #[tokio::test]
    async fn detached_context_ignores_progress() {
        let ctx = ctx();
        ctx.report_progress("nothing listens").await;
        assert_eq!(ctx.attempt(), 1);
    }
}
