//! TypedRegistry - TaskKind ごとの Handler テーブル（Operation Dispatcher）
//!
//! - `register::<T: Task>(handler)` で登録、内部で TypedHandler にラップ
//! - `HashMap<TaskKind, Arc<dyn DynHandler>>` で管理（文字列キーは使わない）
//! - 起動時に構築し、実行時は不変（ロック不要）

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TaskContext, TypedHandler};
use super::task::Task;
use crate::domain::{OperationError, TaskKind, TaskRequest};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskKind),
}

#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<TaskKind, Arc<dyn DynHandler>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&T::KIND) {
            return Err(RegistryError::AlreadyRegistered(T::KIND));
        }
        self.handlers
            .insert(T::KIND, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn contains(&self, kind: TaskKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn registered_kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<TaskKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Run a single attempt of `request` on its handler.
    pub async fn dispatch(
        &self,
        request: &TaskRequest,
        ctx: &TaskContext,
    ) -> Result<serde_json::Value, OperationError> {
        let kind = request.kind();
        let handler = self.get(kind).ok_or_else(|| {
            OperationError::permanent(format!("no handler registered for task_type={kind}"))
        })?;
        handler.handle_dyn(request, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateMarket, FinalizeResolution, PrivateKey, TaskId};
    use crate::typed::handler::fixtures::{AlwaysFailFinalize, FlakyCreateMarket};
    use ulid::Ulid;

    fn ctx() -> TaskContext {
        TaskContext::detached(TaskId::from_ulid(Ulid::new()), 1)
    }

    #[test]
    fn register_and_get() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<CreateMarket, _>(FlakyCreateMarket::new(0))
            .unwrap();
        assert!(registry.get(TaskKind::CreateMarket).is_some());
        assert!(registry.contains(TaskKind::CreateMarket));
        assert!(!registry.contains(TaskKind::PlaceBet));
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<CreateMarket, _>(FlakyCreateMarket::new(0))
            .unwrap();
        let result = registry.register::<CreateMarket, _>(FlakyCreateMarket::new(1));
        assert!(matches!(
            result,
            Err(RegistryError::AlreadyRegistered(TaskKind::CreateMarket))
        ));
    }

    #[test]
    fn registered_kinds_are_sorted() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<FinalizeResolution, _>(AlwaysFailFinalize)
            .unwrap();
        registry
            .register::<CreateMarket, _>(FlakyCreateMarket::new(0))
            .unwrap();
        assert_eq!(
            registry.registered_kinds(),
            vec![TaskKind::CreateMarket, TaskKind::FinalizeResolution]
        );
    }

    #[tokio::test]
    async fn dispatch_routes_by_kind() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<FinalizeResolution, _>(AlwaysFailFinalize)
            .unwrap();

        let request = FinalizeResolution {
            market_id: "0x1".into(),
            from_private_key: PrivateKey::new("k"),
            safe_address: None,
        }
        .into_request();
        let err = registry.dispatch(&request, &ctx()).await.unwrap_err();
        assert_eq!(err.message, "market not closed yet");
    }

    #[tokio::test]
    async fn dispatch_without_handler_is_an_operation_error() {
        let registry = TypedRegistry::new();
        let request = CreateMarket {
            application_id: "app".into(),
            application_details: serde_json::Value::Null,
        }
        .into_request();
        let err = registry.dispatch(&request, &ctx()).await.unwrap_err();
        assert!(err.message.contains("create_market"));
    }
}
