//! AppBuilder - Engine の構築とワイヤリング
//!
//! - handler 登録（kind ごとに 1 つ）
//! - expect_tasks による起動時検証（Fail-fast）
//! - build() で registry / queue / retry scheduler / workers を組み立てて起動

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use super::gc_loop::RetentionSweeper;
use super::retry::RetryScheduler;
use super::runtime::{Background, Engine};
use super::worker_loop::{WorkerDeps, WorkerPool};
use crate::config::{ConfigError, EngineConfig};
use crate::domain::TaskKind;
use crate::impls::InMemoryDeliveryQueue;
use crate::ports::{Clock, DeliveryQueue, IdGenerator, SystemClock, UlidGenerator};
use crate::registry::TaskRegistry;
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

/// Builds and starts an [`Engine`].
///
/// # 使用例
/// ```ignore
/// let engine = AppBuilder::new()
///     .config(EngineConfig::from_env()?)
///     .register::<PlaceBet, _>(PlaceBetHandler::new(client))?
///     .expect_tasks(&[TaskKind::PlaceBet])
///     .build()?;
/// ```
pub struct AppBuilder {
    handlers: TypedRegistry,
    expected_tasks: Option<Vec<TaskKind>>,
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    queue: Option<Arc<dyn DeliveryQueue>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<TaskKind>),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            handlers: TypedRegistry::new(),
            expected_tasks: None,
            config: EngineConfig::default(),
            clock: None,
            ids: None,
            queue: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn delivery_queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.handlers.register::<T, H>(handler)?;
        Ok(self)
    }

    /// Kinds that must have a handler; checked by [`AppBuilder::build`].
    pub fn expect_tasks(mut self, kinds: &[TaskKind]) -> Self {
        self.expected_tasks = Some(kinds.to_vec());
        self
    }

    /// Validate the setup and start the workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Engine, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_tasks {
            let missing: Vec<TaskKind> = expected
                .iter()
                .copied()
                .filter(|kind| !self.handlers.contains(*kind))
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let queue: Arc<dyn DeliveryQueue> = match self.queue {
            Some(queue) => queue,
            None => Arc::new(InMemoryDeliveryQueue::new()),
        };
        let registry = Arc::new(TaskRegistry::new(
            clock,
            ids,
            self.config.retention.policy(),
        ));
        let handlers = Arc::new(self.handlers);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let retry = Arc::new(RetryScheduler::new(
            self.config.retry.policy(),
            Arc::clone(&queue),
            shutdown_rx.clone(),
        ));

        let workers = WorkerPool::spawn(
            self.config.pool_size,
            WorkerDeps {
                registry: Arc::clone(&registry),
                queue: Arc::clone(&queue),
                handlers: Arc::clone(&handlers),
                retry: Arc::clone(&retry),
            },
            shutdown_rx.clone(),
        );

        let retention = self.config.retention.policy();
        let sweeper = (!retention.is_unbounded()).then(|| {
            RetentionSweeper::new(Arc::clone(&registry), self.config.retention.sweep_interval())
                .spawn(shutdown_rx)
        });

        tracing::info!(
            pool_size = self.config.pool_size,
            kinds = ?handlers.registered_kinds(),
            "engine started"
        );

        Ok(Engine {
            config: self.config,
            registry,
            queue,
            handlers,
            retry,
            background: Mutex::new(Some(Background { workers, sweeper })),
            shutdown_tx,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
