//! # Entity Lifecycle Dispatcher
//!
//! Fans each lifecycle event out to the registered handlers that want it.
//!
//! ```text
//! dispatch(event)
//!   └── registry.list()  →  filter by entity type  →  for each handler, in priority order:
//!         ├── sync:  run inline on the original payload (failures contained)
//!         └── async: snapshot payload → submit to AsyncExecutionPool
//! ```
//!
//! A dispatch returns once every sync handler has run and every async handler
//! has been submitted. Handler errors and panics are logged with the handler
//! name and event context and never abort the remaining handlers.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::snapshot::SnapshotIsolator;
use super::types::{LifecycleEvent, LifecycleEventKind};
use crate::config::{DispatcherConfig, SyncFailurePolicy};
use crate::error::{DispatchError, DispatchResult, HandlerError, HandlerResult, LifecycleResult};
use crate::execution::{AsyncExecutionPool, PoolStats, TaskHandle};
use crate::logging::log_dispatch_operation;
use crate::models::{ChangeDescription, Entity, EntityReference, SubjectContext};
use crate::registry::{
    EntityLifecycleHandler, HandlerRegistry, RegisteredHandler, RegistrationOutcome,
};

/// Where a handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sync,
    Async,
}

/// Result of one contained handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub handler_name: String,
    pub mode: ExecutionMode,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl HandlerOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Async handler accepted by the pool
#[derive(Debug)]
pub struct PendingAsyncHandler {
    pub handler_name: String,
    handle: TaskHandle<HandlerOutcome>,
}

/// What a single dispatch did
///
/// Callers may drop the receipt; async handlers keep running regardless.
#[derive(Debug)]
pub struct DispatchReceipt {
    pub event: LifecycleEventKind,
    pub entity_type: String,
    pub sync_outcomes: Vec<HandlerOutcome>,
    pub pending_async: Vec<PendingAsyncHandler>,
    /// Async handlers the pool refused (shut down or queue full)
    pub dropped_async: Vec<String>,
}

impl DispatchReceipt {
    fn new(event: LifecycleEventKind, entity_type: impl Into<String>) -> Self {
        Self {
            event,
            entity_type: entity_type.into(),
            sync_outcomes: Vec::new(),
            pending_async: Vec::new(),
            dropped_async: Vec::new(),
        }
    }

    /// True when no handler was invoked or submitted
    pub fn is_noop(&self) -> bool {
        self.sync_outcomes.is_empty() && self.pending_async.is_empty() && self.dropped_async.is_empty()
    }

    /// Names of the async handlers accepted by the pool, in submission order
    pub fn submitted_async(&self) -> Vec<&str> {
        self.pending_async
            .iter()
            .map(|pending| pending.handler_name.as_str())
            .collect()
    }

    /// Wait for every submitted async handler, in submission order
    pub async fn wait_for_async(self) -> Vec<HandlerOutcome> {
        let mut outcomes = Vec::with_capacity(self.pending_async.len());
        for pending in self.pending_async {
            let outcome = match pending.handle.wait().await {
                Some(outcome) => outcome,
                None => HandlerOutcome {
                    handler_name: pending.handler_name,
                    mode: ExecutionMode::Async,
                    error: Some("async task ended without reporting an outcome".to_string()),
                    elapsed: Duration::ZERO,
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// In-process lifecycle event dispatcher
///
/// Construct one at startup and share it as `Arc<EntityLifecycleDispatcher>`.
///
/// # Examples
///
/// ```rust
/// use entity_lifecycle::config::DispatcherConfig;
/// use entity_lifecycle::events::EntityLifecycleDispatcher;
/// use entity_lifecycle::models::{Entity, SubjectContext};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let dispatcher = EntityLifecycleDispatcher::new(DispatcherConfig::default()).unwrap();
///
///     let entity = Arc::new(Entity::new("table", "orders"));
///     let receipt = dispatcher
///         .on_entity_created(Some(entity), &SubjectContext::user("alice"))
///         .await
///         .unwrap();
///     assert!(receipt.is_noop());
///
///     dispatcher.shutdown();
/// }
/// ```
pub struct EntityLifecycleDispatcher {
    registry: Arc<HandlerRegistry>,
    pool: AsyncExecutionPool,
    isolator: SnapshotIsolator,
    sync_failure_policy: SyncFailurePolicy,
}

impl EntityLifecycleDispatcher {
    /// Create a dispatcher with an empty registry; requires a tokio runtime
    pub fn new(config: DispatcherConfig) -> LifecycleResult<Self> {
        Self::with_registry(Arc::new(HandlerRegistry::new()), config)
    }

    /// Create a dispatcher over an existing registry
    pub fn with_registry(
        registry: Arc<HandlerRegistry>,
        config: DispatcherConfig,
    ) -> LifecycleResult<Self> {
        config.validate()?;

        let pool = AsyncExecutionPool::new(config.pool.clone());
        pool.start()?;

        info!(
            pool_id = %config.pool.pool_id,
            sync_failure_policy = ?config.sync_failure_policy,
            handlers = registry.count(),
            "Entity lifecycle dispatcher initialized"
        );

        Ok(Self {
            registry,
            pool,
            isolator: SnapshotIsolator::new(&config.snapshot),
            sync_failure_policy: config.sync_failure_policy,
        })
    }

    pub fn register_handler(&self, handler: Arc<dyn EntityLifecycleHandler>) -> RegistrationOutcome {
        self.registry.register(handler)
    }

    pub fn unregister_handler(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    /// Current ordered handler set
    pub fn handlers(&self) -> Arc<Vec<RegisteredHandler>> {
        self.registry.list()
    }

    pub fn handler_count(&self) -> usize {
        self.registry.count()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn snapshot_isolator(&self) -> &SnapshotIsolator {
        &self.isolator
    }

    /// Deliver `event` to every applicable handler
    ///
    /// Errors only under [`SyncFailurePolicy::Propagate`], at the first failing
    /// sync handler.
    pub async fn dispatch(
        &self,
        event: LifecycleEvent,
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        let kind = event.kind();
        let mut receipt = DispatchReceipt::new(kind, event.entity_type());

        if event.is_empty() {
            debug!(event = %kind, "Empty lifecycle event, nothing to dispatch");
            return Ok(receipt);
        }

        // Handlers registered after this point do not see this event
        let handlers = self.registry.list();
        let applicable: Vec<&RegisteredHandler> = handlers
            .iter()
            .filter(|registered| registered.descriptor.supports(event.entity_type()))
            .collect();

        log_dispatch_operation(
            kind.as_str(),
            event.entity_type(),
            &event.subject_id(),
            applicable.len(),
        );

        for registered in applicable {
            if registered.descriptor.is_async {
                self.submit_async(registered, &event, subject, &mut receipt)
                    .await;
                continue;
            }

            let outcome = run_contained(
                registered.handler.as_ref(),
                registered.name(),
                &event,
                subject,
                ExecutionMode::Sync,
            )
            .await;

            if let Some(reason) = &outcome.error {
                if self.sync_failure_policy == SyncFailurePolicy::Propagate {
                    return Err(DispatchError::SyncHandlerFailed {
                        handler: outcome.handler_name.clone(),
                        event: kind.to_string(),
                        entity_type: event.entity_type().to_string(),
                        reason: reason.clone(),
                    });
                }
            }
            receipt.sync_outcomes.push(outcome);
        }

        Ok(receipt)
    }

    async fn submit_async(
        &self,
        registered: &RegisteredHandler,
        event: &LifecycleEvent,
        subject: &SubjectContext,
        receipt: &mut DispatchReceipt,
    ) {
        let handler_name = registered.name().to_string();
        let isolated = self.isolator.isolate(event, &handler_name);
        let handler = Arc::clone(&registered.handler);
        let subject = subject.clone();
        let task_name = handler_name.clone();

        let submitted = self
            .pool
            .submit(async move {
                run_contained(
                    handler.as_ref(),
                    &task_name,
                    &isolated,
                    &subject,
                    ExecutionMode::Async,
                )
                .await
            })
            .await;

        match submitted {
            Ok(handle) => {
                debug!(
                    handler_name = %handler_name,
                    event = %event.kind(),
                    entity_type = %event.entity_type(),
                    "Async handler submitted"
                );
                receipt.pending_async.push(PendingAsyncHandler {
                    handler_name,
                    handle,
                });
            }
            Err(e) => {
                warn!(
                    handler_name = %handler_name,
                    event = %event.kind(),
                    entity_type = %event.entity_type(),
                    entity_id = %event.subject_id(),
                    error = %e,
                    "Async handler dropped"
                );
                receipt.dropped_async.push(handler_name);
            }
        }
    }

    pub async fn on_entity_created(
        &self,
        entity: Option<Arc<Entity>>,
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        match entity {
            Some(entity) => self.dispatch(LifecycleEvent::created(entity), subject).await,
            None => Ok(Self::skipped(LifecycleEventKind::EntityCreated)),
        }
    }

    /// One notification for the whole batch; empty slices are ignored
    pub async fn on_entities_created(
        &self,
        entities: &[Arc<Entity>],
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        if entities.is_empty() {
            return Ok(Self::skipped(LifecycleEventKind::EntitiesCreated));
        }
        self.dispatch(LifecycleEvent::bulk_created(entities.to_vec()), subject)
            .await
    }

    pub async fn on_entity_updated(
        &self,
        entity: Option<Arc<Entity>>,
        change: Option<Arc<ChangeDescription>>,
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        match entity {
            Some(entity) => {
                self.dispatch(LifecycleEvent::updated(entity, change), subject)
                    .await
            }
            None => Ok(Self::skipped(LifecycleEventKind::EntityUpdated)),
        }
    }

    pub async fn on_entity_reference_updated(
        &self,
        reference: Option<Arc<EntityReference>>,
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        match reference {
            Some(reference) => {
                self.dispatch(LifecycleEvent::reference_updated(reference), subject)
                    .await
            }
            None => Ok(Self::skipped(LifecycleEventKind::EntityReferenceUpdated)),
        }
    }

    pub async fn on_entity_deleted(
        &self,
        entity: Option<Arc<Entity>>,
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        match entity {
            Some(entity) => self.dispatch(LifecycleEvent::deleted(entity), subject).await,
            None => Ok(Self::skipped(LifecycleEventKind::EntityDeleted)),
        }
    }

    pub async fn on_entity_soft_deleted_or_restored(
        &self,
        entity: Option<Arc<Entity>>,
        deleted: bool,
        subject: &SubjectContext,
    ) -> DispatchResult<DispatchReceipt> {
        match entity {
            Some(entity) => {
                self.dispatch(
                    LifecycleEvent::soft_deleted_or_restored(entity, deleted),
                    subject,
                )
                .await
            }
            None => Ok(Self::skipped(LifecycleEventKind::EntitySoftDeletedOrRestored)),
        }
    }

    /// Stop accepting async work; already submitted handlers still run
    pub fn shutdown(&self) {
        info!(pool_id = %self.pool.pool_id(), "Shutting down entity lifecycle dispatcher");
        self.pool.shutdown();
    }

    /// Wait for submitted async handlers after [`shutdown`](Self::shutdown)
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        self.pool.await_termination(timeout).await
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn skipped(kind: LifecycleEventKind) -> DispatchReceipt {
        debug!(event = %kind, "No entity supplied, nothing to dispatch");
        DispatchReceipt::new(kind, "")
    }
}

impl std::fmt::Debug for EntityLifecycleDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityLifecycleDispatcher")
            .field("registry", &self.registry)
            .field("pool", &self.pool)
            .field("sync_failure_policy", &self.sync_failure_policy)
            .finish()
    }
}

/// Route `event` to the matching handler callback
fn invoke<'a>(
    handler: &'a dyn EntityLifecycleHandler,
    event: &'a LifecycleEvent,
    subject: &'a SubjectContext,
) -> BoxFuture<'a, HandlerResult> {
    match event {
        LifecycleEvent::EntityCreated { entity } => handler.on_entity_created(entity, subject),
        LifecycleEvent::EntitiesCreated { entities, .. } => {
            handler.on_entities_created(entities, subject)
        }
        LifecycleEvent::EntityUpdated { entity, change } => {
            handler.on_entity_updated(entity, change.as_deref(), subject)
        }
        LifecycleEvent::EntityReferenceUpdated { reference } => {
            handler.on_entity_reference_updated(reference, subject)
        }
        LifecycleEvent::EntityDeleted { entity } => handler.on_entity_deleted(entity, subject),
        LifecycleEvent::EntitySoftDeletedOrRestored { entity, deleted } => {
            handler.on_entity_soft_deleted_or_restored(entity, *deleted, subject)
        }
    }
}

/// Invoke one handler, turning errors and panics into a logged outcome
async fn run_contained(
    handler: &dyn EntityLifecycleHandler,
    handler_name: &str,
    event: &LifecycleEvent,
    subject: &SubjectContext,
    mode: ExecutionMode,
) -> HandlerOutcome {
    let started = Instant::now();
    let result = AssertUnwindSafe(async { invoke(handler, event, subject).await })
        .catch_unwind()
        .await;
    let elapsed = started.elapsed();

    let error = match result {
        Ok(Ok(())) => {
            debug!(
                handler_name = %handler_name,
                mode = ?mode,
                event = %event.kind(),
                entity_type = %event.entity_type(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Handler completed"
            );
            None
        }
        Ok(Err(handler_error)) => {
            error!(
                handler_name = %handler_name,
                mode = ?mode,
                event = %event.kind(),
                entity_type = %event.entity_type(),
                entity_id = %event.subject_id(),
                error = %handler_error,
                "Handler returned error"
            );
            Some(handler_error.to_string())
        }
        Err(panic_error) => {
            let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_error.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };

            error!(
                handler_name = %handler_name,
                mode = ?mode,
                event = %event.kind(),
                entity_type = %event.entity_type(),
                entity_id = %event.subject_id(),
                panic_msg = %panic_msg,
                "Handler panicked"
            );
            Some(HandlerError::Panicked(panic_msg).to_string())
        }
    };

    HandlerOutcome {
        handler_name: handler_name.to_string(),
        mode,
        error,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Records every callback it receives
    struct Recorder {
        name: String,
        priority: i32,
        is_async: bool,
        types: HashSet<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &str, priority: i32, calls: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                priority,
                is_async: false,
                types: HashSet::new(),
                calls: Arc::clone(calls),
            }
        }
    }

    #[async_trait]
    impl EntityLifecycleHandler for Recorder {
        fn handler_name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_async(&self) -> bool {
            self.is_async
        }

        fn supported_entity_types(&self) -> HashSet<String> {
            self.types.clone()
        }

        async fn on_entity_created(
            &self,
            entity: &Arc<Entity>,
            _subject: &SubjectContext,
        ) -> HandlerResult {
            self.calls
                .lock()
                .push(format!("{}:created:{}", self.name, entity.name));
            Ok(())
        }

        async fn on_entity_soft_deleted_or_restored(
            &self,
            _entity: &Arc<Entity>,
            deleted: bool,
            _subject: &SubjectContext,
        ) -> HandlerResult {
            self.calls
                .lock()
                .push(format!("{}:soft_deleted:{deleted}", self.name));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EntityLifecycleHandler for Failing {
        fn handler_name(&self) -> &str {
            "Failing"
        }

        fn priority(&self) -> i32 {
            1
        }

        async fn on_entity_created(
            &self,
            _entity: &Arc<Entity>,
            _subject: &SubjectContext,
        ) -> HandlerResult {
            Err(HandlerError::execution_failed("boom"))
        }
    }

    fn dispatcher() -> EntityLifecycleDispatcher {
        EntityLifecycleDispatcher::new(DispatcherConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sync_handlers_run_in_priority_order() {
        let dispatcher = dispatcher();
        let calls = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_handler(Arc::new(Recorder::new("c", 30, &calls)));
        dispatcher.register_handler(Arc::new(Recorder::new("a", 10, &calls)));
        dispatcher.register_handler(Arc::new(Recorder::new("b", 20, &calls)));

        let entity = Arc::new(Entity::new("table", "orders"));
        let receipt = dispatcher
            .on_entity_created(Some(entity), &SubjectContext::system())
            .await
            .unwrap();

        assert_eq!(receipt.sync_outcomes.len(), 3);
        assert_eq!(
            *calls.lock(),
            vec!["a:created:orders", "b:created:orders", "c:created:orders"]
        );
    }

    #[tokio::test]
    async fn test_failure_is_contained_by_default() {
        let dispatcher = dispatcher();
        let calls = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_handler(Arc::new(Failing));
        dispatcher.register_handler(Arc::new(Recorder::new("after", 2, &calls)));

        let receipt = dispatcher
            .on_entity_created(
                Some(Arc::new(Entity::new("table", "orders"))),
                &SubjectContext::system(),
            )
            .await
            .unwrap();

        assert!(!receipt.sync_outcomes[0].succeeded());
        assert_eq!(
            receipt.sync_outcomes[0].error.as_deref(),
            Some("Handler execution failed: boom")
        );
        assert!(receipt.sync_outcomes[1].succeeded());
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_propagate_policy_stops_at_first_failure() {
        let config = DispatcherConfig {
            sync_failure_policy: SyncFailurePolicy::Propagate,
            ..Default::default()
        };
        let dispatcher = EntityLifecycleDispatcher::new(config).unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_handler(Arc::new(Failing));
        dispatcher.register_handler(Arc::new(Recorder::new("after", 2, &calls)));

        let err = dispatcher
            .on_entity_created(
                Some(Arc::new(Entity::new("table", "orders"))),
                &SubjectContext::system(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::SyncHandlerFailed {
                handler: "Failing".to_string(),
                event: "entity_created".to_string(),
                entity_type: "table".to_string(),
                reason: "Handler execution failed: boom".to_string(),
            }
        );
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_flag_is_forwarded() {
        let dispatcher = dispatcher();
        let calls = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_handler(Arc::new(Recorder::new("r", 1, &calls)));

        let entity = Arc::new(Entity::new("table", "orders"));
        dispatcher
            .on_entity_soft_deleted_or_restored(Some(entity), false, &SubjectContext::system())
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["r:soft_deleted:false"]);
    }

    #[tokio::test]
    async fn test_missing_entity_is_a_noop() {
        let dispatcher = dispatcher();
        let calls = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_handler(Arc::new(Recorder::new("r", 1, &calls)));

        let receipt = dispatcher
            .on_entity_deleted(None, &SubjectContext::system())
            .await
            .unwrap();
        assert!(receipt.is_noop());

        let receipt = dispatcher
            .on_entities_created(&[], &SubjectContext::system())
            .await
            .unwrap();
        assert!(receipt.is_noop());
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_async_handler_is_submitted_and_completes() {
        let dispatcher = dispatcher();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = Recorder::new("async", 1, &calls);
        recorder.is_async = true;
        dispatcher.register_handler(Arc::new(recorder));

        let receipt = dispatcher
            .on_entity_created(
                Some(Arc::new(Entity::new("table", "orders"))),
                &SubjectContext::system(),
            )
            .await
            .unwrap();

        assert!(receipt.sync_outcomes.is_empty());
        assert_eq!(receipt.submitted_async(), vec!["async"]);

        let outcomes = receipt.wait_for_async().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].mode, ExecutionMode::Async);
        assert!(outcomes[0].succeeded());
        assert_eq!(*calls.lock(), vec!["async:created:orders"]);
        assert_eq!(dispatcher.snapshot_isolator().snapshots_taken(), 1);
    }

    #[tokio::test]
    async fn test_type_filter_preserves_order() {
        let dispatcher = dispatcher();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut tables_only = Recorder::new("tables", 1, &calls);
        tables_only.types = HashSet::from(["table".to_string()]);
        dispatcher.register_handler(Arc::new(tables_only));
        dispatcher.register_handler(Arc::new(Recorder::new("all", 2, &calls)));

        dispatcher
            .on_entity_created(
                Some(Arc::new(Entity::new("dashboard", "revenue"))),
                &SubjectContext::system(),
            )
            .await
            .unwrap();
        dispatcher
            .on_entity_created(
                Some(Arc::new(Entity::new("table", "orders"))),
                &SubjectContext::system(),
            )
            .await
            .unwrap();

        assert_eq!(
            *calls.lock(),
            vec![
                "all:created:revenue",
                "tables:created:orders",
                "all:created:orders"
            ]
        );
    }
}
