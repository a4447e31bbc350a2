//! Test handlers shared by the integration tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use entity_lifecycle::error::{HandlerError, HandlerResult};
use entity_lifecycle::models::{ChangeDescription, Entity, EntityReference, SubjectContext};
use entity_lifecycle::registry::EntityLifecycleHandler;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

/// One recorded callback
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub handler: String,
    pub callback: &'static str,
    pub entity_names: Vec<String>,
}

/// Invocation log shared between handlers so cross-handler order is visible
#[derive(Debug, Clone, Default)]
pub struct InvocationLog(Arc<Mutex<Vec<Invocation>>>);

impl InvocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, handler: &str, callback: &'static str, entity_names: Vec<String>) {
        self.0.lock().push(Invocation {
            handler: handler.to_string(),
            callback,
            entity_names,
        });
    }

    pub fn all(&self) -> Vec<Invocation> {
        self.0.lock().clone()
    }

    pub fn handlers(&self) -> Vec<String> {
        self.0.lock().iter().map(|i| i.handler.clone()).collect()
    }

    pub fn count_for(&self, handler: &str) -> usize {
        self.0.lock().iter().filter(|i| i.handler == handler).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Records every callback into an [`InvocationLog`]
pub struct RecordingHandler {
    name: String,
    priority: i32,
    is_async: bool,
    entity_types: HashSet<String>,
    log: InvocationLog,
}

impl RecordingHandler {
    pub fn new(name: &str, priority: i32, log: &InvocationLog) -> Self {
        Self {
            name: name.to_string(),
            priority,
            is_async: false,
            entity_types: HashSet::new(),
            log: log.clone(),
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn for_types(mut self, types: &[&str]) -> Self {
        self.entity_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl EntityLifecycleHandler for RecordingHandler {
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
        self.entity_types.clone()
    }

    async fn on_entity_created(
        &self,
        entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.log
            .push(&self.name, "created", vec![entity.name.clone()]);
        Ok(())
    }

    async fn on_entities_created(
        &self,
        entities: &[Arc<Entity>],
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.log.push(
            &self.name,
            "bulk_created",
            entities.iter().map(|e| e.name.clone()).collect(),
        );
        Ok(())
    }

    async fn on_entity_updated(
        &self,
        entity: &Arc<Entity>,
        _change: Option<&ChangeDescription>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.log
            .push(&self.name, "updated", vec![entity.name.clone()]);
        Ok(())
    }

    async fn on_entity_reference_updated(
        &self,
        reference: &EntityReference,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.log.push(
            &self.name,
            "reference_updated",
            reference.name.clone().into_iter().collect(),
        );
        Ok(())
    }

    async fn on_entity_deleted(
        &self,
        entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.log
            .push(&self.name, "deleted", vec![entity.name.clone()]);
        Ok(())
    }

    async fn on_entity_soft_deleted_or_restored(
        &self,
        entity: &Arc<Entity>,
        deleted: bool,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        let callback = if deleted { "soft_deleted" } else { "restored" };
        self.log.push(&self.name, callback, vec![entity.name.clone()]);
        Ok(())
    }
}

/// Returns an error from every create callback
pub struct FailingHandler {
    name: String,
    priority: i32,
    is_async: bool,
}

impl FailingHandler {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            is_async: false,
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}

#[async_trait]
impl EntityLifecycleHandler for FailingHandler {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_async(&self) -> bool {
        self.is_async
    }

    async fn on_entity_created(
        &self,
        _entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        Err(HandlerError::execution_failed("simulated failure"))
    }
}

/// Panics from every create callback
pub struct PanickingHandler {
    name: String,
    priority: i32,
    is_async: bool,
}

impl PanickingHandler {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            is_async: false,
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}

#[async_trait]
impl EntityLifecycleHandler for PanickingHandler {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_async(&self) -> bool {
        self.is_async
    }

    async fn on_entity_created(
        &self,
        _entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        panic!("simulated panic in {}", self.name);
    }
}

/// Async handler that waits for a gate before reading field `x`
///
/// Lets a test mutate the caller's entity after dispatch returns but before
/// the handler reads it.
pub struct GatedHandler {
    name: String,
    gate: Arc<Notify>,
    observed: Arc<Mutex<Vec<Option<Value>>>>,
}

impl GatedHandler {
    pub fn new(name: &str, gate: &Arc<Notify>) -> Self {
        Self {
            name: name.to_string(),
            gate: Arc::clone(gate),
            observed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn observed(&self) -> Vec<Option<Value>> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl EntityLifecycleHandler for GatedHandler {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn on_entity_created(
        &self,
        entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.gate.notified().await;
        self.observed.lock().push(entity.field("x").cloned());
        Ok(())
    }
}
