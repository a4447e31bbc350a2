//! # Entity Lifecycle Handler Contract
//!
//! Consumers implement [`EntityLifecycleHandler`] and register it with the
//! [`HandlerRegistry`](super::HandlerRegistry). Every callback defaults to a
//! no-op so a handler only overrides the transitions it cares about.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::system;
use crate::error::HandlerResult;
use crate::models::{ChangeDescription, Entity, EntityReference, SubjectContext};

/// Consumer of entity lifecycle events
///
/// Sync handlers (`is_async() == false`) run inline on the dispatching task
/// and receive the caller's original payload. Async handlers run on the
/// shared execution pool and receive an isolated snapshot.
///
/// Returning `Err` or panicking is logged by the dispatcher and never reaches
/// the component that triggered the dispatch.
#[async_trait]
pub trait EntityLifecycleHandler: Send + Sync + 'static {
    /// Stable, unique handler name
    fn handler_name(&self) -> &str;

    /// Lower values run earlier
    fn priority(&self) -> i32 {
        system::DEFAULT_HANDLER_PRIORITY
    }

    fn is_async(&self) -> bool {
        false
    }

    /// Entity types this handler wants; empty means all types
    fn supported_entity_types(&self) -> HashSet<String> {
        HashSet::new()
    }

    async fn on_entity_created(
        &self,
        _entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        Ok(())
    }

    /// Bulk create; delivers every entity of the batch in one call.
    ///
    /// The default forwards each entity to [`on_entity_created`] and stops at
    /// the first error.
    ///
    /// [`on_entity_created`]: EntityLifecycleHandler::on_entity_created
    async fn on_entities_created(
        &self,
        entities: &[Arc<Entity>],
        subject: &SubjectContext,
    ) -> HandlerResult {
        for entity in entities {
            self.on_entity_created(entity, subject).await?;
        }
        Ok(())
    }

    async fn on_entity_updated(
        &self,
        _entity: &Arc<Entity>,
        _change: Option<&ChangeDescription>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        Ok(())
    }

    /// Update notification carrying only a reference to the entity
    async fn on_entity_reference_updated(
        &self,
        _reference: &EntityReference,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_entity_deleted(
        &self,
        _entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_entity_soft_deleted_or_restored(
        &self,
        _entity: &Arc<Entity>,
        _deleted: bool,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        Ok(())
    }
}

/// Handler attributes captured once at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub name: String,
    pub priority: i32,
    pub is_async: bool,
    pub supported_entity_types: HashSet<String>,
}

impl HandlerDescriptor {
    pub fn from_handler(handler: &dyn EntityLifecycleHandler) -> Self {
        Self {
            name: handler.handler_name().to_string(),
            priority: handler.priority(),
            is_async: handler.is_async(),
            supported_entity_types: handler.supported_entity_types(),
        }
    }

    /// Whether events for `entity_type` should reach this handler
    pub fn supports(&self, entity_type: &str) -> bool {
        self.supported_entity_types.is_empty() || self.supported_entity_types.contains(entity_type)
    }
}

/// A live registry entry
#[derive(Clone)]
pub struct RegisteredHandler {
    pub descriptor: HandlerDescriptor,
    pub handler: Arc<dyn EntityLifecycleHandler>,
}

impl RegisteredHandler {
    pub fn new(handler: Arc<dyn EntityLifecycleHandler>) -> Self {
        Self {
            descriptor: HandlerDescriptor::from_handler(handler.as_ref()),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("descriptor", &self.descriptor)
            .field("handler", &"<Arc<dyn EntityLifecycleHandler>>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TypedHandler;

    impl EntityLifecycleHandler for TypedHandler {
        fn handler_name(&self) -> &str {
            "TypedHandler"
        }

        fn priority(&self) -> i32 {
            5
        }

        fn supported_entity_types(&self) -> HashSet<String> {
            HashSet::from(["table".to_string()])
        }
    }

    struct WildcardHandler;

    impl EntityLifecycleHandler for WildcardHandler {
        fn handler_name(&self) -> &str {
            "WildcardHandler"
        }
    }

    #[test]
    fn test_descriptor_captures_handler_attributes() {
        let descriptor = HandlerDescriptor::from_handler(&TypedHandler);
        assert_eq!(descriptor.name, "TypedHandler");
        assert_eq!(descriptor.priority, 5);
        assert!(!descriptor.is_async);
        assert!(descriptor.supports("table"));
        assert!(!descriptor.supports("dashboard"));
    }

    #[test]
    fn test_empty_type_set_supports_everything() {
        let descriptor = HandlerDescriptor::from_handler(&WildcardHandler);
        assert_eq!(descriptor.priority, system::DEFAULT_HANDLER_PRIORITY);
        assert!(descriptor.supports("table"));
        assert!(descriptor.supports("dashboard"));
    }

    #[tokio::test]
    async fn test_default_bulk_callback_forwards_each_entity() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingHandler(AtomicUsize);

        #[async_trait]
        impl EntityLifecycleHandler for CountingHandler {
            fn handler_name(&self) -> &str {
                "CountingHandler"
            }

            async fn on_entity_created(
                &self,
                _entity: &Arc<Entity>,
                _subject: &SubjectContext,
            ) -> HandlerResult {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = CountingHandler(AtomicUsize::new(0));
        let entities: Vec<Arc<Entity>> = (0..3)
            .map(|i| Arc::new(Entity::new("table", format!("t{i}"))))
            .collect();

        handler
            .on_entities_created(&entities, &SubjectContext::system())
            .await
            .unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 3);
    }
}
