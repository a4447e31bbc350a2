//! # Handler Registry
//!
//! Thread-safe, priority-ordered registry of entity lifecycle handlers.
//!
//! ## Overview
//!
//! The live handler set is an immutable `Arc<Vec<RegisteredHandler>>` guarded
//! by a `parking_lot::RwLock`. Writers build a new vector and swap it in;
//! readers clone the `Arc`. A dispatch that has called [`HandlerRegistry::list`]
//! keeps iterating the set it saw, even if handlers are registered or removed
//! concurrently.
//!
//! ## Key Features
//!
//! - **First registration wins**: a duplicate name is ignored with a warning
//! - **Ascending priority order**: stable, so equal priorities keep registration order
//! - **Copy-on-write reads** that never block on writers for longer than an `Arc` clone
//!
//! ## Usage
//!
//! ```rust
//! use entity_lifecycle::registry::{EntityLifecycleHandler, HandlerRegistry, RegistrationOutcome};
//! use std::sync::Arc;
//!
//! struct AuditHandler;
//!
//! impl EntityLifecycleHandler for AuditHandler {
//!     fn handler_name(&self) -> &str {
//!         "AuditHandler"
//!     }
//! }
//!
//! let registry = HandlerRegistry::new();
//! assert_eq!(registry.register(Arc::new(AuditHandler)), RegistrationOutcome::Registered);
//! assert_eq!(registry.register(Arc::new(AuditHandler)), RegistrationOutcome::Duplicate);
//! assert_eq!(registry.count(), 1);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::handler::{EntityLifecycleHandler, RegisteredHandler};
use crate::logging::log_registry_operation;

/// Result of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    /// A handler with the same name is already live; the new one was ignored
    Duplicate,
    /// The handler reported a blank name and was ignored
    InvalidName,
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered)
    }
}

/// Priority-ordered set of live handlers
pub struct HandlerRegistry {
    handlers: RwLock<Arc<Vec<RegisteredHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Register a handler, keeping the set sorted by ascending priority
    pub fn register(&self, handler: Arc<dyn EntityLifecycleHandler>) -> RegistrationOutcome {
        let entry = RegisteredHandler::new(handler);
        let name = entry.name().to_string();
        let priority = entry.descriptor.priority;

        if name.trim().is_empty() {
            warn!("Ignoring lifecycle handler registration with a blank name");
            log_registry_operation("register", &name, priority, "invalid_name");
            return RegistrationOutcome::InvalidName;
        }

        let mut guard = self.handlers.write();

        if guard.iter().any(|existing| existing.name() == name) {
            warn!(
                handler_name = %name,
                "Handler already registered, ignoring duplicate registration"
            );
            log_registry_operation("register", &name, priority, "duplicate");
            return RegistrationOutcome::Duplicate;
        }

        let mut next: Vec<RegisteredHandler> = guard.as_ref().clone();
        next.push(entry);
        next.sort_by_key(|registered| registered.descriptor.priority);
        *guard = Arc::new(next);
        drop(guard);

        log_registry_operation("register", &name, priority, "registered");
        RegistrationOutcome::Registered
    }

    /// Remove the handler named `name`; returns whether one was removed
    pub fn unregister(&self, name: &str) -> bool {
        let mut guard = self.handlers.write();

        let Some(position) = guard.iter().position(|existing| existing.name() == name) else {
            debug!(handler_name = %name, "No handler registered under this name");
            return false;
        };

        let mut next: Vec<RegisteredHandler> = guard.as_ref().clone();
        let removed = next.remove(position);
        *guard = Arc::new(next);
        drop(guard);

        log_registry_operation("unregister", name, removed.descriptor.priority, "removed");
        true
    }

    /// Immutable view of the current ordered handler set
    pub fn list(&self) -> Arc<Vec<RegisteredHandler>> {
        Arc::clone(&self.handlers.read())
    }

    pub fn count(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().iter().any(|existing| existing.name() == name)
    }

    /// Handler names in dispatch order
    pub fn names(&self) -> Vec<String> {
        self.handlers
            .read()
            .iter()
            .map(|registered| registered.name().to_string())
            .collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
