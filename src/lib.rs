#![allow(clippy::doc_markdown)] // Allow technical terms like OpenSearch, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Entity Lifecycle
//!
//! In-process publish/subscribe for entity lifecycle events.
//!
//! ## Overview
//!
//! Whenever a persistence component finishes writing an entity it calls the
//! [`EntityLifecycleDispatcher`], which notifies every registered handler that
//! cares about that entity type. Handlers run in ascending priority order,
//! either inline (sync) or on a bounded async pool against an isolated
//! snapshot of the payload.
//!
//! ## Key Features
//!
//! - **Deterministic ordering**: lower priority values run (or are submitted) first
//! - **Snapshot isolation**: async handlers never observe the caller's later mutations
//! - **Failure containment**: handler errors and panics are logged, never propagated
//!   unless [`SyncFailurePolicy::Propagate`] is configured
//! - **Bounded async execution** with an explicit overflow policy
//!
//! ## Module Organization
//!
//! - [`models`] - Entities, references, change descriptions and subject context
//! - [`registry`] - Handler contract and priority-ordered registry
//! - [`events`] - Lifecycle events, snapshot isolation and the dispatcher
//! - [`execution`] - Bounded async execution pool
//! - [`handlers`] - Built-in search index and domain sync handlers
//! - [`config`] - Layered dispatcher configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use entity_lifecycle::{DispatcherConfig, EntityLifecycleDispatcher, EntityLifecycleHandler};
//! use entity_lifecycle::error::HandlerResult;
//! use entity_lifecycle::models::{Entity, SubjectContext};
//! use std::sync::Arc;
//!
//! struct AuditHandler;
//!
//! #[async_trait::async_trait]
//! impl EntityLifecycleHandler for AuditHandler {
//!     fn handler_name(&self) -> &str {
//!         "AuditHandler"
//!     }
//!
//!     async fn on_entity_created(&self, entity: &Arc<Entity>, subject: &SubjectContext) -> HandlerResult {
//!         println!("{} created {}", subject.user_name, entity.name);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! entity_lifecycle::logging::init_structured_logging();
//!
//! let dispatcher = Arc::new(EntityLifecycleDispatcher::new(DispatcherConfig::load(None)?)?);
//! dispatcher.register_handler(Arc::new(AuditHandler));
//!
//! let entity = Arc::new(Entity::new("table", "orders"));
//! dispatcher
//!     .on_entity_created(Some(entity), &SubjectContext::user("alice"))
//!     .await?;
//!
//! dispatcher.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod execution;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod registry;

pub use config::{AsyncPoolConfig, DispatcherConfig, OverflowPolicy, SnapshotConfig, SyncFailurePolicy};
pub use error::{
    ConfigurationError, DispatchError, HandlerError, HandlerResult, LifecycleError,
    LifecycleResult, PoolError, SnapshotError,
};
pub use events::{
    DispatchReceipt, EntityLifecycleDispatcher, ExecutionMode, HandlerOutcome, LifecycleEvent,
    LifecycleEventKind, SnapshotIsolator,
};
pub use execution::{AsyncExecutionPool, PoolStats, TaskHandle};
pub use registry::{EntityLifecycleHandler, HandlerDescriptor, HandlerRegistry, RegistrationOutcome};
