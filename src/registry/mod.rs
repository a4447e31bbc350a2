//! # Registry Infrastructure
//!
//! The handler contract and the priority-ordered registry the dispatcher reads
//! from.
//!
//! ```text
//! Registry
//! ├── EntityLifecycleHandler  (consumer-implemented callbacks)
//! ├── HandlerDescriptor       (name, priority, mode, type filter)
//! └── HandlerRegistry         (copy-on-write ordered set)
//! ```

pub mod handler;
pub mod handler_registry;

// Re-export main types for easy access
pub use handler::{EntityLifecycleHandler, HandlerDescriptor, RegisteredHandler};
pub use handler_registry::{HandlerRegistry, RegistrationOutcome};
