//! # System Constants
//!
//! Operational defaults and well-known identifiers for the lifecycle dispatch
//! system.

/// Lifecycle event names, used as the `event` field in structured logs
pub mod events {
    pub const ENTITY_CREATED: &str = "entity_created";
    pub const ENTITIES_CREATED: &str = "entities_created";
    pub const ENTITY_UPDATED: &str = "entity_updated";
    pub const ENTITY_REFERENCE_UPDATED: &str = "entity_reference_updated";
    pub const ENTITY_DELETED: &str = "entity_deleted";
    pub const ENTITY_SOFT_DELETED_OR_RESTORED: &str = "entity_soft_deleted_or_restored";
}

/// Entity type identifiers referenced by the built-in handlers
pub mod entity_types {
    pub const TASK: &str = "task";
    pub const THREAD: &str = "thread";
    pub const DOMAIN: &str = "domain";
}

/// Entity field names referenced by the built-in handlers
pub mod fields {
    pub const DOMAINS: &str = "domains";
}

/// Defaults for the async execution pool and dispatcher
pub mod system {
    /// Concurrent async handler invocations per pool
    pub const DEFAULT_ASYNC_POOL_SIZE: usize = 50;
    /// Queued async invocations before the overflow policy applies
    pub const DEFAULT_ASYNC_QUEUE_CAPACITY: usize = 10_000;
    pub const DEFAULT_ASYNC_POOL_ID: &str = "lifecycle-async";
    /// Upper bound for pool concurrency and queue capacity (semaphore permits)
    pub const MAX_ASYNC_POOL_BOUND: usize = u32::MAX as usize;
    /// Priority assigned to handlers that do not override it
    pub const DEFAULT_HANDLER_PRIORITY: i32 = 100;
    /// Environment variable prefix for layered configuration
    pub const CONFIG_ENV_PREFIX: &str = "LIFECYCLE";
    pub const CONFIG_ENV_SEPARATOR: &str = "__";
}
