pub mod dispatcher;
pub mod snapshot;
pub mod types;

// Re-export key types for convenience
pub use dispatcher::{
    DispatchReceipt, EntityLifecycleDispatcher, ExecutionMode, HandlerOutcome, PendingAsyncHandler,
};
pub use snapshot::{Snapshot, SnapshotIsolator};
pub use types::{LifecycleEvent, LifecycleEventKind};
