//! # Built-in Lifecycle Handlers
//!
//! Handlers shipped with the crate. Each wraps an external collaborator trait
//! so the backend (search cluster, task store) stays pluggable.
//!
//! | Handler              | Priority | Mode  | Entity types          |
//! |----------------------|----------|-------|-----------------------|
//! | `SearchIndexHandler` | 10       | async | all                   |
//! | `DomainSyncHandler`  | 50       | async | all but task/thread/domain |

pub mod domain_sync;
pub mod search_index;

pub use domain_sync::{DomainSyncHandler, TaskDomainSync};
pub use search_index::{SearchIndexHandler, SearchIndexer};
