pub mod worker_pool;

pub use worker_pool::{current_worker_pool, AsyncExecutionPool, PoolStats, TaskHandle};
