use std::sync::Arc;

use entity_lifecycle::config::DispatcherConfig;
use entity_lifecycle::events::EntityLifecycleDispatcher;
use entity_lifecycle::models::{Entity, SubjectContext};
use serde_json::json;

pub fn subject() -> SubjectContext {
    SubjectContext::user("admin")
}

pub fn table(name: &str) -> Arc<Entity> {
    Arc::new(Entity::new("table", name))
}

pub fn dashboard(name: &str) -> Arc<Entity> {
    Arc::new(Entity::new("dashboard", name))
}

/// Table entity carrying an integer field `x`
pub fn table_with_x(name: &str, x: i64) -> Arc<Entity> {
    Arc::new(Entity::new("table", name).with_field("x", json!(x)))
}

pub fn tables(count: usize) -> Vec<Arc<Entity>> {
    (0..count).map(|i| table(&format!("table_{i}"))).collect()
}

pub fn dispatcher() -> EntityLifecycleDispatcher {
    dispatcher_with(DispatcherConfig::default())
}

pub fn dispatcher_with(config: DispatcherConfig) -> EntityLifecycleDispatcher {
    EntityLifecycleDispatcher::new(config).expect("dispatcher should start inside a tokio runtime")
}

/// Dispatcher whose async pool runs one task at a time, in submission order
pub fn serial_dispatcher() -> EntityLifecycleDispatcher {
    let mut config = DispatcherConfig::default();
    config.pool.max_concurrency = 1;
    dispatcher_with(config)
}
