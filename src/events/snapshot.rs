//! # Snapshot Isolation
//!
//! Async handlers run after the dispatch call returns, while the caller is free
//! to keep working with its entity. Each async handler therefore receives its
//! own structurally independent copy of the payload, produced by a serde JSON
//! round-trip.
//!
//! A failed copy is not fatal: the isolator logs a warning and hands the
//! handler the caller's `Arc` instead (degraded isolation).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::types::LifecycleEvent;
use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::models::{ChangeDescription, Entity, EntityReference};

/// Payload types that may be copied across the async boundary
pub trait Snapshot: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl Snapshot for Entity {}
impl Snapshot for EntityReference {}
impl Snapshot for ChangeDescription {}

/// Produces per-handler payload copies for async execution
#[derive(Debug, Default)]
pub struct SnapshotIsolator {
    max_snapshot_bytes: usize,
    snapshots_taken: AtomicU64,
    degraded_snapshots: AtomicU64,
}

impl SnapshotIsolator {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            max_snapshot_bytes: config.max_snapshot_bytes,
            ..Default::default()
        }
    }

    /// Deep copy `value`, failing if it cannot round-trip or exceeds the size limit
    pub fn try_copy<T: Snapshot>(&self, value: &T) -> Result<T, SnapshotError> {
        let bytes = serde_json::to_vec(value)?;

        if self.max_snapshot_bytes > 0 && bytes.len() > self.max_snapshot_bytes {
            return Err(SnapshotError::TooLarge {
                size: bytes.len(),
                limit: self.max_snapshot_bytes,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Independent copy of `original`, or `original` itself if copying fails
    pub fn snapshot<T: Snapshot>(&self, original: &Arc<T>, handler_name: &str) -> Arc<T> {
        match self.try_copy(original.as_ref()) {
            Ok(copy) => {
                self.snapshots_taken.fetch_add(1, Ordering::Relaxed);
                Arc::new(copy)
            }
            Err(e) => {
                self.record_degraded(handler_name, &e, 1);
                Arc::clone(original)
            }
        }
    }

    /// Copy every entity of a batch; any failure shares the whole original batch
    pub fn snapshot_batch(&self, entities: &[Arc<Entity>], handler_name: &str) -> Vec<Arc<Entity>> {
        let copies: Result<Vec<Arc<Entity>>, SnapshotError> = entities
            .iter()
            .map(|entity| self.try_copy(entity.as_ref()).map(Arc::new))
            .collect();

        match copies {
            Ok(copies) => {
                self.snapshots_taken
                    .fetch_add(copies.len() as u64, Ordering::Relaxed);
                copies
            }
            Err(e) => {
                self.record_degraded(handler_name, &e, entities.len() as u64);
                entities.to_vec()
            }
        }
    }

    /// Rebuild `event` around isolated copies of its payload
    pub fn isolate(&self, event: &LifecycleEvent, handler_name: &str) -> LifecycleEvent {
        match event {
            LifecycleEvent::EntityCreated { entity } => LifecycleEvent::EntityCreated {
                entity: self.snapshot(entity, handler_name),
            },
            LifecycleEvent::EntitiesCreated {
                entity_type,
                entities,
            } => LifecycleEvent::EntitiesCreated {
                entity_type: entity_type.clone(),
                entities: self.snapshot_batch(entities, handler_name),
            },
            LifecycleEvent::EntityUpdated { entity, change } => LifecycleEvent::EntityUpdated {
                entity: self.snapshot(entity, handler_name),
                change: change
                    .as_ref()
                    .map(|change| self.snapshot(change, handler_name)),
            },
            LifecycleEvent::EntityReferenceUpdated { reference } => {
                LifecycleEvent::EntityReferenceUpdated {
                    reference: self.snapshot(reference, handler_name),
                }
            }
            LifecycleEvent::EntityDeleted { entity } => LifecycleEvent::EntityDeleted {
                entity: self.snapshot(entity, handler_name),
            },
            LifecycleEvent::EntitySoftDeletedOrRestored { entity, deleted } => {
                LifecycleEvent::EntitySoftDeletedOrRestored {
                    entity: self.snapshot(entity, handler_name),
                    deleted: *deleted,
                }
            }
        }
    }

    /// Payload copies produced successfully
    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken.load(Ordering::Relaxed)
    }

    /// Copies that fell back to sharing the original
    pub fn degraded_snapshots(&self) -> u64 {
        self.degraded_snapshots.load(Ordering::Relaxed)
    }

    fn record_degraded(&self, handler_name: &str, error: &SnapshotError, payloads: u64) {
        self.degraded_snapshots.fetch_add(payloads, Ordering::Relaxed);
        warn!(
            handler_name = %handler_name,
            payloads = payloads,
            error = %error,
            "Snapshot failed, async handler will share the original payload"
        );
    }
}
