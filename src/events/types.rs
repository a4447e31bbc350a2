use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::constants::events;
use crate::models::{ChangeDescription, Entity, EntityReference};

/// Which lifecycle transition an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    EntityCreated,
    EntitiesCreated,
    EntityUpdated,
    EntityReferenceUpdated,
    EntityDeleted,
    EntitySoftDeletedOrRestored,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventKind::EntityCreated => events::ENTITY_CREATED,
            LifecycleEventKind::EntitiesCreated => events::ENTITIES_CREATED,
            LifecycleEventKind::EntityUpdated => events::ENTITY_UPDATED,
            LifecycleEventKind::EntityReferenceUpdated => events::ENTITY_REFERENCE_UPDATED,
            LifecycleEventKind::EntityDeleted => events::ENTITY_DELETED,
            LifecycleEventKind::EntitySoftDeletedOrRestored => {
                events::ENTITY_SOFT_DELETED_OR_RESTORED
            }
        }
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lifecycle notification
///
/// Payloads sit behind `Arc` so sync handlers can borrow the caller's value
/// and async handlers can own an isolated copy.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    EntityCreated {
        entity: Arc<Entity>,
    },
    /// One notification for the whole batch
    EntitiesCreated {
        entity_type: String,
        entities: Vec<Arc<Entity>>,
    },
    EntityUpdated {
        entity: Arc<Entity>,
        change: Option<Arc<ChangeDescription>>,
    },
    /// Lightweight update when only a reference is available
    EntityReferenceUpdated {
        reference: Arc<EntityReference>,
    },
    EntityDeleted {
        entity: Arc<Entity>,
    },
    EntitySoftDeletedOrRestored {
        entity: Arc<Entity>,
        deleted: bool,
    },
}

impl LifecycleEvent {
    pub fn created(entity: Arc<Entity>) -> Self {
        LifecycleEvent::EntityCreated { entity }
    }

    /// Bulk create; the batch type is taken from the first entity
    pub fn bulk_created(entities: Vec<Arc<Entity>>) -> Self {
        let entity_type = entities
            .first()
            .map(|entity| entity.entity_type.clone())
            .unwrap_or_default();
        LifecycleEvent::EntitiesCreated {
            entity_type,
            entities,
        }
    }

    pub fn updated(entity: Arc<Entity>, change: Option<Arc<ChangeDescription>>) -> Self {
        LifecycleEvent::EntityUpdated { entity, change }
    }

    pub fn reference_updated(reference: Arc<EntityReference>) -> Self {
        LifecycleEvent::EntityReferenceUpdated { reference }
    }

    pub fn deleted(entity: Arc<Entity>) -> Self {
        LifecycleEvent::EntityDeleted { entity }
    }

    pub fn soft_deleted_or_restored(entity: Arc<Entity>, deleted: bool) -> Self {
        LifecycleEvent::EntitySoftDeletedOrRestored { entity, deleted }
    }

    pub fn kind(&self) -> LifecycleEventKind {
        match self {
            LifecycleEvent::EntityCreated { .. } => LifecycleEventKind::EntityCreated,
            LifecycleEvent::EntitiesCreated { .. } => LifecycleEventKind::EntitiesCreated,
            LifecycleEvent::EntityUpdated { .. } => LifecycleEventKind::EntityUpdated,
            LifecycleEvent::EntityReferenceUpdated { .. } => {
                LifecycleEventKind::EntityReferenceUpdated
            }
            LifecycleEvent::EntityDeleted { .. } => LifecycleEventKind::EntityDeleted,
            LifecycleEvent::EntitySoftDeletedOrRestored { .. } => {
                LifecycleEventKind::EntitySoftDeletedOrRestored
            }
        }
    }

    /// Entity type used for handler filtering
    pub fn entity_type(&self) -> &str {
        match self {
            LifecycleEvent::EntityCreated { entity }
            | LifecycleEvent::EntityUpdated { entity, .. }
            | LifecycleEvent::EntityDeleted { entity }
            | LifecycleEvent::EntitySoftDeletedOrRestored { entity, .. } => &entity.entity_type,
            LifecycleEvent::EntitiesCreated { entity_type, .. } => entity_type,
            LifecycleEvent::EntityReferenceUpdated { reference } => &reference.entity_type,
        }
    }

    /// Nothing to notify about
    pub fn is_empty(&self) -> bool {
        matches!(self, LifecycleEvent::EntitiesCreated { entities, .. } if entities.is_empty())
    }

    /// Identifier for log records; a count for bulk events
    pub fn subject_id(&self) -> String {
        match self {
            LifecycleEvent::EntityCreated { entity }
            | LifecycleEvent::EntityUpdated { entity, .. }
            | LifecycleEvent::EntityDeleted { entity }
            | LifecycleEvent::EntitySoftDeletedOrRestored { entity, .. } => entity.id.to_string(),
            LifecycleEvent::EntitiesCreated { entities, .. } => {
                format!("{} entities", entities.len())
            }
            LifecycleEvent::EntityReferenceUpdated { reference } => reference.id.to_string(),
        }
    }
}
