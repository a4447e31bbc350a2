//! Keeps dependent tasks in the same domains as the entity they belong to.
//!
//! When an entity's `domains` change, tasks attached to that entity are moved
//! to the new domains (or cleared when the domains were removed), so
//! domain-based access policies keep applying to them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::constants::{entity_types, fields};
use crate::error::{HandlerError, HandlerResult};
use crate::models::{ChangeDescription, Entity, EntityReference, FieldChange, SubjectContext};
use crate::registry::EntityLifecycleHandler;

const HANDLER_NAME: &str = "DomainSyncHandler";

/// Entity types whose own domain changes never trigger a sync
const SKIPPED_ENTITY_TYPES: [&str; 3] = [
    entity_types::TASK,
    entity_types::THREAD,
    entity_types::DOMAIN,
];

/// Task store operation used by [`DomainSyncHandler`]
#[async_trait]
pub trait TaskDomainSync: Send + Sync + 'static {
    /// Move every task about `entity_id` to `domains`; an empty slice clears them
    async fn sync_task_domains_for_entity(
        &self,
        entity_id: Uuid,
        entity_type: &str,
        domains: &[EntityReference],
    ) -> anyhow::Result<()>;
}

/// Syncs task domains when an entity's domains change (async, priority 50)
pub struct DomainSyncHandler {
    tasks: Arc<dyn TaskDomainSync>,
}

impl DomainSyncHandler {
    pub fn new(tasks: Arc<dyn TaskDomainSync>) -> Self {
        Self { tasks }
    }

    /// New domains from a `domains` change, checking added fields before updated ones
    fn find_domains_change(change: &ChangeDescription) -> Option<Vec<EntityReference>> {
        Self::find_domains_in(&change.fields_added)
            .or_else(|| Self::find_domains_in(&change.fields_updated))
    }

    fn find_domains_in(changes: &[FieldChange]) -> Option<Vec<EntityReference>> {
        changes
            .iter()
            .filter(|change| change.name == fields::DOMAINS)
            .filter_map(|change| change.new_value.as_ref())
            .map(decode_references)
            .find(|domains| !domains.is_empty())
    }

    fn domains_removed(change: &ChangeDescription) -> bool {
        change
            .fields_deleted
            .iter()
            .any(|change| change.name == fields::DOMAINS)
    }
}

/// Entity references in a change value, which may also arrive JSON-encoded as a string
fn decode_references(value: &Value) -> Vec<EntityReference> {
    let items = match value {
        Value::Array(items) => items.clone(),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<EntityReference>(item).ok())
        .collect()
}

#[async_trait]
impl EntityLifecycleHandler for DomainSyncHandler {
    fn handler_name(&self) -> &str {
        HANDLER_NAME
    }

    fn priority(&self) -> i32 {
        50
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn on_entity_updated(
        &self,
        entity: &Arc<Entity>,
        change: Option<&ChangeDescription>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        let Some(change) = change else {
            return Ok(());
        };

        let new_domains = Self::find_domains_change(change);
        let removed = Self::domains_removed(change);
        if new_domains.is_none() && !removed {
            return Ok(());
        }

        if SKIPPED_ENTITY_TYPES.contains(&entity.entity_type.as_str()) {
            return Ok(());
        }

        let effective = if removed {
            Vec::new()
        } else {
            new_domains.unwrap_or_default()
        };

        debug!(
            entity_type = %entity.entity_type,
            entity_id = %entity.id,
            domains = ?effective
                .iter()
                .filter_map(|domain| domain.fully_qualified_name.as_deref())
                .collect::<Vec<_>>(),
            "Domains change detected, syncing dependent tasks"
        );

        self.tasks
            .sync_task_domains_for_entity(entity.id, &entity.entity_type, &effective)
            .await
            .map_err(|e| {
                HandlerError::collaborator(
                    "task_domain_sync",
                    format!(
                        "failed to sync task domains for {} {}: {e:#}",
                        entity.entity_type, entity.id
                    ),
                )
            })
    }
}
