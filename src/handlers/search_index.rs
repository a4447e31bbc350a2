//! Search index maintenance driven by entity lifecycle events.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::{HandlerError, HandlerResult};
use crate::models::{ChangeDescription, Entity, EntityReference, SubjectContext};
use crate::registry::EntityLifecycleHandler;

const HANDLER_NAME: &str = "SearchIndexHandler";
const COLLABORATOR: &str = "search_indexer";

/// Search backend operations used by [`SearchIndexHandler`]
#[async_trait]
pub trait SearchIndexer: Send + Sync + 'static {
    async fn create_entity_index(&self, entity: &Entity) -> anyhow::Result<()>;

    /// Index a batch of entities that all share one entity type
    async fn create_entities_index(&self, entities: &[Arc<Entity>]) -> anyhow::Result<()>;

    async fn update_entity_index(&self, entity: &Entity) -> anyhow::Result<()>;

    async fn update_entity_reference(&self, reference: &EntityReference) -> anyhow::Result<()>;

    async fn delete_entity_index(&self, entity: &Entity) -> anyhow::Result<()>;

    async fn soft_delete_or_restore_entity_index(
        &self,
        entity: &Entity,
        deleted: bool,
    ) -> anyhow::Result<()>;
}

/// Keeps the search index in step with every entity type (async, priority 10)
pub struct SearchIndexHandler {
    indexer: Arc<dyn SearchIndexer>,
}

impl SearchIndexHandler {
    pub fn new(indexer: Arc<dyn SearchIndexer>) -> Self {
        Self { indexer }
    }

    fn indexing_failed(
        action: &str,
        entity_type: &str,
        id: impl std::fmt::Display,
        e: anyhow::Error,
    ) -> HandlerError {
        HandlerError::collaborator(
            COLLABORATOR,
            format!("failed to {action} search index for {entity_type} {id}: {e:#}"),
        )
    }
}

#[async_trait]
impl EntityLifecycleHandler for SearchIndexHandler {
    fn handler_name(&self) -> &str {
        HANDLER_NAME
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn on_entity_created(
        &self,
        entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.indexer
            .create_entity_index(entity)
            .await
            .map_err(|e| Self::indexing_failed("create", &entity.entity_type, entity.id, e))
    }

    /// Index per entity type; a failed group falls back to one call per entity
    async fn on_entities_created(
        &self,
        entities: &[Arc<Entity>],
        _subject: &SubjectContext,
    ) -> HandlerResult {
        let mut by_type: BTreeMap<&str, Vec<Arc<Entity>>> = BTreeMap::new();
        for entity in entities {
            by_type
                .entry(entity.entity_type.as_str())
                .or_default()
                .push(Arc::clone(entity));
        }

        let mut failed = 0usize;
        for (entity_type, group) in by_type {
            match self.indexer.create_entities_index(&group).await {
                Ok(()) => debug!(
                    entity_type = %entity_type,
                    count = group.len(),
                    "Indexed entity batch"
                ),
                Err(e) => {
                    warn!(
                        entity_type = %entity_type,
                        count = group.len(),
                        error = %e,
                        "Bulk indexing failed, indexing entities individually"
                    );
                    for entity in &group {
                        if let Err(e) = self.indexer.create_entity_index(entity).await {
                            error!(
                                entity_type = %entity.entity_type,
                                entity_id = %entity.id,
                                error = %e,
                                "Failed to create search index"
                            );
                            failed += 1;
                        }
                    }
                }
            }
        }

        if failed > 0 {
            return Err(HandlerError::collaborator(
                COLLABORATOR,
                format!("failed to index {failed} of {} entities", entities.len()),
            ));
        }
        Ok(())
    }

    async fn on_entity_updated(
        &self,
        entity: &Arc<Entity>,
        _change: Option<&ChangeDescription>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.indexer
            .update_entity_index(entity)
            .await
            .map_err(|e| Self::indexing_failed("update", &entity.entity_type, entity.id, e))
    }

    async fn on_entity_reference_updated(
        &self,
        reference: &EntityReference,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.indexer
            .update_entity_reference(reference)
            .await
            .map_err(|e| Self::indexing_failed("update", &reference.entity_type, reference.id, e))
    }

    async fn on_entity_deleted(
        &self,
        entity: &Arc<Entity>,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        self.indexer
            .delete_entity_index(entity)
            .await
            .map_err(|e| Self::indexing_failed("delete", &entity.entity_type, entity.id, e))
    }

    async fn on_entity_soft_deleted_or_restored(
        &self,
        entity: &Arc<Entity>,
        deleted: bool,
        _subject: &SubjectContext,
    ) -> HandlerResult {
        let action = if deleted { "soft delete" } else { "restore" };
        self.indexer
            .soft_delete_or_restore_entity_index(entity, deleted)
            .await
            .map_err(|e| Self::indexing_failed(action, &entity.entity_type, entity.id, e))
    }
}
