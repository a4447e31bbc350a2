use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A domain entity whose lifecycle transitions are dispatched to handlers
///
/// The dispatcher only reads `entity_type` (for handler filtering) and `id`
/// (for logging). Everything else is carried through to handlers untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: Uuid,
    pub entity_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    pub version: f64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub domains: Vec<EntityReference>,
    /// Entity-specific attributes
    #[serde(default)]
    pub fields: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            name: name.into(),
            fully_qualified_name: None,
            version: 0.1,
            deleted: false,
            domains: Vec::new(),
            fields: Map::new(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    pub fn with_fully_qualified_name(mut self, fqn: impl Into<String>) -> Self {
        self.fully_qualified_name = Some(fqn.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_domains(mut self, domains: Vec<EntityReference>) -> Self {
        self.domains = domains;
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Lightweight reference to this entity
    pub fn entity_reference(&self) -> EntityReference {
        EntityReference {
            id: self.id,
            entity_type: self.entity_type.clone(),
            name: Some(self.name.clone()),
            fully_qualified_name: self.fully_qualified_name.clone(),
            display_name: None,
            deleted: Some(self.deleted),
        }
    }
}

/// Reference to an entity by id and type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl EntityReference {
    pub fn new(id: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            name: None,
            fully_qualified_name: None,
            display_name: None,
            deleted: None,
        }
    }

    pub fn with_fully_qualified_name(mut self, fqn: impl Into<String>) -> Self {
        self.fully_qualified_name = Some(fqn.into());
        self
    }
}
