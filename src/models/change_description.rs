use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single field-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl FieldChange {
    pub fn added(name: impl Into<String>, new_value: Value) -> Self {
        Self {
            name: name.into(),
            old_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn updated(name: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            name: name.into(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn deleted(name: impl Into<String>, old_value: Value) -> Self {
        Self {
            name: name.into(),
            old_value: Some(old_value),
            new_value: None,
        }
    }
}

/// Structured description of what an update changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescription {
    #[serde(default)]
    pub fields_added: Vec<FieldChange>,
    #[serde(default)]
    pub fields_updated: Vec<FieldChange>,
    #[serde(default)]
    pub fields_deleted: Vec<FieldChange>,
    pub previous_version: f64,
}

impl ChangeDescription {
    pub fn new(previous_version: f64) -> Self {
        Self {
            previous_version,
            ..Default::default()
        }
    }

    pub fn with_added(mut self, change: FieldChange) -> Self {
        self.fields_added.push(change);
        self
    }

    pub fn with_updated(mut self, change: FieldChange) -> Self {
        self.fields_updated.push(change);
        self
    }

    pub fn with_deleted(mut self, change: FieldChange) -> Self {
        self.fields_deleted.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty() && self.fields_updated.is_empty() && self.fields_deleted.is_empty()
    }

    /// First change touching `name`, searching added, updated, then deleted
    pub fn find_field(&self, name: &str) -> Option<&FieldChange> {
        self.fields_added
            .iter()
            .chain(self.fields_updated.iter())
            .chain(self.fields_deleted.iter())
            .find(|change| change.name == name)
    }
}
