pub mod change_description;
pub mod entity;
pub mod subject;

// Re-export core models for easy access
pub use change_description::{ChangeDescription, FieldChange};
pub use entity::{Entity, EntityReference};
pub use subject::SubjectContext;
