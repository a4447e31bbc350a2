use serde::{Deserialize, Serialize};

/// Acting user for a lifecycle transition
///
/// The dispatcher never inspects this; it is handed to every handler as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectContext {
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_by: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl SubjectContext {
    pub fn user(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            impersonated_by: None,
            is_bot: false,
        }
    }

    pub fn bot(bot_name: impl Into<String>) -> Self {
        Self {
            user_name: bot_name.into(),
            impersonated_by: None,
            is_bot: true,
        }
    }

    /// Internal system actor
    pub fn system() -> Self {
        Self::bot("system")
    }

    pub fn impersonated_by(mut self, user_name: impl Into<String>) -> Self {
        self.impersonated_by = Some(user_name.into());
        self
    }
}
