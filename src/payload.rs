//! Update payloads delivered to subscribers
//!
//! A payload carries either query data or a list of error strings. It is
//! serde-serializable so a transport layer can frame it directly.

use serde::{Deserialize, Serialize};

/// Payload pushed to a subscriber when a matching update fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    /// Result data, absent on pure-error payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Errors encountered while producing the update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl UpdatePayload {
    /// Create a data payload
    pub fn data(value: serde_json::Value) -> Self {
        Self {
            data: Some(value),
            errors: Vec::new(),
        }
    }

    /// Create an error payload
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: vec![message.into()],
        }
    }

    /// Whether this payload carries any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
