//! Action messages exchanged between a client session and its server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of bidirectional communication on the action link.
///
/// The action payload is opaque to the session; only the backend and the
/// UI layer interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    /// Client session the message belongs to.
    pub client_id: String,
    /// Opaque action payload.
    pub action: Value,
}

impl ActionMessage {
    /// Create a message for the given client session.
    #[must_use]
    pub fn new(client_id: impl Into<String>, action: Value) -> Self {
        Self {
            client_id: client_id.into(),
            action,
        }
    }

    /// The action's `kind` discriminator, if the payload carries one.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.action.get("kind").and_then(Value::as_str)
    }
}
