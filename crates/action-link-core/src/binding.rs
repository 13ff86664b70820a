//! Server-side endpoint contract and handshake parameter types.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ActionMessage;

/// Optional free-form arguments attached to handshake requests.
pub type Args = Map<String, Value>;

/// Parameters for the initial server handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParameters {
    /// Identifies the client application.
    pub application_id: String,
    /// Protocol version the client speaks.
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

/// Server answer to [`InitializeParameters`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server speaks.
    pub protocol_version: String,
    /// Action kinds the server handles, keyed by diagram type.
    #[serde(default)]
    pub server_actions: HashMap<String, Vec<String>>,
}

/// Parameters for opening a client session on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeClientSessionParameters {
    pub client_session_id: String,
    pub diagram_type: String,
    /// Action kinds the client is able to handle.
    #[serde(default)]
    pub client_action_kinds: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

/// Parameters for closing a client session on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposeClientSessionParameters {
    pub client_session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

/// Failure reported by a server binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Server rejected request: {0}")]
    Rejected(String),
    #[error("Server disconnected")]
    Disconnected,
    #[error("Server error: {0}")]
    Internal(String),
}

/// Backend endpoint a client session delegates to.
///
/// Implement this trait to connect a session to a concrete server, be it
/// in-process, over a socket, or over RPC. Inbound messages travel the other
/// way through a [`ClientProxy`](crate::ClientProxy) handed to the backend.
#[async_trait]
pub trait ServerBinding: Send + Sync {
    /// Perform the initial handshake.
    async fn initialize(
        &self,
        params: InitializeParameters,
    ) -> Result<InitializeResult, BindingError>;

    /// Open a client session on the server.
    async fn initialize_client_session(
        &self,
        params: InitializeClientSessionParameters,
    ) -> Result<(), BindingError>;

    /// Close a client session on the server.
    async fn dispose_client_session(
        &self,
        params: DisposeClientSessionParameters,
    ) -> Result<(), BindingError>;

    /// Ask the server to shut down. Best-effort.
    async fn shutdown(&self) -> Result<(), BindingError>;

    /// Hand an outbound message to the server for processing.
    ///
    /// Fire-and-forget: failures surface through the server's own channel.
    fn process(&self, message: ActionMessage);
}
