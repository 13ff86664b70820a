//! Loopback demo: a client session wired to an in-process echo server.
//!
//! Run with: cargo run -p loopback-demo
//!
//! Set `RUST_LOG=debug` to see every state transition.

use std::{sync::Arc, time::Duration};

use action_link_core::{
    ActionMessage, BindingError, ClientProxy, ServerBinding,
    binding::{
        DisposeClientSessionParameters, InitializeClientSessionParameters, InitializeParameters,
        InitializeResult,
    },
};
use action_link_session::{ClientSession, SessionConfig, SessionError};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Server that answers every request action with a response action.
struct EchoServer {
    client: ClientProxy,
}

#[async_trait::async_trait]
impl ServerBinding for EchoServer {
    async fn initialize(
        &self,
        params: InitializeParameters,
    ) -> Result<InitializeResult, BindingError> {
        tracing::info!(application_id = %params.application_id, "Server initialized");
        Ok(InitializeResult {
            protocol_version: params.protocol_version,
            server_actions: [(
                "echo".to_string(),
                vec!["request".to_string(), "cancel".to_string()],
            )]
            .into_iter()
            .collect(),
        })
    }

    async fn initialize_client_session(
        &self,
        params: InitializeClientSessionParameters,
    ) -> Result<(), BindingError> {
        tracing::info!(client_session_id = %params.client_session_id, "Client session opened");
        Ok(())
    }

    async fn dispose_client_session(
        &self,
        params: DisposeClientSessionParameters,
    ) -> Result<(), BindingError> {
        tracing::info!(client_session_id = %params.client_session_id, "Client session disposed");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BindingError> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    fn process(&self, message: ActionMessage) {
        let kind = message.kind().map(str::to_owned);
        match kind.as_deref() {
            Some("request") => {
                let payload = message.action.get("payload").cloned().unwrap_or_default();
                self.client.process(&ActionMessage::new(
                    message.client_id,
                    json!({ "kind": "response", "payload": payload }),
                ));
            }
            Some("cancel") => tracing::info!(client_id = %message.client_id, "Request cancelled"),
            other => tracing::warn!(kind = ?other, "Unhandled action"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let session = ClientSession::with_config(
        SessionConfig::new(Uuid::new_v4().to_string()).with_startup_timeout(Duration::from_secs(2)),
    );
    let client_id = "client-1";

    let _responses = session.on_message_for(
        client_id,
        Arc::new(|m: &ActionMessage| {
            tracing::info!(action = %m.action, "Received response");
        }),
    );

    // Attach the server late to exercise the startup race.
    let attach = {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let server = EchoServer {
                client: session.client_proxy(),
            };
            session.configure_server(server)
        })
    };

    session.start().await?;
    match attach.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Failed to configure server: {e}"),
        Err(e) => tracing::error!("Server attach task failed: {e}"),
    }

    let result = session
        .initialize_server(InitializeParameters {
            application_id: "loopback-demo".to_string(),
            protocol_version: "1.0.0".to_string(),
            args: None,
        })
        .await?;
    tracing::info!(server_actions = ?result.server_actions, "Handshake complete");

    session
        .initialize_session(InitializeClientSessionParameters {
            client_session_id: client_id.to_string(),
            diagram_type: "echo".to_string(),
            client_action_kinds: vec!["response".to_string()],
            args: None,
        })
        .await?;

    session.send_message(ActionMessage::new(
        client_id,
        json!({ "kind": "request", "payload": "hello" }),
    ))?;
    session.send_message(ActionMessage::new(client_id, json!({ "kind": "cancel" })))?;

    session
        .dispose_session(DisposeClientSessionParameters {
            client_session_id: client_id.to_string(),
            args: None,
        })
        .await?;

    session.stop().await;
    tracing::info!(state = %session.state(), "Done");
    Ok(())
}
