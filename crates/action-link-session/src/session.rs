//! Client session lifecycle and message routing.

use std::{
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use action_link_core::{
    ActionMessage, AsyncGate, BindingError, ClientProxy, MessageHandler, MessageRouter,
    ServerBinding, Subscription,
    binding::{
        DisposeClientSessionParameters, InitializeClientSessionParameters, InitializeParameters,
        InitializeResult,
    },
};
use thiserror::Error;
use tokio::sync::watch;

use crate::{ClientState, SessionConfig};

/// Client session error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Client is not running (current state: {state})")]
    NotRunning { state: ClientState },
    #[error("No server configured")]
    NoServerConfigured,
    #[error("Server already configured")]
    ServerAlreadyConfigured,
    #[error("No server configured within {}ms", .0.as_millis())]
    StartupTimeout(Duration),
    #[error("Session stopped before start completed")]
    StoppedBeforeStart,
    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl SessionError {
    /// Whether the caller violated a precondition.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NotRunning { .. } | Self::NoServerConfigured | Self::ServerAlreadyConfigured
        )
    }
}

/// Mutable session fields, always mutated under one lock.
struct Core {
    state: ClientState,
    /// Binding handed to `configure_server`, not yet adopted by `start`.
    pending: Option<Arc<dyn ServerBinding>>,
    binding: Option<Arc<dyn ServerBinding>>,
    startup_timeout: Duration,
    initialize_result: Option<InitializeResult>,
}

struct Inner {
    id: String,
    core: Mutex<Core>,
    state_tx: watch::Sender<ClientState>,
    server_attached: AsyncGate<(), SessionError>,
    started: AsyncGate<(), SessionError>,
    stopped: AsyncGate<(), Infallible>,
    router: MessageRouter,
}

impl Inner {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, core: &mut Core, next: ClientState) {
        debug_assert!(
            core.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            core.state
        );
        tracing::debug!(session_id = %self.id, from = %core.state, to = %next, "State transition");
        core.state = next;
        self.state_tx.send_replace(next);
    }

    async fn race_startup(self: Arc<Self>, deadline: Duration) {
        let attached = tokio::select! {
            biased;
            _ = self.server_attached.settled() => true,
            // Settled elsewhere, i.e. by `stop`.
            _ = self.started.settled() => return,
            () = tokio::time::sleep(deadline) => false,
        };
        self.finish_startup(deadline, attached);
    }

    /// Settle the startup race. Once the deadline has fired, a server
    /// configured before this runs is dropped.
    fn finish_startup(&self, deadline: Duration, attached: bool) {
        let mut core = self.lock_core();
        if core.state != ClientState::Starting {
            return;
        }

        if !attached {
            self.server_attached.reject(SessionError::StartupTimeout(deadline));
            core.pending = None;
            tracing::warn!(
                session_id = %self.id,
                timeout = ?deadline,
                "No server configured before startup deadline"
            );
            self.transition(&mut core, ClientState::StartFailed);
            self.started.reject(SessionError::StartupTimeout(deadline));
            return;
        }

        let Some(binding) = core.pending.take() else {
            self.transition(&mut core, ClientState::StartFailed);
            self.started.reject(SessionError::NoServerConfigured);
            return;
        };
        core.binding = Some(binding);
        self.transition(&mut core, ClientState::Running);
        self.started.resolve(());
        tracing::info!(session_id = %self.id, "Client session running");
    }

    async fn teardown(self: Arc<Self>, binding: Arc<dyn ServerBinding>) {
        // Own task so a panicking backend cannot skip the final transition.
        let shutdown = tokio::spawn(async move { binding.shutdown().await });
        match shutdown.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.id, error = %e, "Server shutdown failed");
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Server shutdown aborted");
            }
        }

        let mut core = self.lock_core();
        self.finish_stop(&mut core);
    }

    fn finish_stop(&self, core: &mut Core) {
        self.transition(core, ClientState::Stopped);
        self.stopped.resolve(());
        tracing::info!(session_id = %self.id, "Client session stopped");
    }
}

/// Client endpoint of an action link.
///
/// Owns the lifecycle state, the attached [`ServerBinding`] and the handler
/// registry. Cloning yields another handle to the same session; every method
/// is safe to call from independent tasks.
///
/// # Example
/// ```ignore
/// let session = ClientSession::new("editor-1");
/// session.configure_server(binding)?;
/// session.start().await?;
/// session.send_message(message)?;
/// session.stop().await;
/// ```
#[derive(Clone)]
pub struct ClientSession {
    inner: Arc<Inner>,
}

impl ClientSession {
    /// Create a session with the default startup timeout.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(SessionConfig::new(id))
    }

    /// Create a session from a config.
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(ClientState::Initial);
        Self {
            inner: Arc::new(Inner {
                id: config.id,
                core: Mutex::new(Core {
                    state: ClientState::Initial,
                    pending: None,
                    binding: None,
                    startup_timeout: config.startup_timeout,
                    initialize_result: None,
                }),
                state_tx,
                server_attached: AsyncGate::new(),
                started: AsyncGate::new(),
                stopped: AsyncGate::new(),
                router: MessageRouter::new(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.inner.lock_core().state
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.inner.state_tx.subscribe()
    }

    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        self.inner.lock_core().startup_timeout
    }

    /// Change the deadline used by future calls to [`start`](Self::start).
    ///
    /// A start already in flight keeps its original deadline.
    pub fn set_startup_timeout(&self, timeout: Duration) {
        self.inner.lock_core().startup_timeout = timeout;
    }

    /// Attach the backend this session delegates to.
    ///
    /// Only the first attachment counts. Calls made after the startup
    /// deadline fired or after `stop` are ignored, including a call that
    /// lands between the deadline firing and the session settling on
    /// `StartFailed`.
    ///
    /// # Errors
    /// Returns `ServerAlreadyConfigured` if the session is already running.
    pub fn configure_server<B>(&self, binding: B) -> Result<(), SessionError>
    where
        B: ServerBinding + 'static,
    {
        let mut core = self.inner.lock_core();
        if core.state == ClientState::Running {
            return Err(SessionError::ServerAlreadyConfigured);
        }
        if self.inner.server_attached.is_settled() {
            tracing::debug!(
                session_id = %self.inner.id,
                state = %core.state,
                "Ignoring server configured after attachment settled"
            );
            return Ok(());
        }

        core.pending = Some(Arc::new(binding));
        self.inner.server_attached.resolve(());
        tracing::debug!(session_id = %self.inner.id, "Server configured");
        Ok(())
    }

    /// Start the session and wait for a server to attach.
    ///
    /// Idempotent: only the first call starts the race against the startup
    /// deadline; every call observes the same outcome.
    ///
    /// # Errors
    /// Returns `StartupTimeout` if no server was configured in time, or
    /// `StoppedBeforeStart` if [`stop`](Self::stop) won the race.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.begin_start();
        self.inner.started.wait().await
    }

    fn begin_start(&self) {
        let deadline = {
            let mut core = self.inner.lock_core();
            if core.state != ClientState::Initial {
                return;
            }
            self.inner.transition(&mut core, ClientState::Starting);
            core.startup_timeout
        };

        tracing::info!(
            session_id = %self.inner.id,
            timeout = ?deadline,
            "Starting client session"
        );
        tokio::spawn(Arc::clone(&self.inner).race_startup(deadline));
    }

    /// Stop the session.
    ///
    /// Idempotent: the server is asked to shut down at most once and every
    /// caller returns once the session reaches `Stopped`. Shutdown failures
    /// are logged, never returned.
    pub async fn stop(&self) {
        self.begin_stop();
        let _ = self.inner.stopped.settled().await;
    }

    fn begin_stop(&self) {
        let mut core = self.inner.lock_core();
        if core.state.is_stopping_or_stopped() {
            return;
        }

        self.inner.transition(&mut core, ClientState::Stopping);
        self.inner
            .server_attached
            .reject(SessionError::StoppedBeforeStart);
        self.inner.started.reject(SessionError::StoppedBeforeStart);
        // Never adopted, so never started: dropped without a shutdown call.
        core.pending = None;

        match core.binding.take() {
            Some(binding) => {
                tokio::spawn(Arc::clone(&self.inner).teardown(binding));
            }
            None => self.inner.finish_stop(&mut core),
        }
    }

    /// Bound server, provided the session is running.
    fn checked_server(&self) -> Result<Arc<dyn ServerBinding>, SessionError> {
        let core = self.inner.lock_core();
        if core.state != ClientState::Running {
            return Err(SessionError::NotRunning { state: core.state });
        }
        core.binding.clone().ok_or(SessionError::NoServerConfigured)
    }

    /// Perform the initial server handshake.
    ///
    /// # Errors
    /// Returns a usage error if not running, or the server's failure.
    pub async fn initialize_server(
        &self,
        params: InitializeParameters,
    ) -> Result<InitializeResult, SessionError> {
        let server = self.checked_server()?;
        let result = server.initialize(params).await?;
        self.inner.lock_core().initialize_result = Some(result.clone());
        Ok(result)
    }

    /// Result of the last successful [`initialize_server`](Self::initialize_server).
    #[must_use]
    pub fn initialize_result(&self) -> Option<InitializeResult> {
        self.inner.lock_core().initialize_result.clone()
    }

    /// Open a client session on the server.
    ///
    /// # Errors
    /// Returns a usage error if not running, or the server's failure.
    pub async fn initialize_session(
        &self,
        params: InitializeClientSessionParameters,
    ) -> Result<(), SessionError> {
        let server = self.checked_server()?;
        server.initialize_client_session(params).await?;
        Ok(())
    }

    /// Close a client session on the server.
    ///
    /// # Errors
    /// Returns a usage error if not running, or the server's failure.
    pub async fn dispose_session(
        &self,
        params: DisposeClientSessionParameters,
    ) -> Result<(), SessionError> {
        let server = self.checked_server()?;
        server.dispose_client_session(params).await?;
        Ok(())
    }

    /// Ask the server to shut down without stopping the session.
    ///
    /// # Errors
    /// Returns a usage error if not running, or the server's failure.
    pub async fn shutdown_server(&self) -> Result<(), SessionError> {
        let server = self.checked_server()?;
        server.shutdown().await?;
        Ok(())
    }

    /// Forward an outbound message to the server.
    ///
    /// # Errors
    /// Returns a usage error if not running; nothing is delivered then.
    pub fn send_message(&self, message: ActionMessage) -> Result<(), SessionError> {
        let server = self.checked_server()?;
        server.process(message);
        Ok(())
    }

    /// Register a handler for inbound messages.
    pub fn on_message(&self, handler: Arc<dyn MessageHandler>) -> Subscription {
        self.inner.router.add(handler)
    }

    /// Register a handler for inbound messages addressed to `client_id`.
    pub fn on_message_for(
        &self,
        client_id: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Subscription {
        self.inner.router.add_for_client(client_id, handler)
    }

    /// Deliver an inbound message to the registered handlers.
    pub fn deliver(&self, message: &ActionMessage) -> usize {
        self.inner.router.dispatch(message)
    }

    /// Handle the backend uses to deliver inbound messages.
    #[must_use]
    pub fn client_proxy(&self) -> ClientProxy {
        ClientProxy::new(self.inner.router.clone())
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
