//! Fan-out of inbound action messages to registered handlers.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::ActionMessage;

/// Receiver of inbound action messages.
///
/// Implemented for every `Fn(&ActionMessage)` closure that is `Send + Sync`.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &ActionMessage);

    /// Whether this handler wants `message`. Dispatch skips handlers that
    /// decline it.
    fn accepts(&self, _message: &ActionMessage) -> bool {
        true
    }
}

impl<F> MessageHandler for F
where
    F: Fn(&ActionMessage) + Send + Sync,
{
    fn handle(&self, message: &ActionMessage) {
        self(message);
    }
}

type HandlerList = RwLock<Vec<Arc<dyn MessageHandler>>>;

/// Registry of message handlers.
///
/// Handlers are compared by identity (the `Arc` allocation), so adding the
/// same handler twice keeps a single registration. Cloning the router
/// yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct MessageRouter {
    handlers: Arc<HandlerList>,
}

impl MessageRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler and return the capability to remove it again.
    pub fn add(&self, handler: Arc<dyn MessageHandler>) -> Subscription {
        {
            let mut handlers = self
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
                handlers.push(Arc::clone(&handler));
            }
        }
        Subscription {
            handlers: Arc::downgrade(&self.handlers),
            handler,
        }
    }

    /// Register a handler that only sees messages for `client_id`.
    pub fn add_for_client(
        &self,
        client_id: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Subscription {
        self.add(Arc::new(ClientFilter {
            client_id: client_id.into(),
            inner: handler,
        }))
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a message to every handler registered when dispatch begins.
    ///
    /// Iterates over a snapshot, so handlers may add or remove registrations
    /// (including their own) without affecting this round. Returns the
    /// number of handlers that accepted the message; handlers scoped to
    /// another client do not count.
    pub fn dispatch(&self, message: &ActionMessage) -> usize {
        let snapshot: Vec<Arc<dyn MessageHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for handler in snapshot.iter().filter(|h| h.accepts(message)) {
            handler.handle(message);
            delivered += 1;
        }

        if delivered == 0 {
            tracing::warn!(
                client_id = %message.client_id,
                kind = message.kind().unwrap_or("<none>"),
                registered = snapshot.len(),
                "No message handler accepted message; dropping it"
            );
        }
        delivered
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("handlers", &self.len())
            .finish()
    }
}

/// Handle that unregisters exactly one handler.
///
/// Dropping it leaves the handler registered; call
/// [`dispose`](Self::dispose) to remove it. Holds only a weak reference to
/// the router.
pub struct Subscription {
    handlers: Weak<HandlerList>,
    handler: Arc<dyn MessageHandler>,
}

impl Subscription {
    /// Remove the handler. Returns `false` if it was already gone.
    pub fn dispose(&self) -> bool {
        let Some(handlers) = self.handlers.upgrade() else {
            return false;
        };
        let mut handlers = handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, &self.handler));
        handlers.len() != before
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &(self.handlers.strong_count() > 0))
            .finish()
    }
}

struct ClientFilter {
    client_id: String,
    inner: Arc<dyn MessageHandler>,
}

impl MessageHandler for ClientFilter {
    fn handle(&self, message: &ActionMessage) {
        if self.accepts(message) {
            self.inner.handle(message);
        }
    }

    fn accepts(&self, message: &ActionMessage) -> bool {
        message.client_id == self.client_id && self.inner.accepts(message)
    }
}

/// Backend-facing handle for delivering inbound messages to a client.
///
/// Cheap to clone. It references the message registry only, never the
/// session that owns the binding.
#[derive(Clone, Debug)]
pub struct ClientProxy {
    router: MessageRouter,
}

impl ClientProxy {
    #[must_use]
    pub const fn new(router: MessageRouter) -> Self {
        Self { router }
    }

    /// Deliver a message from the server to all client handlers.
    pub fn process(&self, message: &ActionMessage) {
        self.router.dispatch(message);
    }
}
