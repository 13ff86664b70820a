//! One-shot completion primitive shared by many waiters.

use std::sync::OnceLock;

use tokio::sync::Notify;

/// Single-assignment result cell that any number of tasks can await.
///
/// The first call to [`resolve`](Self::resolve) or [`reject`](Self::reject)
/// settles the gate; later calls are ignored. Waiters are woken by
/// notification, never by polling, and every waiter observes the same
/// stored outcome.
pub struct AsyncGate<T, E> {
    outcome: OnceLock<Result<T, E>>,
    notify: Notify,
}

impl<T, E> Default for AsyncGate<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> AsyncGate<T, E> {
    /// Create an unsettled gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            notify: Notify::new(),
        }
    }

    /// Complete the gate successfully.
    ///
    /// Returns `false` if the gate was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Complete the gate with a failure.
    ///
    /// Returns `false` if the gate was already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<T, E>) -> bool {
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Whether the gate has been resolved or rejected.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Borrow the stored outcome, if any.
    #[must_use]
    pub fn peek(&self) -> Option<&Result<T, E>> {
        self.outcome.get()
    }

    /// Suspend until the gate settles, then borrow the outcome.
    pub async fn settled(&self) -> &Result<T, E> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a settle between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl<T: Clone, E: Clone> AsyncGate<T, E> {
    /// Wait for the outcome and return a copy of it.
    ///
    /// # Errors
    /// Returns the error the gate was rejected with.
    pub async fn wait(&self) -> Result<T, E> {
        self.settled().await.clone()
    }
}

impl<T, E> std::fmt::Debug for AsyncGate<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.outcome.get() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("AsyncGate").field("status", &status).finish()
    }
}
