//! Client session lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`ClientSession`](crate::ClientSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    /// Created, `start` not yet called.
    Initial,
    /// Waiting for a server to attach.
    Starting,
    /// No server attached before the startup deadline.
    StartFailed,
    /// Server attached; messages flow.
    Running,
    /// Teardown in progress.
    Stopping,
    /// Torn down. Terminal.
    Stopped,
}

impl ClientState {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initial, Self::Starting)
                | (Self::Starting, Self::Running | Self::StartFailed)
                | (
                    Self::Initial | Self::Starting | Self::StartFailed | Self::Running,
                    Self::Stopping
                )
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Whether `stop` has been requested (or completed).
    #[must_use]
    pub const fn is_stopping_or_stopped(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "Initial",
            Self::Starting => "Starting",
            Self::StartFailed => "StartFailed",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}
