//! Client session lifecycle for action links.
//!
//! Provides:
//! - `ClientSession` - Start/stop state machine racing server attachment
//!   against a startup deadline, with checked forwarding to the server
//! - `ClientState` - Lifecycle states and their legal transitions
//! - `SessionConfig` - Session id and startup timeout

pub mod config;
pub mod session;
pub mod state;

pub use config::{DEFAULT_STARTUP_TIMEOUT, SessionConfig};
pub use session::{ClientSession, SessionError};
pub use state::ClientState;
