//! Transport-agnostic building blocks for client/server action links.
//!
//! This crate provides:
//! - `AsyncGate` - One-shot completion shared by many waiters
//! - `ActionMessage` - Opaque action envelope tagged with a client id
//! - `ServerBinding` - Trait a backend implements to serve a session
//! - `MessageRouter` - Snapshot fan-out of inbound messages to handlers

pub mod binding;
pub mod gate;
pub mod message;
pub mod router;

pub use binding::{BindingError, ServerBinding};
pub use gate::AsyncGate;
pub use message::ActionMessage;
pub use router::{ClientProxy, MessageHandler, MessageRouter, Subscription};
