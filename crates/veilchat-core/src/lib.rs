//! Veilchat protocol core.
//!
//! Pure state machines for one chat session. Nothing in this crate performs
//! I/O: methods take the current time as input and return actions or
//! outcomes for a driver to carry out.
//!
//! - [`connection`]: relay connection lifecycle with connect and close
//!   timeouts
//! - [`backoff`]: bounded exponential reconnect schedule
//! - [`conversation`]: ordered, deduplicated, scope-filtered message log
//! - [`typing`]: local typing debounce and remote typing snapshots
//! - [`env`]: time and randomness abstraction for deterministic tests

pub mod backoff;
pub mod connection;
pub mod conversation;
pub mod env;
pub mod error;
pub mod message;
pub mod typing;

pub use backoff::{Backoff, ReconnectPolicy};
pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionParams, ConnectionState,
    NORMAL_CLOSURE,
};
pub use conversation::{ConversationState, IngestOutcome};
pub use env::Environment;
pub use error::{ConnectionError, MessageError};
pub use message::{Message, MessageId};
pub use typing::{DEFAULT_TYPING_WINDOW, PresenceTyping, TypingSignal};
