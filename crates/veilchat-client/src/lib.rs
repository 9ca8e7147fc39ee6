//! Client
//!
//! Action-based session client for Veilchat. Owns the key store, the relay
//! connection for the active conversation, the conversation log and typing
//! presence, and wires them together.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`veilchat_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! Every transport and history request carries the [`ViewId`] of the
//! connection that issued it. Results for any other view are dropped, which
//! is what keeps a slow history response or a late frame from a closed
//! connection out of the conversation that replaced it.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine for one session
//! - [`KeyStore`]: Session-owned conversation key cache
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::spawn_session`]: WebSocket session to the relay
//! - [`history::HistoryClient`]: REST history fetch

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod event;
mod key_store;

#[cfg(feature = "transport")]
pub mod history;
#[cfg(feature = "transport")]
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, MAX_MESSAGE_CHARS};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, Connectivity, ViewId};
pub use key_store::KeyStore;
pub use veilchat_core::env::Environment;
