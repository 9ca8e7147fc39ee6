//! Application layer for Veilchat
//!
//! Pure state machines and generic runtime for UI and protocol orchestration,
//! enabling deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: UI state machine (command parsing, conversation view, status)
//! - [`Bridge`]: Protocol bridge (translates App actions to Client events)
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver
//! - [`display`]: display-time decryption with placeholders

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
pub mod display;
mod driver;
mod event;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::{App, HELP};
pub use bridge::{Bridge, Command};
pub use driver::{Driver, DriverInput};
pub use event::AppEvent;
pub use runtime::Runtime;
pub use state::ConversationView;
