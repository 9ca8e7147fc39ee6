//! Terminal client for Veilchat
//!
//! A thin shell over [`veilchat_app::Driver`] that provides line-oriented
//! terminal I/O. All orchestration logic lives in the generic
//! [`veilchat_app::Runtime`].
//!
//! This crate only handles arguments, stdin/stdout and the real network.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod args;
pub mod env;
pub mod screen;
pub mod terminal;

pub use args::Args;
pub use env::SystemEnv;
pub use screen::Screen;
pub use terminal::{TerminalDriver, TerminalError};
pub use veilchat_app::{App, AppAction, AppEvent, Bridge, Driver, Runtime};
