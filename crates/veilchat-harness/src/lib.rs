//! Deterministic simulation harness for Veilchat protocol testing.
//!
//! In-memory implementations of the Environment and Driver traits for
//! deterministic, reproducible testing: a virtual clock, seeded randomness
//! and a relay that behaves like the production one, connection ordering
//! quirks included.
//!
//! # World Testing
//!
//! [`SimWorld`] runs several complete client stacks (App, Bridge, Client)
//! against one [`SimRelay`]. Scenarios type lines, advance time and drop
//! connections, then inspect what each client rendered.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the client
//! invariants.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_relay;
pub mod world;

pub use invariants::{
    ClientSnapshot, Invariant, InvariantRegistry, InvariantResult, KeyConvergence,
    MessageSnapshot, MessagesMatchScope, NoDuplicateMessages, SingleConnection, SystemSnapshot,
    TypingExcludesSelf, Violation,
};
pub use sim_driver::{DriverLog, SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_relay::{RelayError, SessionId, SimRelay};
pub use world::{ClientIndex, SimWorld};
