//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use veilchat_client::{ClientEvent, KeyStore};

use crate::{App, AppEvent, Command};

/// One input delivered by the driver.
#[derive(Debug, Clone)]
pub enum DriverInput<I> {
    /// User input or UI event.
    App(AppEvent),
    /// Transport or history report, tagged with its view.
    Network(ClientEvent<I>),
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the production CLI and simulation.
///
/// # Implementations
///
/// - **CLI**: stdin lines, WebSocket sessions and REST history via tokio
/// - **Simulation**: scripted input against an in-memory relay
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Poll for the next input.
    ///
    /// Returns `None` if nothing arrived before the driver's tick interval.
    fn poll_input(
        &mut self,
    ) -> impl Future<Output = Result<Option<DriverInput<Self::Instant>>, Self::Error>> + Send;

    /// Carry out a transport or history command.
    ///
    /// Results come back later through [`poll_input`](Driver::poll_input) as
    /// [`DriverInput::Network`] events.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that should end the session;
    /// per-connection failures are reported as events instead.
    fn execute(&mut self, command: Command) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// `keys` opens messages for display.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App, keys: &KeyStore) -> Result<(), Self::Error>;

    /// Stop all connections and clean up resources.
    fn stop(&mut self);
}
