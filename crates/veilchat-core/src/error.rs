//! Error types for the Veilchat protocol core.
//!
//! Connection errors cover lifecycle misuse, timeouts and transport
//! failures. Message errors cover relay records that cannot become a
//! [`crate::Message`]. Neither wraps `std::io::Error`; transport failures are
//! carried as text from the driver.

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Operation needs an open connection
    #[error("connection not ready: {state:?}")]
    NotReady {
        /// State the connection is actually in
        state: ConnectionState,
    },

    /// Connection was not established within the connect timeout
    #[error("connect timeout after {elapsed:?}")]
    ConnectTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Relay did not acknowledge a graceful close in time
    #[error("close timeout after {elapsed:?}")]
    CloseTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// No credential to authenticate with
    #[error("missing credential")]
    MissingCredential,

    /// Own identity is not known yet
    #[error("missing identity")]
    MissingIdentity,

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Timeouts and transport failures are transient. Misuse of the state
    /// machine and missing configuration are not; retrying cannot fix them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::CloseTimeout { .. } | Self::Transport(_)
        )
    }
}

/// A relay record that cannot be turned into a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Neither a receiver nor a room was present
    #[error("record {id} has neither receiver nor room")]
    MissingScope {
        /// Record id
        id: u64,
    },

    /// Both a receiver and a room were present
    #[error("record {id} has both receiver and room")]
    AmbiguousScope {
        /// Record id
        id: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_errors_are_transient() {
        assert!(ConnectionError::ConnectTimeout { elapsed: Duration::from_secs(11) }.is_transient());
        assert!(ConnectionError::CloseTimeout { elapsed: Duration::from_secs(6) }.is_transient());
        assert!(ConnectionError::Transport("reset by peer".to_string()).is_transient());
    }

    #[test]
    fn misuse_is_fatal() {
        assert!(
            !ConnectionError::InvalidState { state: ConnectionState::Closed, operation: "connect" }
                .is_transient()
        );
        assert!(!ConnectionError::NotReady { state: ConnectionState::Idle }.is_transient());
        assert!(!ConnectionError::MissingCredential.is_transient());
        assert!(!ConnectionError::MissingIdentity.is_transient());
    }
}
