//! Relay connection state machine.
//!
//! Tracks one WebSocket session to the relay for one active conversation.
//! Uses the action pattern: methods take time as input and return actions for
//! the driver to execute, so the lifecycle is testable without a socket.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ connect ┌────────────┐ opened ┌──────┐
//! │ Idle │────────>│ Connecting │───────>│ Open │
//! └──────┘         └────────────┘        └──────┘
//!                        │ begin_close       │ begin_close
//!                        ↓                   ↓
//!                   ┌─────────┐  closed  ┌────────┐
//!                   │ Closing │─────────>│ Closed │
//!                   └─────────┘          └────────┘
//! ```
//!
//! Any unexpected closure or transport error moves `Connecting`, `Open` or
//! `Closing` straight to `Closed`. `Closed` is terminal: reconnecting means
//! building a new [`Connection`].

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use tracing::debug;
use veilchat_proto::{ConversationScope, Identity};

use crate::error::ConnectionError;

/// WebSocket close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Time allowed for the relay to accept a new connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for a graceful close to be acknowledged.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Actions returned by the connection state machine.
///
/// The driver executes these against the real transport:
/// - `Open`: dial the relay with the credential
/// - `Close`: send a close frame and wait for the relay to finish
/// - `Abort`: drop the transport immediately
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Dial the relay
    Open {
        /// Bearer credential for the `token` query parameter
        credential: String,
    },

    /// Close the transport gracefully
    Close {
        /// WebSocket close code
        code: u16,
        /// Human readable reason
        reason: String,
    },

    /// Abandon the transport without a closing handshake
    Abort {
        /// Why the transport is being abandoned
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet dialled
    Idle,
    /// Dialled, waiting for the transport to open
    Connecting,
    /// Transport open, frames flow
    Open,
    /// Graceful close requested, waiting for the transport to finish
    Closing,
    /// Finished (graceful or error); terminal
    Closed,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for the transport to open
    pub connect_timeout: Duration,
    /// Timeout for a graceful close to complete
    pub close_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { connect_timeout: DEFAULT_CONNECT_TIMEOUT, close_timeout: DEFAULT_CLOSE_TIMEOUT }
    }
}

/// Everything needed to dial the relay for one conversation.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Own identity
    pub identity: Identity,
    /// Conversation the connection serves
    pub scope: ConversationScope,
    /// Bearer credential
    pub credential: String,
}

/// Connection state machine
///
/// This is a pure state machine - no I/O, no Environment storage.
/// Time is passed as parameters to methods that need it.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Current state
    state: ConnectionState,
    /// Configuration
    config: ConnectionConfig,
    /// When the current state was entered
    entered_at: I,
    /// Conversation this connection serves, once dialled
    scope: Option<ConversationScope>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a new connection in [`ConnectionState::Idle`] state
    pub fn new(now: I, config: ConnectionConfig) -> Self {
        Self { state: ConnectionState::Idle, config, entered_at: now, scope: None }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Conversation scope this connection was dialled for.
    #[must_use]
    pub fn scope(&self) -> Option<&ConversationScope> {
        self.scope.as_ref()
    }

    /// Whether inbound frames should be dispatched.
    ///
    /// Only an open connection delivers frames; anything arriving while
    /// connecting or closing is discarded.
    #[must_use]
    pub fn accepts_frames(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Start dialling the relay.
    ///
    /// Transitions to Connecting and returns `Open { credential }`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if not in Idle state
    /// - `ConnectionError::MissingIdentity` if the identity is empty
    /// - `ConnectionError::MissingCredential` if the credential is empty
    pub fn connect(
        &mut self,
        params: ConnectionParams,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Idle {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "connect" });
        }

        if params.identity.as_str().is_empty() {
            return Err(ConnectionError::MissingIdentity);
        }

        if params.credential.is_empty() {
            return Err(ConnectionError::MissingCredential);
        }

        debug!(scope = %params.scope, "connecting");

        self.scope = Some(params.scope);
        self.transition(ConnectionState::Connecting, now);

        Ok(vec![ConnectionAction::Open { credential: params.credential }])
    }

    /// Transport reported open.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if not in Connecting state
    pub fn opened(&mut self, now: I) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "open" });
        }

        self.transition(ConnectionState::Open, now);
        Ok(())
    }

    /// Request a graceful close.
    ///
    /// From Connecting or Open, moves to Closing and returns `Close` with
    /// code 1000. An Idle connection was never dialled and goes straight to
    /// Closed with no action. Closing and Closed are left untouched.
    pub fn begin_close(&mut self, reason: &str, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.transition(ConnectionState::Closing, now);
                vec![ConnectionAction::Close { code: NORMAL_CLOSURE, reason: reason.to_string() }]
            },
            ConnectionState::Idle => {
                self.transition(ConnectionState::Closed, now);
                vec![]
            },
            ConnectionState::Closing | ConnectionState::Closed => vec![],
        }
    }

    /// Transport reported closed.
    ///
    /// Returns `true` if the closure was expected (a graceful close was in
    /// progress) and `false` if the relay or network dropped the connection.
    pub fn transport_closed(&mut self, now: I) -> bool {
        let expected = self.state == ConnectionState::Closing;
        if self.state != ConnectionState::Closed {
            self.transition(ConnectionState::Closed, now);
        }
        expected
    }

    /// Transport reported an error; the connection is finished.
    pub fn transport_failed(&mut self, now: I) {
        if self.state != ConnectionState::Closed {
            self.transition(ConnectionState::Closed, now);
        }
    }

    /// Check that frames can be sent.
    ///
    /// Nothing is ever queued: a send attempted in any other state fails.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotReady` if not in Open state
    pub fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Open {
            Ok(())
        } else {
            Err(ConnectionError::NotReady { state: self.state })
        }
    }

    /// Elapsed time in the current state, if its timeout is exceeded.
    #[must_use]
    pub fn check_timeout(&self, now: I) -> Option<Duration> {
        let elapsed = now - self.entered_at;

        let timeout = match self.state {
            ConnectionState::Connecting => self.config.connect_timeout,
            ConnectionState::Closing => self.config.close_timeout,
            _ => return None,
        };

        if elapsed > timeout { Some(elapsed) } else { None }
    }

    /// Process periodic maintenance.
    ///
    /// A connection stuck in Connecting or Closing past its timeout is forced
    /// to Closed. Returns the `Abort` the driver must execute together with
    /// the timeout error describing it.
    pub fn tick(&mut self, now: I) -> Option<(ConnectionAction, ConnectionError)> {
        let elapsed = self.check_timeout(now)?;

        let error = match self.state {
            ConnectionState::Connecting => ConnectionError::ConnectTimeout { elapsed },
            _ => ConnectionError::CloseTimeout { elapsed },
        };

        debug!(state = ?self.state, ?elapsed, "connection timed out");
        self.transition(ConnectionState::Closed, now);

        Some((ConnectionAction::Abort { reason: error.to_string() }, error))
    }

    fn transition(&mut self, state: ConnectionState, now: I) {
        self.state = state;
        self.entered_at = now;
    }
}
