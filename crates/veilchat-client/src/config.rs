//! Session configuration.

use std::time::Duration;

use veilchat_core::{ConnectionConfig, DEFAULT_TYPING_WINDOW, ReconnectPolicy};
use veilchat_crypto::CipherSuite;

/// Longest message a user may compose, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// AEAD used for every conversation.
    pub suite: CipherSuite,
    /// Idle time after the last keystroke before typing stops.
    pub typing_window: Duration,
    /// Connect and close timeouts.
    pub connection: ConnectionConfig,
    /// Reconnect schedule after unexpected loss.
    pub reconnect: ReconnectPolicy,
    /// Longest accepted message, counted in `char`s.
    pub max_message_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            suite: CipherSuite::default(),
            typing_window: DEFAULT_TYPING_WINDOW,
            connection: ConnectionConfig::default(),
            reconnect: ReconnectPolicy::default(),
            max_message_chars: MAX_MESSAGE_CHARS,
        }
    }
}
