//! Display-time decryption.
//!
//! Messages travel and rest as ciphertext. They are opened here, right before
//! rendering, with the session's [`KeyStore`]. A message that cannot be opened
//! is shown as a placeholder; it never fails the render.

use chrono::{DateTime, Utc};
use veilchat_client::{ClientError, KeyStore};
use veilchat_core::{Message, MessageId};
use veilchat_proto::Identity;

/// Shown while the conversation key has not been resolved.
pub const WAITING_FOR_KEY: &str = "[Waiting for key...]";

/// Shown when authentication or decoding fails.
pub const DECRYPTION_FAILED: &str = "[Encrypted Message: Decryption Failed]";

/// One renderable message line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Message id.
    pub id: MessageId,
    /// Author.
    pub sender: Identity,
    /// Plaintext or placeholder.
    pub text: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether we sent it.
    pub own: bool,
}

/// Plaintext of `message`, or the placeholder describing why not.
pub fn display_text(keys: &KeyStore, message: &Message) -> String {
    match keys.open(message) {
        Ok(text) => text,
        Err(ClientError::KeyNotReady) => WAITING_FOR_KEY.to_string(),
        Err(error) => {
            tracing::debug!(id = %message.id(), %error, "cannot open message");
            DECRYPTION_FAILED.to_string()
        },
    }
}

/// Open every message for rendering.
pub fn display_messages(keys: &KeyStore, me: &Identity, messages: &[Message]) -> Vec<DisplayMessage> {
    messages
        .iter()
        .map(|message| DisplayMessage {
            id: message.id(),
            sender: message.sender().clone(),
            text: display_text(keys, message),
            timestamp: message.timestamp(),
            own: message.sender() == me,
        })
        .collect()
}
