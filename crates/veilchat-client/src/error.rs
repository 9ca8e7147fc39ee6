//! Client error types.

use thiserror::Error;
use veilchat_core::ConnectionState;
use veilchat_crypto::DecryptError;
use veilchat_proto::ConversationScope;

/// Errors surfaced to the caller of [`crate::Client::handle`].
///
/// None of these end the session; the caller shows them and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No conversation is open.
    #[error("no active conversation")]
    NoActiveConversation,

    /// A private conversation was requested that does not include us.
    #[error("not a participant of {scope}")]
    NotAParticipant {
        /// The rejected scope.
        scope: ConversationScope,
    },

    /// The conversation key has not been resolved.
    #[error("conversation key not ready")]
    KeyNotReady,

    /// The relay connection is not open; nothing is queued.
    #[error("transport not open ({state:?})")]
    TransportNotOpen {
        /// Connection state at the time of the attempt.
        state: ConnectionState,
    },

    /// Refusing to send a blank message.
    #[error("message is empty")]
    EmptyMessage,

    /// The message exceeds the configured length limit.
    #[error("message is {actual} characters long, the limit is {max}")]
    MessageTooLong {
        /// Configured limit.
        max: usize,
        /// Length of the rejected message.
        actual: usize,
    },

    /// Typing presence only exists in group rooms.
    #[error("typing indicators are only available in group rooms")]
    NotAGroupConversation,

    /// A stored message could not be opened.
    #[error("decryption failed: {0}")]
    Decrypt(#[from] DecryptError),
}
