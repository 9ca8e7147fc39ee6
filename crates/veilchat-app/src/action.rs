//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

use veilchat_proto::ConversationScope;

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Switch to a conversation.
    OpenConversation {
        /// Conversation to open.
        scope: ConversationScope,
    },

    /// Leave the active conversation.
    CloseConversation,

    /// Send a message in the active conversation.
    SendMessage {
        /// Message text.
        plaintext: String,
    },

    /// The user is typing.
    LocalInput,
}
