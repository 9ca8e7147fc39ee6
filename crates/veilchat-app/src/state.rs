//! Observable application state types.
//!
//! This module defines the data structures that represent the application's
//! current view of the world, such as [`ConversationView`].
//!
//! These structures serve as the "View Model" for the application. Messages
//! are kept sealed; plaintext only exists at render time (see
//! [`crate::display`]).

use veilchat_core::Message;
use veilchat_proto::{ConversationScope, Identity};

/// The conversation on screen.
#[derive(Debug, Clone)]
pub struct ConversationView {
    /// Conversation scope.
    pub scope: ConversationScope,
    /// Messages in arrival order, still encrypted.
    pub messages: Vec<Message>,
    /// Identities typing in this room (self excluded).
    pub typing: Vec<Identity>,
    /// Last history failure. Cleared by a successful load.
    pub history_error: Option<String>,
}

impl ConversationView {
    /// Create empty view.
    pub fn new(scope: ConversationScope) -> Self {
        Self { scope, messages: Vec::new(), typing: Vec::new(), history_error: None }
    }

    /// Header line for the conversation.
    pub fn title(&self, me: &Identity) -> String {
        match &self.scope {
            ConversationScope::Private(pair) => match pair.other(me) {
                Some(other) => format!("@{other}"),
                None => self.scope.to_string(),
            },
            ConversationScope::Group(room_id) => format!("#room-{room_id}"),
        }
    }
}
