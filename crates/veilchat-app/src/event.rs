//! Application input events.
//!
//! This module defines [`AppEvent`], the set of inputs that drive the
//! [`crate::App`] state machine.
//!
//! Events originate from two distinct sources:
//! - User input (whole lines) and system ticks.
//! - Protocol notifications translated from the underlying client.

use std::time::Duration;

use veilchat_client::Connectivity;
use veilchat_core::Message;
use veilchat_proto::{ConversationScope, Identity};

/// Events processed by the App state machine.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A line entered by the user: a `/command` or a message.
    Line(String),

    /// Periodic tick.
    Tick,

    /// Connectivity indicator changed.
    Connectivity(Connectivity),

    /// A conversation became active.
    ConversationOpened {
        /// The conversation.
        scope: ConversationScope,
    },

    /// The active conversation was closed.
    ConversationClosed,

    /// Message appended to the active conversation.
    MessageAppended(Message),

    /// Active conversation rebuilt from history.
    HistoryReplaced(Vec<Message>),

    /// History could not be loaded.
    HistoryUnavailable {
        /// Error description.
        reason: String,
    },

    /// Typing set for the active room.
    TypingChanged(Vec<Identity>),

    /// Online roster.
    RosterUpdated(Vec<Identity>),

    /// The relay connection dropped.
    ConnectionLost {
        /// What happened.
        reason: String,
    },

    /// A reconnect is pending.
    ReconnectScheduled {
        /// Retry number.
        attempt: u32,
        /// Wait before dialling.
        delay: Duration,
    },

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}
