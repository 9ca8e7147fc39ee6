//! Client events and actions.

use std::{fmt, time::Duration};

use veilchat_core::Message;
use veilchat_proto::{ClientFrame, ConversationScope, Identity, MessageRecord};

/// Token for one relay connection of one conversation activation.
///
/// Issued fresh for every connection the client dials, including
/// reconnects. Transport and history results are tagged with the view that
/// requested them; anything tagged with a view that is no longer current is
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Connectivity indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// No conversation open.
    Offline,
    /// Dialling the relay (or waiting for the previous connection to close).
    Connecting,
    /// Connected; messages can be sent.
    Online,
    /// Connection lost; a retry is scheduled.
    Reconnecting {
        /// Retry number, starting at 1.
        attempt: u32,
    },
    /// Connection lost and retries exhausted.
    Lost,
}

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle and frames, tagged with their view
/// - Delivering history fetch results, tagged with their view
/// - Driving time forward via ticks
/// - Forwarding application intents (open conversation, send, typing)
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual clock) environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Make `scope` the active conversation, replacing any previous one.
    OpenConversation {
        /// Conversation to open.
        scope: ConversationScope,
    },

    /// Close the active conversation.
    CloseConversation,

    /// Transport for `view` finished its opening handshake.
    TransportOpened {
        /// Connection that opened.
        view: ViewId,
    },

    /// Transport for `view` closed.
    TransportClosed {
        /// Connection that closed.
        view: ViewId,
        /// Close reason, if the relay gave one.
        reason: String,
    },

    /// Transport for `view` failed.
    TransportFailed {
        /// Connection that failed.
        view: ViewId,
        /// Error description.
        reason: String,
    },

    /// Text frame received on `view`.
    FrameReceived {
        /// Connection the frame arrived on.
        view: ViewId,
        /// Raw JSON text.
        text: String,
    },

    /// History fetch for `view` succeeded.
    HistoryLoaded {
        /// View that requested the history.
        view: ViewId,
        /// Records in server order.
        records: Vec<MessageRecord>,
    },

    /// History fetch for `view` failed.
    HistoryFailed {
        /// View that requested the history.
        view: ViewId,
        /// Error description.
        reason: String,
    },

    /// Application wants to send a message in the active conversation.
    SendMessage {
        /// Message plaintext.
        plaintext: String,
    },

    /// The local user typed in the composer.
    LocalInput,

    /// Time tick for timeout processing.
    ///
    /// The caller should send ticks periodically to allow the client to
    /// expire typing, time out connections and fire scheduled reconnects.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Dial the relay for `view`.
    OpenTransport {
        /// New connection's view.
        view: ViewId,
        /// Bearer credential for the `token` query parameter.
        credential: String,
    },

    /// Gracefully close the transport for `view`.
    CloseTransport {
        /// Connection to close.
        view: ViewId,
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },

    /// Drop the transport for `view` without a closing handshake.
    AbortTransport {
        /// Connection to drop.
        view: ViewId,
        /// Why it is being dropped.
        reason: String,
    },

    /// Send a frame on `view`.
    Send {
        /// Connection to send on.
        view: ViewId,
        /// Frame to encode and send.
        frame: ClientFrame,
    },

    /// Fetch stored history for `scope` and report it tagged with `view`.
    FetchHistory {
        /// View requesting the history.
        view: ViewId,
        /// Conversation to fetch.
        scope: ConversationScope,
    },

    /// A conversation became active; previous view state is gone.
    ConversationOpened {
        /// The new active conversation.
        scope: ConversationScope,
    },

    /// The active conversation was closed.
    ConversationClosed,

    /// A streamed message was appended to the active conversation.
    MessageAppended(Message),

    /// The active conversation's log was rebuilt from history.
    HistoryReplaced(Vec<Message>),

    /// History could not be fetched; streamed messages keep flowing.
    HistoryUnavailable {
        /// Error description.
        reason: String,
    },

    /// Identities typing in the active room (self excluded).
    TypingChanged(Vec<Identity>),

    /// Identities currently connected to the relay.
    RosterUpdated(Vec<Identity>),

    /// Connectivity indicator changed.
    ConnectivityChanged(Connectivity),

    /// The relay connection was lost unexpectedly.
    ConnectionLost {
        /// What happened.
        reason: String,
    },

    /// A reconnect will be attempted after `delay`.
    ReconnectScheduled {
        /// Retry number, starting at 1.
        attempt: u32,
        /// Wait before dialling.
        delay: Duration,
    },
}
