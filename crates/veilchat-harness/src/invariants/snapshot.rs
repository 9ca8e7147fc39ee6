//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use veilchat_app::App;
use veilchat_client::KeyStore;
use veilchat_core::{Message, MessageId};
use veilchat_proto::{ConversationScope, Identity};

/// Snapshot of the entire system state.
///
/// Contains observable state from one or more clients for invariant checking.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }
}

/// What an invariant needs to know about one displayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSnapshot {
    /// Server id.
    pub id: MessageId,
    /// Author.
    pub sender: Identity,
    /// Conversation the record belongs to.
    pub scope: ConversationScope,
}

impl From<&Message> for MessageSnapshot {
    fn from(message: &Message) -> Self {
        Self { id: message.id(), sender: message.sender().clone(), scope: message.scope().clone() }
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Own identity.
    pub identity: Identity,
    /// Conversation on screen. `None` if none is open.
    pub scope: Option<ConversationScope>,
    /// Messages on screen, in display order.
    pub messages: Vec<MessageSnapshot>,
    /// Identities shown as typing.
    pub typing: Vec<Identity>,
    /// Relay sessions the client's driver holds open.
    pub open_sessions: usize,
    /// First bytes of the active conversation key. `None` until resolved.
    pub key_fingerprint: Option<[u8; 8]>,
}

impl ClientSnapshot {
    /// Create a new client snapshot with nothing open.
    pub fn new(identity: impl Into<Identity>) -> Self {
        Self {
            identity: identity.into(),
            scope: None,
            messages: Vec::new(),
            typing: Vec::new(),
            open_sessions: 0,
            key_fingerprint: None,
        }
    }

    /// Capture what `app` shows, plus the driver's session count.
    pub fn from_app(app: &App, keys: &KeyStore, open_sessions: usize) -> Self {
        let mut snapshot = Self::new(app.identity().clone()).with_open_sessions(open_sessions);

        if let Some(view) = app.conversation() {
            snapshot.scope = Some(view.scope.clone());
            snapshot.messages = view.messages.iter().map(MessageSnapshot::from).collect();
            snapshot.typing.clone_from(&view.typing);
            snapshot.key_fingerprint = keys.get(&view.scope).map(|key| {
                let mut fingerprint = [0u8; 8];
                fingerprint.copy_from_slice(&key.as_bytes()[..8]);
                fingerprint
            });
        }

        snapshot
    }

    /// Set the open conversation.
    #[must_use]
    pub fn with_scope(mut self, scope: ConversationScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Add a displayed message.
    #[must_use]
    pub fn with_message(mut self, id: u64, sender: impl Into<Identity>, scope: ConversationScope) -> Self {
        self.messages.push(MessageSnapshot { id: MessageId(id), sender: sender.into(), scope });
        self
    }

    /// Set the typing list.
    #[must_use]
    pub fn with_typing(mut self, typing: Vec<Identity>) -> Self {
        self.typing = typing;
        self
    }

    /// Set the number of open relay sessions.
    #[must_use]
    pub fn with_open_sessions(mut self, open_sessions: usize) -> Self {
        self.open_sessions = open_sessions;
        self
    }

    /// Set the key fingerprint.
    #[must_use]
    pub fn with_key_fingerprint(mut self, fingerprint: [u8; 8]) -> Self {
        self.key_fingerprint = Some(fingerprint);
        self
    }
}
