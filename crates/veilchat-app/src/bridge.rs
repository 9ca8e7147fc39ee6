//! Protocol-to-Application translation layer.
//!
//! The [`Bridge`] wraps the low-level [`veilchat_client::Client`] and adapts
//! it to the high-level application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts high-level [`crate::AppAction`] into client events.
//! - Accumulates outgoing [`Command`]s (dial, close, send, history fetch) to
//!   be executed by the driver in the next I/O cycle.
//! - Interprets results from the client and converts them back into
//!   [`crate::AppEvent`]s to update the UI.
//! - Manages time ticks generically to support both real-time execution and
//!   deterministic simulation.

use veilchat_client::{
    Client, ClientAction, ClientConfig, ClientError, ClientEvent, KeyStore, ViewId,
};
use veilchat_core::env::Environment;
use veilchat_proto::{ClientFrame, ConversationScope, Identity};

use crate::{AppAction, AppEvent};

/// I/O the driver performs on the bridge's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dial the relay for `view`.
    Open {
        /// Connection token.
        view: ViewId,
        /// Bearer credential.
        credential: String,
    },
    /// Close `view` gracefully.
    Close {
        /// Connection token.
        view: ViewId,
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Drop `view` immediately.
    Abort {
        /// Connection token.
        view: ViewId,
    },
    /// Send a frame on `view`.
    Send {
        /// Connection token.
        view: ViewId,
        /// Frame to encode.
        frame: ClientFrame,
    },
    /// Fetch history for `scope`, reporting back tagged with `view`.
    FetchHistory {
        /// Requesting view.
        view: ViewId,
        /// Conversation.
        scope: ConversationScope,
    },
}

/// Bridge between App and Client protocol logic.
///
/// Generic over Environment to support both production and simulation.
/// The Instant type is determined by the Environment's associated type.
pub struct Bridge<E: Environment> {
    client: Client<E>,
    outgoing: Vec<Command>,
}

impl<E: Environment> Bridge<E> {
    /// Create a new Bridge for `identity`.
    pub fn new(env: E, identity: Identity, credential: String, config: ClientConfig) -> Self {
        let client = Client::new(env, identity, credential, config);
        Self { client, outgoing: Vec::new() }
    }

    /// Own identity.
    pub fn identity(&self) -> &Identity {
        self.client.identity()
    }

    /// Session key store, for display-time decryption.
    pub fn keys(&self) -> &KeyStore {
        self.client.keys()
    }

    /// Underlying client, for inspection.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        let event = match action {
            AppAction::OpenConversation { scope } => ClientEvent::OpenConversation { scope },
            AppAction::CloseConversation => ClientEvent::CloseConversation,
            AppAction::SendMessage { plaintext } => ClientEvent::SendMessage { plaintext },
            AppAction::LocalInput => ClientEvent::LocalInput,
            AppAction::Render | AppAction::Quit => return vec![],
        };

        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    /// Handle a transport or history report from the driver.
    pub fn handle_network(&mut self, event: ClientEvent<E::Instant>) -> Vec<AppEvent> {
        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<AppEvent> {
        let result = self.client.handle(ClientEvent::Tick { now });
        self.handle_client_result(result)
    }

    /// Session teardown: close the connection and wipe keys.
    pub fn shutdown(&mut self) -> Vec<AppEvent> {
        let actions = self.client.shutdown();
        self.process_client_actions(actions)
    }

    /// Take pending outgoing commands.
    pub fn take_outgoing(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outgoing)
    }

    fn handle_client_result(
        &mut self,
        result: Result<Vec<ClientAction>, ClientError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_client_actions(actions),
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    fn process_client_actions(&mut self, actions: Vec<ClientAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ClientAction::OpenTransport { view, credential } => {
                    self.outgoing.push(Command::Open { view, credential });
                },
                ClientAction::CloseTransport { view, code, reason } => {
                    self.outgoing.push(Command::Close { view, code, reason });
                },
                ClientAction::AbortTransport { view, reason } => {
                    tracing::debug!(%view, reason, "aborting transport");
                    self.outgoing.push(Command::Abort { view });
                },
                ClientAction::Send { view, frame } => {
                    self.outgoing.push(Command::Send { view, frame });
                },
                ClientAction::FetchHistory { view, scope } => {
                    self.outgoing.push(Command::FetchHistory { view, scope });
                },
                ClientAction::ConversationOpened { scope } => {
                    events.push(AppEvent::ConversationOpened { scope });
                },
                ClientAction::ConversationClosed => events.push(AppEvent::ConversationClosed),
                ClientAction::MessageAppended(message) => {
                    events.push(AppEvent::MessageAppended(message));
                },
                ClientAction::HistoryReplaced(messages) => {
                    events.push(AppEvent::HistoryReplaced(messages));
                },
                ClientAction::HistoryUnavailable { reason } => {
                    events.push(AppEvent::HistoryUnavailable { reason });
                },
                ClientAction::TypingChanged(typing) => events.push(AppEvent::TypingChanged(typing)),
                ClientAction::RosterUpdated(online) => events.push(AppEvent::RosterUpdated(online)),
                ClientAction::ConnectivityChanged(connectivity) => {
                    events.push(AppEvent::Connectivity(connectivity));
                },
                ClientAction::ConnectionLost { reason } => {
                    events.push(AppEvent::ConnectionLost { reason });
                },
                ClientAction::ReconnectScheduled { attempt, delay } => {
                    events.push(AppEvent::ReconnectScheduled { attempt, delay });
                },
            }
        }

        events
    }
}
