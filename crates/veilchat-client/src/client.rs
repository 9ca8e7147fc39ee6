//! Client state machine.
//!
//! The `Client` is the top-level state machine for one chat session. It owns
//! the key store and exactly one active conversation view, and orchestrates
//! the relay connection, the conversation log and typing presence for it.

use std::time::Duration;

use tracing::{debug, info, trace, warn};
use veilchat_core::{
    Backoff, Connection, ConnectionAction, ConnectionParams, ConnectionState, ConversationState,
    IngestOutcome, Message, NORMAL_CLOSURE, PresenceTyping, TypingSignal, env::Environment,
};
use veilchat_proto::{
    ClientFrame, ConversationScope, Identity, MessageRecord, ProtocolError, RoomId, ServerFrame,
};

use crate::{
    config::ClientConfig,
    error::ClientError,
    event::{ClientAction, ClientEvent, Connectivity, ViewId},
    key_store::KeyStore,
};

/// Reason attached to the graceful close issued when the view is replaced.
const SWITCH_REASON: &str = "conversation switched";

/// Reason attached to the graceful close issued on explicit close.
const CLOSE_REASON: &str = "conversation closed";

/// Reconnect waiting to fire.
#[derive(Debug, Clone, Copy)]
struct PendingReconnect<I> {
    /// When the loss was detected.
    since: I,
    /// How long to wait after `since`.
    delay: Duration,
}

/// State of the active conversation.
struct ActiveView<E: Environment> {
    /// Token of the current connection.
    view: ViewId,

    /// Relay connection for this view.
    connection: Connection<E::Instant>,

    /// Ordered message log.
    conversation: ConversationState,

    /// Typing presence (group conversations only).
    typing: Option<PresenceTyping<E::Instant>>,

    /// Next history result must be merged instead of replacing the log.
    resync: bool,

    /// Scheduled reconnect after an unexpected loss.
    reconnect: Option<PendingReconnect<E::Instant>>,
}

/// A replaced connection still finishing its graceful close.
struct ClosingView<E: Environment> {
    view: ViewId,
    connection: Connection<E::Instant>,
}

/// Session client for the Veilchat relay.
///
/// # Invariants
///
/// - At most one conversation is active; the log only ever holds messages
///   that passed its scope filter
/// - A new connection is dialled only when no replaced connection is still
///   closing
/// - Events tagged with a [`ViewId`] other than the active one never touch
///   the active conversation
pub struct Client<E: Environment> {
    /// Environment for time and randomness.
    env: E,

    /// Own identity.
    identity: Identity,

    /// Bearer credential presented when dialling.
    credential: String,

    /// Session configuration.
    config: ClientConfig,

    /// Conversation keys resolved this session.
    keys: KeyStore,

    /// Counter for issuing view tokens.
    next_view: u64,

    /// The active conversation, if any.
    active: Option<ActiveView<E>>,

    /// Replaced connections waiting for their close to complete.
    closing: Vec<ClosingView<E>>,

    /// Reconnect schedule for the active conversation.
    backoff: Backoff,

    /// Last connectivity reported to the caller.
    connectivity: Connectivity,
}

impl<E: Environment> Client<E> {
    /// Create a session for `identity` authenticating with `credential`.
    pub fn new(env: E, identity: Identity, credential: String, config: ClientConfig) -> Self {
        let keys = KeyStore::new(config.suite);
        let backoff = Backoff::new(config.reconnect.clone());

        Self {
            env,
            identity,
            credential,
            config,
            keys,
            next_view: 0,
            active: None,
            closing: Vec::new(),
            backoff,
            connectivity: Connectivity::Offline,
        }
    }

    /// Own identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Session key store, for display-time decryption.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Scope of the active conversation.
    pub fn scope(&self) -> Option<&ConversationScope> {
        self.active.as_ref().map(|active| active.conversation.scope())
    }

    /// Messages of the active conversation, in arrival order.
    pub fn messages(&self) -> &[Message] {
        self.active.as_ref().map(|active| active.conversation.messages()).unwrap_or_default()
    }

    /// Identities typing in the active room (self excluded).
    pub fn typing_users(&self) -> &[Identity] {
        self.active
            .as_ref()
            .and_then(|active| active.typing.as_ref())
            .map(PresenceTyping::displayed)
            .unwrap_or_default()
    }

    /// View token of the active connection.
    pub fn current_view(&self) -> Option<ViewId> {
        self.active.as_ref().map(|active| active.view)
    }

    /// State of the active connection.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.active.as_ref().map(|active| active.connection.state())
    }

    /// Replaced connections still closing.
    pub fn closing_views(&self) -> Vec<ViewId> {
        self.closing.iter().map(|closing| closing.view).collect()
    }

    /// Last connectivity reported.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Reconnect attempts made in the current loss streak.
    pub fn reconnect_attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Only application intents fail (open, close, send, typing). Transport,
    /// history and tick events never return an error; malformed or stale
    /// input is logged and dropped.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::OpenConversation { scope } => self.handle_open_conversation(scope),
            ClientEvent::CloseConversation => self.handle_close_conversation(),
            ClientEvent::TransportOpened { view } => Ok(self.handle_transport_opened(view)),
            ClientEvent::TransportClosed { view, reason } => {
                Ok(self.handle_transport_closed(view, &format!("connection closed: {reason}")))
            },
            ClientEvent::TransportFailed { view, reason } => {
                Ok(self.handle_transport_closed(view, &format!("transport error: {reason}")))
            },
            ClientEvent::FrameReceived { view, text } => Ok(self.handle_frame(view, &text)),
            ClientEvent::HistoryLoaded { view, records } => {
                Ok(self.handle_history_loaded(view, records))
            },
            ClientEvent::HistoryFailed { view, reason } => {
                Ok(self.handle_history_failed(view, reason))
            },
            ClientEvent::SendMessage { plaintext } => self.handle_send_message(&plaintext),
            ClientEvent::LocalInput => self.handle_local_input(),
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
        }
    }

    /// Session teardown.
    ///
    /// Closes the active connection and wipes every conversation key.
    pub fn shutdown(&mut self) -> Vec<ClientAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        self.retire_active(CLOSE_REASON, now, &mut actions);
        self.keys.clear();
        self.set_connectivity(Connectivity::Offline, &mut actions);

        actions
    }

    fn handle_open_conversation(
        &mut self,
        scope: ConversationScope,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if let ConversationScope::Private(pair) = &scope
            && !pair.contains(&self.identity)
        {
            return Err(ClientError::NotAParticipant { scope });
        }

        let now = self.env.now();
        let mut actions = Vec::new();

        self.retire_active(SWITCH_REASON, now, &mut actions);

        let view = self.issue_view();
        self.keys.get_or_derive(&scope);
        self.backoff.reset();

        let typing = scope.room_id().map(|room_id| {
            PresenceTyping::new(self.identity.clone(), room_id, self.config.typing_window)
        });

        self.active = Some(ActiveView {
            view,
            connection: Connection::new(now, self.config.connection.clone()),
            conversation: ConversationState::new(self.identity.clone(), scope.clone()),
            typing,
            resync: false,
            reconnect: None,
        });

        info!(%view, %scope, "conversation opened");

        actions.push(ClientAction::ConversationOpened { scope: scope.clone() });
        actions.push(ClientAction::FetchHistory { view, scope });
        self.set_connectivity(Connectivity::Connecting, &mut actions);
        self.connect_if_clear(now, &mut actions);

        Ok(actions)
    }

    fn handle_close_conversation(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        if self.active.is_none() {
            return Err(ClientError::NoActiveConversation);
        }

        let now = self.env.now();
        let mut actions = Vec::new();

        self.retire_active(CLOSE_REASON, now, &mut actions);
        actions.push(ClientAction::ConversationClosed);
        self.set_connectivity(Connectivity::Offline, &mut actions);

        Ok(actions)
    }

    fn handle_transport_opened(&mut self, view: ViewId) -> Vec<ClientAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        if self.closing.iter().any(|closing| closing.view == view) {
            trace!(%view, "replaced connection opened while closing");
            return actions;
        }

        let Some(active) = self.active.as_mut().filter(|active| active.view == view) else {
            debug!(%view, "transport opened for stale view");
            actions.push(ClientAction::CloseTransport {
                view,
                code: NORMAL_CLOSURE,
                reason: SWITCH_REASON.to_string(),
            });
            return actions;
        };

        if let Err(error) = active.connection.opened(now) {
            warn!(%view, %error, "unexpected transport open");
            return actions;
        }

        info!(%view, scope = %active.conversation.scope(), "connected");

        if active.resync {
            actions.push(ClientAction::FetchHistory {
                view,
                scope: active.conversation.scope().clone(),
            });
        }

        self.backoff.reset();
        self.set_connectivity(Connectivity::Online, &mut actions);

        actions
    }

    fn handle_transport_closed(&mut self, view: ViewId, reason: &str) -> Vec<ClientAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        if let Some(position) = self.closing.iter().position(|closing| closing.view == view) {
            let mut closing = self.closing.remove(position);
            closing.connection.transport_closed(now);
            debug!(%view, "replaced connection closed");

            self.connect_if_clear(now, &mut actions);
            return actions;
        }

        let Some(active) = self.active.as_mut().filter(|active| active.view == view) else {
            trace!(%view, "close for stale view");
            return actions;
        };

        if active.connection.state() == ConnectionState::Closed {
            return actions;
        }

        if active.connection.transport_closed(now) {
            return actions;
        }

        warn!(%view, reason, "connection lost");
        self.connection_lost(reason.to_string(), now, &mut actions);

        actions
    }

    fn handle_frame(&mut self, view: ViewId, text: &str) -> Vec<ClientAction> {
        let Some(active) = self.active.as_mut().filter(|active| active.view == view) else {
            debug!(%view, "discarding frame from stale view");
            return Vec::new();
        };

        if !active.connection.accepts_frames() {
            debug!(%view, state = ?active.connection.state(), "discarding frame");
            return Vec::new();
        }

        let frame = match ServerFrame::decode(text) {
            Ok(frame) => frame,
            Err(ProtocolError::UnknownFrameType(frame_type)) => {
                debug!(%view, frame_type, "ignoring unknown frame type");
                return Vec::new();
            },
            Err(error) => {
                warn!(%view, %error, "malformed frame");
                return Vec::new();
            },
        };

        match frame {
            ServerFrame::PrivateMessage(record) | ServerFrame::GroupMessage(record) => {
                active.ingest(record)
            },
            ServerFrame::TypingIndicator(snapshot) => {
                let Some(typing) = active.typing.as_mut() else {
                    return Vec::new();
                };

                if typing.apply_snapshot(&snapshot) {
                    vec![ClientAction::TypingChanged(typing.displayed().to_vec())]
                } else {
                    trace!(%view, room_id = snapshot.room_id, "typing snapshot for another room");
                    Vec::new()
                }
            },
            ServerFrame::UserList(online) => vec![ClientAction::RosterUpdated(online)],
        }
    }

    fn handle_history_loaded(
        &mut self,
        view: ViewId,
        records: Vec<MessageRecord>,
    ) -> Vec<ClientAction> {
        let Some(active) = self.active.as_mut().filter(|active| active.view == view) else {
            debug!(%view, "dropping stale history");
            return Vec::new();
        };

        let mut history = Vec::with_capacity(records.len());
        for record in records {
            match Message::try_from(record) {
                Ok(message) if active.conversation.in_scope(&message) => history.push(message),
                Ok(message) => trace!(id = %message.id(), "history record outside conversation"),
                Err(error) => warn!(%view, %error, "skipping history record"),
            }
        }

        if active.resync {
            active.resync = false;
            active.conversation.merge_history(history);
        } else {
            active.conversation.load_history(history);
        }

        debug!(%view, count = active.conversation.len(), "history loaded");

        vec![ClientAction::HistoryReplaced(active.conversation.messages().to_vec())]
    }

    fn handle_history_failed(&mut self, view: ViewId, reason: String) -> Vec<ClientAction> {
        if self.current_view() != Some(view) {
            debug!(%view, "dropping stale history failure");
            return Vec::new();
        }

        warn!(%view, reason, "history unavailable");
        vec![ClientAction::HistoryUnavailable { reason }]
    }

    fn handle_send_message(&mut self, plaintext: &str) -> Result<Vec<ClientAction>, ClientError> {
        if plaintext.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let actual = plaintext.chars().count();
        if actual > self.config.max_message_chars {
            return Err(ClientError::MessageTooLong { max: self.config.max_message_chars, actual });
        }

        let active = self.active.as_mut().ok_or(ClientError::NoActiveConversation)?;
        active
            .connection
            .ensure_open()
            .map_err(|_| ClientError::TransportNotOpen { state: active.connection.state() })?;

        let scope = active.conversation.scope();
        let payload = self.keys.seal(scope, plaintext)?;

        let frame = match scope {
            ConversationScope::Private(pair) => {
                let receiver = pair
                    .other(&self.identity)
                    .ok_or_else(|| ClientError::NotAParticipant { scope: scope.clone() })?;
                ClientFrame::private(receiver.clone(), payload)
            },
            ConversationScope::Group(room_id) => ClientFrame::group(*room_id, payload),
        };

        let view = active.view;
        let mut actions = vec![ClientAction::Send { view, frame }];

        if let Some(typing) = active.typing.as_mut()
            && let Some(signal) = typing.on_message_sent()
        {
            actions.push(ClientAction::Send { view, frame: typing_frame(typing.room_id(), signal) });
        }

        trace!(%view, "message sealed");
        Ok(actions)
    }

    fn handle_local_input(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let now = self.env.now();
        let active = self.active.as_mut().ok_or(ClientError::NoActiveConversation)?;
        let typing = active.typing.as_mut().ok_or(ClientError::NotAGroupConversation)?;

        if !active.connection.accepts_frames() {
            return Ok(Vec::new());
        }

        Ok(typing
            .on_local_input(now)
            .map(|signal| ClientAction::Send {
                view: active.view,
                frame: typing_frame(typing.room_id(), signal),
            })
            .into_iter()
            .collect())
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let mut actions = Vec::new();

        let mut released = false;
        self.closing.retain_mut(|closing| match closing.connection.tick(now) {
            Some((action, error)) => {
                debug!(view = %closing.view, %error, "replaced connection abandoned");
                actions.push(transport_action(closing.view, action));
                released = true;
                false
            },
            None => true,
        });

        if released {
            self.connect_if_clear(now, &mut actions);
        }

        let Some(active) = self.active.as_mut() else {
            return actions;
        };

        if let Some((action, error)) = active.connection.tick(now) {
            warn!(view = %active.view, %error, "connection timed out");
            actions.push(transport_action(active.view, action));
            self.connection_lost(error.to_string(), now, &mut actions);
            return actions;
        }

        if let Some(typing) = active.typing.as_mut()
            && let Some(signal) = typing.tick(now)
            && active.connection.accepts_frames()
        {
            actions.push(ClientAction::Send {
                view: active.view,
                frame: typing_frame(typing.room_id(), signal),
            });
        }

        if let Some(pending) = active.reconnect
            && now - pending.since >= pending.delay
        {
            active.reconnect = None;
            self.reconnect(now, &mut actions);
        }

        actions
    }

    /// Move the active view out, closing its connection.
    fn retire_active(&mut self, reason: &str, now: E::Instant, actions: &mut Vec<ClientAction>) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if let Some(typing) = active.typing.as_mut() {
            typing.cancel();
        }

        let view = active.view;
        actions.extend(
            active
                .connection
                .begin_close(reason, now)
                .into_iter()
                .map(|action| transport_action(view, action)),
        );

        if active.connection.state() == ConnectionState::Closing {
            self.closing.push(ClosingView { view, connection: active.connection });
        }

        debug!(%view, scope = %active.conversation.scope(), "conversation retired");
    }

    /// Dial the active connection once nothing is left closing.
    fn connect_if_clear(&mut self, now: E::Instant, actions: &mut Vec<ClientAction>) {
        if !self.closing.is_empty() {
            debug!(closing = self.closing.len(), "waiting for replaced connection to close");
            return;
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };

        if active.connection.state() != ConnectionState::Idle {
            return;
        }

        let params = ConnectionParams {
            identity: self.identity.clone(),
            scope: active.conversation.scope().clone(),
            credential: self.credential.clone(),
        };

        let view = active.view;
        match active.connection.connect(params, now) {
            Ok(dial) => {
                actions.extend(dial.into_iter().map(|action| transport_action(view, action)));
            },
            Err(error) => {
                warn!(%view, %error, "cannot dial relay");
                active.connection.transport_failed(now);
                actions.push(ClientAction::ConnectionLost { reason: error.to_string() });
                self.set_connectivity(Connectivity::Lost, actions);
            },
        }
    }

    /// Unexpected loss of the active connection.
    fn connection_lost(&mut self, reason: String, now: E::Instant, actions: &mut Vec<ClientAction>) {
        actions.push(ClientAction::ConnectionLost { reason });

        let random = self.env.random_u64();
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if let Some(typing) = active.typing.as_mut() {
            typing.cancel();
            if typing.clear_displayed() {
                actions.push(ClientAction::TypingChanged(Vec::new()));
            }
        }

        match self.backoff.next_delay(random) {
            Some(delay) => {
                let attempt = self.backoff.attempts();
                active.reconnect = Some(PendingReconnect { since: now, delay });
                info!(view = %active.view, attempt, ?delay, "reconnect scheduled");

                actions.push(ClientAction::ReconnectScheduled { attempt, delay });
                self.set_connectivity(Connectivity::Reconnecting { attempt }, actions);
            },
            None => {
                warn!(view = %active.view, attempts = self.backoff.attempts(), "giving up on relay");
                self.set_connectivity(Connectivity::Lost, actions);
            },
        }
    }

    /// Replace the lost connection with a fresh one under a new view.
    fn reconnect(&mut self, now: E::Instant, actions: &mut Vec<ClientAction>) {
        let view = self.issue_view();
        let Some(active) = self.active.as_mut() else {
            return;
        };

        info!(previous = %active.view, %view, attempt = self.backoff.attempts(), "reconnecting");

        active.view = view;
        active.connection = Connection::new(now, self.config.connection.clone());
        active.resync = true;

        self.connect_if_clear(now, actions);
    }

    fn issue_view(&mut self) -> ViewId {
        self.next_view += 1;
        ViewId(self.next_view)
    }

    fn set_connectivity(&mut self, next: Connectivity, actions: &mut Vec<ClientAction>) {
        if self.connectivity != next {
            self.connectivity = next;
            actions.push(ClientAction::ConnectivityChanged(next));
        }
    }
}

impl<E: Environment> ActiveView<E> {
    /// Offer a streamed record to the conversation log.
    fn ingest(&mut self, record: MessageRecord) -> Vec<ClientAction> {
        let message = match Message::try_from(record) {
            Ok(message) => message,
            Err(error) => {
                warn!(view = %self.view, %error, "skipping streamed record");
                return Vec::new();
            },
        };

        match self.conversation.ingest(message.clone()) {
            IngestOutcome::Appended => vec![ClientAction::MessageAppended(message)],
            IngestOutcome::Duplicate => {
                trace!(id = %message.id(), "duplicate message");
                Vec::new()
            },
            IngestOutcome::OutOfScope => Vec::new(),
        }
    }
}

fn transport_action(view: ViewId, action: ConnectionAction) -> ClientAction {
    match action {
        ConnectionAction::Open { credential } => ClientAction::OpenTransport { view, credential },
        ConnectionAction::Close { code, reason } => {
            ClientAction::CloseTransport { view, code, reason }
        },
        ConnectionAction::Abort { reason } => ClientAction::AbortTransport { view, reason },
    }
}

fn typing_frame(room_id: RoomId, signal: TypingSignal) -> ClientFrame {
    match signal {
        TypingSignal::Start => ClientFrame::typing_start(room_id),
        TypingSignal::Stop => ClientFrame::typing_stop(room_id),
    }
}
