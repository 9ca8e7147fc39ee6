//! In-memory relay for simulation.
//!
//! Models the relay the client talks to in production: it authenticates
//! nobody, stores sealed payloads with increasing ids and forwards them as
//! JSON text frames. Each accepted session has an inbox the simulation driver
//! drains into `FrameReceived` events.
//!
//! Registration is keyed by identity. A newer session for the same identity
//! replaces the older one, and closing *any* session of an identity
//! unregisters it, even if a newer session took its place. A client that
//! opens its next connection before the previous close completes loses its
//! registration this way, which is exactly what the simulation is meant to
//! catch.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use veilchat_proto::{
    ClientFrame, ConversationScope, Identity, MessageRecord, RoomCommand, RoomId, SealedPayload,
    ServerFrame, TypingSnapshot,
};

/// Relay-side handle for one accepted WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Errors reported by the simulated relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The relay is refusing new connections.
    Refused,
    /// The session was closed or never existed.
    UnknownSession(SessionId),
    /// The client sent something that is not a client frame.
    Malformed(String),
    /// History requested for a conversation the caller is not part of.
    NotAParticipant,
    /// The history endpoint is failing.
    HistoryUnavailable,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => write!(f, "connection refused"),
            Self::UnknownSession(session) => write!(f, "unknown session {session}"),
            Self::Malformed(reason) => write!(f, "malformed frame: {reason}"),
            Self::NotAParticipant => write!(f, "not a participant"),
            Self::HistoryUnavailable => write!(f, "503 Service Unavailable"),
        }
    }
}

impl std::error::Error for RelayError {}

#[derive(Debug)]
struct Session {
    identity: Identity,
    inbox: VecDeque<String>,
}

#[derive(Debug, Default)]
struct RelayState {
    next_session: u64,
    sessions: BTreeMap<SessionId, Session>,
    registered: BTreeMap<Identity, SessionId>,
    messages: Vec<MessageRecord>,
    typing: BTreeMap<RoomId, Vec<Identity>>,
    refuse_connections: bool,
    history_unavailable: bool,
}

impl RelayState {
    fn store(
        &mut self,
        sender: Identity,
        receiver: Option<Identity>,
        room_id: Option<RoomId>,
        payload: SealedPayload,
    ) -> MessageRecord {
        let id = u64::try_from(self.messages.len()).unwrap_or(u64::MAX).saturating_add(1);
        let record = MessageRecord {
            id,
            sender_username: sender,
            receiver_username: receiver,
            room_id,
            ciphertext: payload.ciphertext,
            iv: payload.iv,
            timestamp: timestamp(id),
        };
        self.messages.push(record.clone());
        record
    }

    fn deliver(&mut self, identity: &Identity, frame: &ServerFrame) {
        let Some(session) = self.registered.get(identity).copied() else {
            return;
        };
        let Some(text) = encode(frame) else {
            return;
        };
        if let Some(session) = self.sessions.get_mut(&session) {
            session.inbox.push_back(text);
        }
    }

    fn broadcast(&mut self, frame: &ServerFrame) {
        let Some(text) = encode(frame) else {
            return;
        };
        for session in self.registered.values() {
            if let Some(session) = self.sessions.get_mut(session) {
                session.inbox.push_back(text.clone());
            }
        }
    }

    fn broadcast_roster(&mut self) {
        let online = self.registered.keys().cloned().collect();
        self.broadcast(&ServerFrame::UserList(online));
    }

    fn broadcast_typing(&mut self, room_id: RoomId) {
        let typing_users = self.typing.get(&room_id).cloned().unwrap_or_default();
        self.broadcast(&ServerFrame::TypingIndicator(TypingSnapshot { room_id, typing_users }));
    }
}

fn encode(frame: &ServerFrame) -> Option<String> {
    match frame.encode() {
        Ok(text) => Some(text),
        Err(error) => {
            tracing::warn!(%error, frame_type = frame.frame_type(), "relay could not encode frame");
            None
        },
    }
}

/// One second per stored message, starting at the epoch.
fn timestamp(id: u64) -> DateTime<Utc> {
    let seconds = i64::try_from(id).unwrap_or(i64::MAX);
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Shared in-memory relay. Clones refer to the same relay.
#[derive(Debug, Clone, Default)]
pub struct SimRelay {
    state: Arc<Mutex<RelayState>>,
}

impl SimRelay {
    /// Empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a WebSocket for `identity` and register it.
    ///
    /// Every registered session receives the new roster.
    ///
    /// # Errors
    ///
    /// - `RelayError::Refused` while connections are being refused
    pub fn connect(&self, identity: &Identity) -> Result<SessionId, RelayError> {
        let mut state = self.lock();
        if state.refuse_connections {
            return Err(RelayError::Refused);
        }

        state.next_session += 1;
        let session = SessionId(state.next_session);
        state.sessions.insert(session, Session { identity: identity.clone(), inbox: VecDeque::new() });
        if let Some(replaced) = state.registered.insert(identity.clone(), session) {
            tracing::debug!(%identity, %replaced, %session, "session replaced");
        }
        state.broadcast_roster();
        Ok(session)
    }

    /// Close a session.
    ///
    /// Unregisters the session's identity whichever session is registered
    /// for it, clears its typing state and broadcasts the new roster.
    /// Closing an unknown session does nothing.
    pub fn disconnect(&self, session: SessionId) {
        let mut state = self.lock();
        let Some(closed) = state.sessions.remove(&session) else {
            return;
        };

        state.registered.remove(&closed.identity);

        let rooms: Vec<RoomId> = state
            .typing
            .iter()
            .filter(|(_, users)| users.contains(&closed.identity))
            .map(|(room_id, _)| *room_id)
            .collect();
        for room_id in rooms {
            if let Some(users) = state.typing.get_mut(&room_id) {
                users.retain(|user| *user != closed.identity);
            }
            state.broadcast_typing(room_id);
        }

        state.broadcast_roster();
    }

    /// Handle a text frame sent by the client on `session`.
    ///
    /// Private sends are stored, then forwarded to the receiver and echoed to
    /// the sender. Group sends and typing changes go to every registered
    /// session.
    ///
    /// # Errors
    ///
    /// - `RelayError::UnknownSession` if the session is closed
    /// - `RelayError::Malformed` if the text is not a client frame
    pub fn receive(&self, session: SessionId, text: &str) -> Result<(), RelayError> {
        let mut state = self.lock();
        let sender = state
            .sessions
            .get(&session)
            .map(|s| s.identity.clone())
            .ok_or(RelayError::UnknownSession(session))?;
        let frame = ClientFrame::decode(text).map_err(|e| RelayError::Malformed(e.to_string()))?;

        match frame {
            ClientFrame::Private { receiver, payload } => {
                let record = state.store(sender.clone(), Some(receiver.clone()), None, payload);
                let frame = ServerFrame::PrivateMessage(record);
                state.deliver(&receiver, &frame);
                if receiver != sender {
                    state.deliver(&sender, &frame);
                }
            },
            ClientFrame::Room(RoomCommand::Group { room_id, payload }) => {
                let record = state.store(sender, None, Some(room_id), payload);
                state.broadcast(&ServerFrame::GroupMessage(record));
            },
            ClientFrame::Room(RoomCommand::TypingStart { room_id }) => {
                let users = state.typing.entry(room_id).or_default();
                if !users.contains(&sender) {
                    users.push(sender);
                }
                state.broadcast_typing(room_id);
            },
            ClientFrame::Room(RoomCommand::TypingStop { room_id }) => {
                if let Some(users) = state.typing.get_mut(&room_id) {
                    users.retain(|user| *user != sender);
                }
                state.broadcast_typing(room_id);
            },
        }

        Ok(())
    }

    /// Take every frame queued for `session`.
    pub fn drain(&self, session: SessionId) -> Vec<String> {
        self.lock()
            .sessions
            .get_mut(&session)
            .map(|s| s.inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Whether `session` has frames waiting.
    pub fn has_frames(&self, session: SessionId) -> bool {
        self.lock().sessions.get(&session).is_some_and(|s| !s.inbox.is_empty())
    }

    /// Queue raw text for whichever session is registered for `identity`.
    ///
    /// Returns `false` if the identity is not registered.
    pub fn inject_frame(&self, identity: &Identity, text: impl Into<String>) -> bool {
        let mut state = self.lock();
        let Some(session) = state.registered.get(identity).copied() else {
            return false;
        };
        let text = text.into();
        state.sessions.get_mut(&session).map(|s| s.inbox.push_back(text)).is_some()
    }

    /// Stored history of `scope` as seen by `identity`, oldest first.
    ///
    /// # Errors
    ///
    /// - `RelayError::HistoryUnavailable` while history is failing
    /// - `RelayError::NotAParticipant` for a private scope without `identity`
    pub fn history(
        &self,
        identity: &Identity,
        scope: &ConversationScope,
    ) -> Result<Vec<MessageRecord>, RelayError> {
        let state = self.lock();
        if state.history_unavailable {
            return Err(RelayError::HistoryUnavailable);
        }

        let records = match scope {
            ConversationScope::Private(_) => {
                let other = scope.counterpart(identity).ok_or(RelayError::NotAParticipant)?;
                state
                    .messages
                    .iter()
                    .filter(|m| {
                        let receiver = m.receiver_username.as_ref();
                        (m.sender_username == *identity && receiver == Some(other))
                            || (m.sender_username == *other && receiver == Some(identity))
                    })
                    .cloned()
                    .collect()
            },
            ConversationScope::Group(room_id) => state
                .messages
                .iter()
                .filter(|m| m.room_id == Some(*room_id))
                .cloned()
                .collect(),
        };

        Ok(records)
    }

    /// Identities currently registered.
    pub fn online(&self) -> Vec<Identity> {
        self.lock().registered.keys().cloned().collect()
    }

    /// Whether `identity` is registered.
    pub fn is_online(&self, identity: &Identity) -> bool {
        self.lock().registered.contains_key(identity)
    }

    /// Every stored record, in id order.
    pub fn stored(&self) -> Vec<MessageRecord> {
        self.lock().messages.clone()
    }

    /// Refuse (or accept again) new connections.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Make the history endpoint fail (or recover).
    pub fn set_history_unavailable(&self, unavailable: bool) {
        self.lock().history_unavailable = unavailable;
    }
}

#[cfg(test)]
mod tests {
    use veilchat_proto::NONCE_LEN;

    use super::*;

    fn sealed() -> SealedPayload {
        SealedPayload::new(vec![1, 2, 3], [0; NONCE_LEN])
    }

    fn frames(relay: &SimRelay, session: SessionId) -> Vec<ServerFrame> {
        relay.drain(session).iter().map(|text| ServerFrame::decode(text).unwrap()).collect()
    }

    #[test]
    fn private_send_reaches_receiver_and_sender() {
        let relay = SimRelay::new();
        let alice = relay.connect(&"alice".into()).unwrap();
        let bob = relay.connect(&"bob".into()).unwrap();
        relay.drain(alice);
        relay.drain(bob);

        let frame = ClientFrame::private("bob".into(), sealed()).encode().unwrap();
        relay.receive(alice, &frame).unwrap();

        let to_bob = frames(&relay, bob);
        let [ServerFrame::PrivateMessage(to_bob)] = to_bob.as_slice() else {
            panic!("bob should get the message");
        };
        assert_eq!(to_bob.id, 1);
        assert_eq!(to_bob.sender_username.as_str(), "alice");
        assert_eq!(frames(&relay, alice).len(), 1);
    }

    #[test]
    fn closing_old_session_unregisters_new_one() {
        let relay = SimRelay::new();
        let first = relay.connect(&"alice".into()).unwrap();
        let second = relay.connect(&"alice".into()).unwrap();
        relay.drain(second);

        relay.disconnect(first);

        assert!(!relay.is_online(&"alice".into()));
        assert!(!relay.inject_frame(&"alice".into(), "{}"));
        assert!(!relay.has_frames(second));
    }

    #[test]
    fn roster_broadcast_on_connect_and_disconnect() {
        let relay = SimRelay::new();
        let alice = relay.connect(&"alice".into()).unwrap();
        let bob = relay.connect(&"bob".into()).unwrap();
        relay.disconnect(bob);

        let rosters: Vec<ServerFrame> = frames(&relay, alice);

        assert_eq!(rosters, vec![
            ServerFrame::UserList(vec!["alice".into()]),
            ServerFrame::UserList(vec!["alice".into(), "bob".into()]),
            ServerFrame::UserList(vec!["alice".into()]),
        ]);
    }

    #[test]
    fn typing_snapshots_track_room_members() {
        let relay = SimRelay::new();
        let alice = relay.connect(&"alice".into()).unwrap();
        relay.drain(alice);

        relay.receive(alice, &ClientFrame::typing_start(4).encode().unwrap()).unwrap();
        relay.receive(alice, &ClientFrame::typing_stop(4).encode().unwrap()).unwrap();

        assert_eq!(frames(&relay, alice), vec![
            ServerFrame::TypingIndicator(TypingSnapshot { room_id: 4, typing_users: vec!["alice".into()] }),
            ServerFrame::TypingIndicator(TypingSnapshot { room_id: 4, typing_users: vec![] }),
        ]);
    }

    #[test]
    fn private_history_is_pair_only() {
        let relay = SimRelay::new();
        let alice = relay.connect(&"alice".into()).unwrap();
        let carol = relay.connect(&"carol".into()).unwrap();
        relay.receive(alice, &ClientFrame::private("bob".into(), sealed()).encode().unwrap()).unwrap();
        relay.receive(carol, &ClientFrame::private("alice".into(), sealed()).encode().unwrap()).unwrap();
        relay.receive(alice, &ClientFrame::group(1, sealed()).encode().unwrap()).unwrap();

        let with_bob = relay.history(&"alice".into(), &ConversationScope::private("alice", "bob")).unwrap();
        let room = relay.history(&"bob".into(), &ConversationScope::group(1)).unwrap();

        assert_eq!(with_bob.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(room.iter().map(|m| m.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(
            relay.history(&"dave".into(), &ConversationScope::private("alice", "bob")),
            Err(RelayError::NotAParticipant)
        );
    }

    #[test]
    fn malformed_frames_rejected() {
        let relay = SimRelay::new();
        let alice = relay.connect(&"alice".into()).unwrap();

        assert!(matches!(relay.receive(alice, "not json"), Err(RelayError::Malformed(_))));
        relay.disconnect(alice);
        assert_eq!(relay.receive(alice, "{}"), Err(RelayError::UnknownSession(alice)));
    }

    #[test]
    fn refused_connections() {
        let relay = SimRelay::new();
        relay.set_refuse_connections(true);

        assert_eq!(relay.connect(&"alice".into()), Err(RelayError::Refused));
    }
}
