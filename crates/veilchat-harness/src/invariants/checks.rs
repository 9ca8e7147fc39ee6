//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::{BTreeMap, HashSet};

use veilchat_proto::ConversationScope;

use super::{ClientSnapshot, Invariant, InvariantResult, SystemSnapshot, Violation};

/// A message id appears at most once on screen.
pub struct NoDuplicateMessages;

impl Invariant for NoDuplicateMessages {
    fn name(&self) -> &'static str {
        "no_duplicate_messages"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for message in &client.messages {
                if !seen.insert(message.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("client {}: message {} shown twice", client.identity, message.id),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every message on screen belongs to the open conversation.
///
/// In a private conversation the message must be between the client and its
/// counterpart, in either direction. In a room it must carry the room id.
/// With nothing open, nothing is shown.
pub struct MessagesMatchScope;

impl MessagesMatchScope {
    fn violation(&self, client: &ClientSnapshot, detail: String) -> Violation {
        Violation { invariant: self.name(), message: format!("client {}: {detail}", client.identity) }
    }
}

impl Invariant for MessagesMatchScope {
    fn name(&self) -> &'static str {
        "messages_match_scope"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let Some(scope) = &client.scope else {
                if let Some(message) = client.messages.first() {
                    return Err(self.violation(
                        client,
                        format!("message {} shown with no conversation open", message.id),
                    ));
                }
                continue;
            };

            for message in &client.messages {
                if message.scope != *scope {
                    return Err(self.violation(
                        client,
                        format!("message {} from {} shown in {scope}", message.id, message.scope),
                    ));
                }

                if let ConversationScope::Private(pair) = scope
                    && !pair.contains(&message.sender)
                {
                    return Err(self.violation(
                        client,
                        format!("message {} sent by outsider {}", message.id, message.sender),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Typing is only shown in rooms, and never includes the client itself.
pub struct TypingExcludesSelf;

impl Invariant for TypingExcludesSelf {
    fn name(&self) -> &'static str {
        "typing_excludes_self"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.typing.is_empty() {
                continue;
            }

            let in_room = client.scope.as_ref().is_some_and(ConversationScope::is_group);
            if !in_room {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: typing shown outside a room", client.identity),
                });
            }

            if client.typing.contains(&client.identity) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {}: shown as typing to itself", client.identity),
                });
            }
        }
        Ok(())
    }
}

/// A client never holds more than one relay session.
///
/// The previous connection must be fully closed before the next one is
/// dialled.
pub struct SingleConnection;

impl Invariant for SingleConnection {
    fn name(&self) -> &'static str {
        "single_connection"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.open_sessions > 1 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: {} relay sessions open at once",
                        client.identity, client.open_sessions
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Clients in the same conversation hold the same key.
///
/// Keys are derived from the scope alone, so any divergence means two
/// clients disagree on what the conversation is.
pub struct KeyConvergence;

impl Invariant for KeyConvergence {
    fn name(&self) -> &'static str {
        "key_convergence"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut by_scope: BTreeMap<&ConversationScope, (&ClientSnapshot, [u8; 8])> = BTreeMap::new();

        for client in &state.clients {
            let (Some(scope), Some(fingerprint)) = (&client.scope, client.key_fingerprint) else {
                continue;
            };

            match by_scope.get(scope) {
                Some((first, expected)) if *expected != fingerprint => {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{scope}: clients {} and {} derived different keys",
                            first.identity, client.identity
                        ),
                    });
                },
                Some(_) => {},
                None => {
                    by_scope.insert(scope, (client, fingerprint));
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dm() -> ConversationScope {
        ConversationScope::private("alice", "bob")
    }

    #[test]
    fn duplicate_ids_detected() {
        let client = ClientSnapshot::new("alice")
            .with_scope(dm())
            .with_message(1, "bob", dm())
            .with_message(1, "bob", dm());

        let err = NoDuplicateMessages.check(&SystemSnapshot::single(client)).unwrap_err();

        assert_eq!(err.invariant, "no_duplicate_messages");
    }

    #[test]
    fn foreign_conversation_detected() {
        let client = ClientSnapshot::new("alice")
            .with_scope(dm())
            .with_message(1, "bob", dm())
            .with_message(2, "carol", ConversationScope::private("alice", "carol"));

        let err = MessagesMatchScope.check(&SystemSnapshot::single(client)).unwrap_err();

        assert!(err.message.contains("message 2"));
    }

    #[test]
    fn messages_without_conversation_detected() {
        let client = ClientSnapshot::new("alice").with_message(1, "bob", dm());

        assert!(MessagesMatchScope.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn room_messages_pass() {
        let room = ConversationScope::group(3);
        let client = ClientSnapshot::new("alice")
            .with_scope(room.clone())
            .with_message(1, "bob", room.clone())
            .with_message(2, "carol", room);

        assert!(MessagesMatchScope.check(&SystemSnapshot::single(client)).is_ok());
    }

    #[test]
    fn typing_self_detected() {
        let client = ClientSnapshot::new("alice")
            .with_scope(ConversationScope::group(3))
            .with_typing(vec!["alice".into()]);

        assert!(TypingExcludesSelf.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn typing_in_private_detected() {
        let client = ClientSnapshot::new("alice").with_scope(dm()).with_typing(vec!["bob".into()]);

        assert!(TypingExcludesSelf.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn two_sessions_detected() {
        let client = ClientSnapshot::new("alice").with_open_sessions(2);

        assert!(SingleConnection.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn diverging_keys_detected() {
        let room = ConversationScope::group(3);
        let alice = ClientSnapshot::new("alice").with_scope(room.clone()).with_key_fingerprint([1; 8]);
        let bob = ClientSnapshot::new("bob").with_scope(room.clone()).with_key_fingerprint([1; 8]);
        let carol = ClientSnapshot::new("carol").with_scope(room).with_key_fingerprint([2; 8]);

        let agreeing = SystemSnapshot::from_clients(vec![alice.clone(), bob]);
        let diverging = SystemSnapshot::from_clients(vec![alice, carol]);

        assert!(KeyConvergence.check(&agreeing).is_ok());
        assert!(KeyConvergence.check(&diverging).unwrap_err().message.contains("carol"));
    }
}
