//! Immutable relayed messages.
//!
//! A [`Message`] is a relay record with its scope resolved. It only ever
//! holds ciphertext; plaintext exists transiently at display time.

use std::fmt;

use chrono::{DateTime, Utc};
use veilchat_proto::{ConversationScope, Identity, MessageRecord, NONCE_LEN};

use crate::error::MessageError;

/// Server-assigned message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A relayed, still-encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    sender: Identity,
    scope: ConversationScope,
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_LEN],
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Assemble a message.
    pub fn new(
        id: MessageId,
        sender: Identity,
        scope: ConversationScope,
        ciphertext: Vec<u8>,
        nonce: [u8; NONCE_LEN],
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { id, sender, scope, ciphertext, nonce, timestamp }
    }

    /// Server id.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Author.
    pub fn sender(&self) -> &Identity {
        &self.sender
    }

    /// Scope the message was posted in.
    pub fn scope(&self) -> &ConversationScope {
        &self.scope
    }

    /// Declared receiver of a private message: the pair member that is not
    /// the sender.
    pub fn receiver(&self) -> Option<&Identity> {
        self.scope.counterpart(&self.sender)
    }

    /// Sealed body.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Nonce of the sealed body.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Server receive time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = MessageError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let scope = match (record.receiver_username, record.room_id) {
            (Some(receiver), None) => ConversationScope::private(record.sender_username.clone(), receiver),
            (None, Some(room_id)) => ConversationScope::group(room_id),
            (None, None) => return Err(MessageError::MissingScope { id: record.id }),
            (Some(_), Some(_)) => return Err(MessageError::AmbiguousScope { id: record.id }),
        };

        Ok(Self {
            id: MessageId(record.id),
            sender: record.sender_username,
            scope,
            ciphertext: record.ciphertext,
            nonce: record.iv,
            timestamp: record.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(receiver: Option<&str>, room_id: Option<u64>) -> MessageRecord {
        MessageRecord {
            id: 11,
            sender_username: Identity::new("bob"),
            receiver_username: receiver.map(Identity::new),
            room_id,
            ciphertext: vec![1, 2, 3],
            iv: [9; NONCE_LEN],
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn private_record_resolves_pair() {
        let message = Message::try_from(record(Some("alice"), None)).unwrap();

        assert_eq!(message.id(), MessageId(11));
        assert_eq!(message.scope(), &ConversationScope::private("alice", "bob"));
        assert_eq!(message.receiver(), Some(&Identity::new("alice")));
        assert_eq!(message.nonce(), &[9; NONCE_LEN]);
    }

    #[test]
    fn group_record_resolves_room() {
        let message = Message::try_from(record(None, Some(4))).unwrap();

        assert_eq!(message.scope(), &ConversationScope::group(4));
        assert_eq!(message.receiver(), None);
    }

    #[test]
    fn scopeless_record_rejected() {
        assert_eq!(Message::try_from(record(None, None)), Err(MessageError::MissingScope { id: 11 }));
    }

    #[test]
    fn ambiguous_record_rejected() {
        assert_eq!(
            Message::try_from(record(Some("alice"), Some(4))),
            Err(MessageError::AmbiguousScope { id: 11 })
        );
    }
}
