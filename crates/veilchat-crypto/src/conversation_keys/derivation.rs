//! Key derivation for conversation scopes using SHA-256

use sha2::{Digest, Sha256};
use veilchat_proto::ConversationScope;

use super::key::ConversationKey;

/// Separator between the two sorted identities of a private scope.
const PAIR_SEPARATOR: &str = ":";

/// Prefix of a group scope's input.
const ROOM_PREFIX: &str = "room_";

/// Canonical derivation input for a scope.
///
/// - Private: the two identities, sorted, joined by `":"`.
/// - Group: `"room_"` followed by the decimal room id.
pub fn key_input(scope: &ConversationScope) -> String {
    match scope {
        ConversationScope::Private(pair) => {
            [pair.low().as_str(), pair.high().as_str()].join(PAIR_SEPARATOR)
        },
        ConversationScope::Group(room_id) => format!("{ROOM_PREFIX}{room_id}"),
    }
}

/// Derive the symmetric key for a scope.
///
/// The SHA-256 digest of [`key_input`] is used directly as the AEAD key.
/// Pure and deterministic: every participant computes the same key.
pub fn derive_conversation_key(scope: &ConversationScope) -> ConversationKey {
    let digest = Sha256::digest(key_input(scope).as_bytes());
    ConversationKey::from_bytes(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_input_is_sorted() {
        assert_eq!(key_input(&ConversationScope::private("bob", "alice")), "alice:bob");
    }

    #[test]
    fn group_input_is_room_only() {
        assert_eq!(key_input(&ConversationScope::group(42)), "room_42");
    }

    #[test]
    fn private_key_matches_known_digest() {
        let key = derive_conversation_key(&ConversationScope::private("alice", "bob"));

        // sha256("alice:bob")
        assert_eq!(&key.as_bytes()[..4], &[0x1e, 0x2a, 0xf2, 0x64]);
    }

    #[test]
    fn group_key_matches_known_digest() {
        let key = derive_conversation_key(&ConversationScope::group(42));

        // sha256("room_42")
        assert_eq!(&key.as_bytes()[..4], &[0x34, 0x1f, 0x6b, 0xcd]);
    }

    #[test]
    fn derivation_is_symmetric() {
        let ab = derive_conversation_key(&ConversationScope::private("alice", "bob"));
        let ba = derive_conversation_key(&ConversationScope::private("bob", "alice"));

        assert_eq!(ab, ba, "both ends must derive the same key");
    }

    #[test]
    fn different_scopes_produce_different_keys() {
        let ab = derive_conversation_key(&ConversationScope::private("alice", "bob"));
        let ac = derive_conversation_key(&ConversationScope::private("alice", "carol"));
        let room = derive_conversation_key(&ConversationScope::group(1));

        assert_ne!(ab, ac);
        assert_ne!(ab, room);
    }
}
