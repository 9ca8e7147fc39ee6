//! Identities and conversation scopes.
//!
//! An [`Identity`] is the opaque username handle the relay assigns. Only
//! equality and lexicographic ordering are ever used, both for routing and
//! for building the canonical key-derivation input of a private
//! conversation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of a group room.
pub type RoomId = u64;

/// Stable user handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(handle: &str) -> Self {
        Self::new(handle)
    }
}

impl From<String> for Identity {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

/// Unordered pair of identities, stored sorted.
///
/// `IdentityPair::new(a, b) == IdentityPair::new(b, a)` for all inputs. The
/// fields are private so no caller can build an unsorted pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityPair {
    low: Identity,
    high: Identity,
}

impl IdentityPair {
    /// Build the canonical pair for two participants.
    pub fn new(a: Identity, b: Identity) -> Self {
        if a <= b { Self { low: a, high: b } } else { Self { low: b, high: a } }
    }

    /// Lexicographically smaller member.
    pub fn low(&self) -> &Identity {
        &self.low
    }

    /// Lexicographically larger member.
    pub fn high(&self) -> &Identity {
        &self.high
    }

    /// Whether `identity` is one of the two members.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.low == *identity || self.high == *identity
    }

    /// The member that is not `me`.
    ///
    /// Returns `None` if `me` is not part of the pair. For a self-conversation
    /// (both members equal) the answer is `me` itself.
    pub fn other(&self, me: &Identity) -> Option<&Identity> {
        if self.low == *me {
            Some(&self.high)
        } else if self.high == *me {
            Some(&self.low)
        } else {
            None
        }
    }
}

/// The set of participants a conversation key is bound to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConversationScope {
    /// Two-party conversation.
    Private(IdentityPair),
    /// Group room; membership is not part of the scope.
    Group(RoomId),
}

impl ConversationScope {
    /// Private scope between `a` and `b`, order-insensitive.
    pub fn private(a: impl Into<Identity>, b: impl Into<Identity>) -> Self {
        Self::Private(IdentityPair::new(a.into(), b.into()))
    }

    /// Group scope for a room.
    pub fn group(room_id: RoomId) -> Self {
        Self::Group(room_id)
    }

    /// Counterpart of `me` in a private scope.
    pub fn counterpart(&self, me: &Identity) -> Option<&Identity> {
        match self {
            Self::Private(pair) => pair.other(me),
            Self::Group(_) => None,
        }
    }

    /// Room id of a group scope.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::Private(_) => None,
            Self::Group(room_id) => Some(*room_id),
        }
    }

    /// Whether this is a group scope.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for ConversationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private(pair) => write!(f, "private:{}+{}", pair.low, pair.high),
            Self::Group(room_id) => write!(f, "room:{room_id}"),
        }
    }
}
