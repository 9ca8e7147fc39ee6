//! Presence payloads.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, RoomId};

/// Full list of identities currently typing in a room.
///
/// Each snapshot replaces the previous one for the same room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingSnapshot {
    /// Room the snapshot applies to.
    pub room_id: RoomId,
    /// Everyone typing, possibly including the receiver.
    #[serde(default)]
    pub typing_users: Vec<Identity>,
}
