//! Key material container.

use std::fmt;

use zeroize::Zeroize;

/// Size of a conversation key in bytes.
pub const KEY_SIZE: usize = 32;

/// 256-bit symmetric key bound to one conversation scope.
///
/// Never persisted, never transmitted. The bytes are wiped on drop and
/// hidden from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversationKey {
    bytes: [u8; KEY_SIZE],
}

impl ConversationKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw key bytes for the AEAD.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversationKey(<redacted>)")
    }
}

// Implement Drop to zeroize key material
impl Drop for ConversationKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
