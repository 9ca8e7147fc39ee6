//! Per-conversation symmetric keys.
//!
//! [`derive_conversation_key`] maps a scope to its key; [`encrypt`] and
//! [`decrypt`] seal and open message bodies under that key.

mod cipher;
mod derivation;
mod error;
mod key;

pub use cipher::{CipherSuite, NONCE_SIZE, SealedMessage, decrypt, encrypt};
pub use derivation::{derive_conversation_key, key_input};
pub use error::DecryptError;
pub use key::{ConversationKey, KEY_SIZE};
