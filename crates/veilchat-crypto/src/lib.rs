//! Veilchat Cryptographic Primitives
//!
//! Conversation keys and message sealing. There is no key exchange: every
//! participant derives the same symmetric key from identifiers they already
//! know.
//!
//! # Key Lifecycle
//!
//! ```text
//! ConversationScope
//!        │
//!        ▼
//! canonical input ("alice:bob" | "room_42")
//!        │
//!        ▼
//! SHA-256 → ConversationKey (per scope, per session)
//!        │
//!        ▼
//! AEAD (fresh 96-bit nonce per message) → Ciphertext
//! ```
//!
//! Private scopes sort the two identities before joining them, so both ends
//! agree without talking. Group scopes use the room id alone; no member
//! identity takes part, which is what lets every member decrypt every other
//! member's messages.
//!
//! # Security
//!
//! Anyone who knows the identifiers can derive the key. The scheme hides
//! message bodies from a relay that does not know the derivation rule and
//! nothing more:
//! - No forward secrecy, no rotation: one key per scope for all time
//! - Authenticity is AEAD-level only; the relay attributes senders
//! - Nonces come from the OS CSPRNG on every encryption and are never
//!   caller-supplied

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod conversation_keys;

pub use conversation_keys::{
    CipherSuite, ConversationKey, DecryptError, KEY_SIZE, NONCE_SIZE, SealedMessage, decrypt,
    derive_conversation_key, encrypt, key_input,
};
