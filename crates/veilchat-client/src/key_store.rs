//! Conversation key store.
//!
//! Keys are derived on first use and cached for the lifetime of the
//! session. The store is owned by the session, never shared between
//! sessions, and wiped on teardown.

use std::collections::HashMap;

use veilchat_core::Message;
use veilchat_crypto::{CipherSuite, ConversationKey, decrypt, derive_conversation_key, encrypt};
use veilchat_proto::{ConversationScope, SealedPayload};

use crate::error::ClientError;

/// Per-session cache of conversation keys.
///
/// # Invariants
///
/// - A key is only ever the derivation of its own scope
/// - The cipher suite is fixed for the store's lifetime
#[derive(Debug)]
pub struct KeyStore {
    /// AEAD for all conversations in this session.
    suite: CipherSuite,

    /// Derived keys (scope -> key).
    keys: HashMap<ConversationScope, ConversationKey>,
}

impl KeyStore {
    /// Empty store.
    pub fn new(suite: CipherSuite) -> Self {
        Self { suite, keys: HashMap::new() }
    }

    /// Cipher suite used by this session.
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Number of resolved keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is resolved.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key for `scope`, deriving and caching it on first use.
    ///
    /// Pure lookup-or-compute; cannot fail.
    pub fn get_or_derive(&mut self, scope: &ConversationScope) -> &ConversationKey {
        self.keys.entry(scope.clone()).or_insert_with(|| derive_conversation_key(scope))
    }

    /// Key for `scope` if already resolved.
    pub fn get(&self, scope: &ConversationScope) -> Option<&ConversationKey> {
        self.keys.get(scope)
    }

    /// Seal a message for `scope`.
    ///
    /// # Errors
    ///
    /// - `ClientError::KeyNotReady` if the key has not been resolved
    pub fn seal(&self, scope: &ConversationScope, plaintext: &str) -> Result<SealedPayload, ClientError> {
        let key = self.get(scope).ok_or(ClientError::KeyNotReady)?;
        let sealed = encrypt(plaintext, key, self.suite);
        Ok(SealedPayload::new(sealed.ciphertext, sealed.nonce))
    }

    /// Open a stored message.
    ///
    /// # Errors
    ///
    /// - `ClientError::KeyNotReady` if the message's scope has no key yet
    /// - `ClientError::Decrypt` if authentication or decoding fails
    pub fn open(&self, message: &Message) -> Result<String, ClientError> {
        let key = self.get(message.scope()).ok_or(ClientError::KeyNotReady)?;
        Ok(decrypt(message.ciphertext(), key, message.nonce(), self.suite)?)
    }

    /// Session teardown: drop (and zeroize) every key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
