//! Fuzz target for message decryption
//!
//! # Strategy
//!
//! - Garbage: arbitrary key, nonce and ciphertext
//! - Tamper: seal a real message, then flip one byte of ciphertext or nonce
//!
//! # Invariants
//!
//! - Decryption NEVER panics, whatever the input lengths
//! - A tampered message never authenticates
//! - An untouched message always opens to its plaintext

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use veilchat_crypto::{CipherSuite, ConversationKey, DecryptError, KEY_SIZE, decrypt, encrypt};

#[derive(Debug, Arbitrary)]
enum DecryptAttack {
    Garbage { key: [u8; KEY_SIZE], nonce: Vec<u8>, ciphertext: Vec<u8>, chacha: bool },
    Tamper { key: [u8; KEY_SIZE], plaintext: String, position: u16, mask: u8, in_nonce: bool, chacha: bool },
}

fn suite(chacha: bool) -> CipherSuite {
    if chacha { CipherSuite::ChaCha20Poly1305 } else { CipherSuite::Aes256Gcm }
}

fuzz_target!(|attack: DecryptAttack| {
    match attack {
        DecryptAttack::Garbage { key, nonce, ciphertext, chacha } => {
            let key = ConversationKey::from_bytes(key);
            let _ = decrypt(&ciphertext, &key, &nonce, suite(chacha));
        },

        DecryptAttack::Tamper { key, plaintext, position, mask, in_nonce, chacha } => {
            let key = ConversationKey::from_bytes(key);
            let suite = suite(chacha);
            let sealed = encrypt(&plaintext, &key, suite);

            let opened = decrypt(&sealed.ciphertext, &key, &sealed.nonce, suite);
            assert_eq!(opened.as_deref(), Ok(plaintext.as_str()), "untouched message must open");

            if mask == 0 {
                return;
            }

            let mut ciphertext = sealed.ciphertext;
            let mut nonce = sealed.nonce;
            if in_nonce {
                let index = usize::from(position) % nonce.len();
                nonce[index] ^= mask;
            } else {
                let index = usize::from(position) % ciphertext.len();
                ciphertext[index] ^= mask;
            }

            let result = decrypt(&ciphertext, &key, &nonce, suite);
            assert_eq!(result, Err(DecryptError::AuthenticationFailed), "tampered message opened");
        },
    }
});
