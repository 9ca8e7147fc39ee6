//! Message encryption using AES-256-GCM or ChaCha20-Poly1305
//!
//! Both suites take a 32-byte key and a 12-byte nonce and append a 16-byte
//! tag to the ciphertext. The nonce is drawn from the OS CSPRNG inside
//! [`encrypt`]; callers cannot supply one.

use std::{fmt, str::FromStr};

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit},
};
use chacha20poly1305::ChaCha20Poly1305;
use rand::{RngCore, rngs::OsRng};

use super::{error::DecryptError, key::ConversationKey};

/// AEAD nonce size (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// AEAD construction used for message bodies.
///
/// All participants of a conversation must use the same suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// AES-256 in Galois/Counter Mode, as produced by Web Crypto clients.
    #[default]
    Aes256Gcm,
    /// ChaCha20 with a Poly1305 authenticator.
    ChaCha20Poly1305,
}

impl CipherSuite {
    /// Configuration name of the suite.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherSuite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-gcm" | "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "chacha20-poly1305" | "chacha" => Ok(Self::ChaCha20Poly1305),
            other => Err(format!("unknown cipher suite: {other}")),
        }
    }
}

/// Output of a single encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// Ciphertext including the 16-byte tag.
    pub ciphertext: Vec<u8>,
    /// Nonce the ciphertext was sealed under.
    pub nonce: [u8; NONCE_SIZE],
}

/// Encrypt a UTF-8 message under a conversation key.
///
/// A fresh nonce is drawn from the OS CSPRNG on every call.
pub fn encrypt(plaintext: &str, key: &ConversationKey, suite: CipherSuite) -> SealedMessage {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    seal(plaintext.as_bytes(), key, suite, nonce)
}

/// Decrypt a sealed message.
///
/// # Errors
///
/// - `InvalidNonceLength`: nonce is not [`NONCE_SIZE`] bytes
/// - `AuthenticationFailed`: wrong key, or ciphertext/nonce tampered
/// - `InvalidUtf8`: authentic plaintext that is not UTF-8
pub fn decrypt(
    ciphertext: &[u8],
    key: &ConversationKey,
    nonce: &[u8],
    suite: CipherSuite,
) -> Result<String, DecryptError> {
    if nonce.len() != NONCE_SIZE {
        return Err(DecryptError::InvalidNonceLength { expected: NONCE_SIZE, actual: nonce.len() });
    }

    let opened = match suite {
        CipherSuite::Aes256Gcm => {
            Aes256Gcm::new(key.as_bytes().into()).decrypt(nonce.into(), ciphertext)
        },
        CipherSuite::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new(key.as_bytes().into()).decrypt(nonce.into(), ciphertext)
        },
    }
    .map_err(|_| DecryptError::AuthenticationFailed)?;

    String::from_utf8(opened).map_err(|_| DecryptError::InvalidUtf8)
}

fn seal(
    plaintext: &[u8],
    key: &ConversationKey,
    suite: CipherSuite,
    nonce: [u8; NONCE_SIZE],
) -> SealedMessage {
    let sealed = match suite {
        CipherSuite::Aes256Gcm => {
            Aes256Gcm::new(key.as_bytes().into()).encrypt((&nonce).into(), plaintext)
        },
        CipherSuite::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new(key.as_bytes().into()).encrypt((&nonce).into(), plaintext)
        },
    };

    let Ok(ciphertext) = sealed else {
        unreachable!("AEAD encryption cannot fail for in-memory plaintext under 64 GiB");
    };

    SealedMessage { ciphertext, nonce }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const SUITES: [CipherSuite; 2] = [CipherSuite::Aes256Gcm, CipherSuite::ChaCha20Poly1305];

    fn test_key(seed: u8) -> ConversationKey {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = seed.wrapping_add(i as u8);
        }
        ConversationKey::from_bytes(key)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key(1);

        for suite in SUITES {
            let sealed = encrypt("hello", &key, suite);
            let opened = decrypt(&sealed.ciphertext, &key, &sealed.nonce, suite).unwrap();

            assert_eq!(opened, "hello");
        }
    }

    #[test]
    fn encrypt_decrypt_empty_message() {
        let key = test_key(2);

        for suite in SUITES {
            let sealed = encrypt("", &key, suite);

            assert_eq!(sealed.ciphertext.len(), 16, "empty plaintext is tag only");
            assert_eq!(decrypt(&sealed.ciphertext, &key, &sealed.nonce, suite).unwrap(), "");
        }
    }

    #[test]
    fn encrypt_decrypt_multibyte_text() {
        let key = test_key(3);
        let text = "héllo wörld 👋";

        let sealed = encrypt(text, &key, CipherSuite::Aes256Gcm);

        assert_eq!(decrypt(&sealed.ciphertext, &key, &sealed.nonce, CipherSuite::Aes256Gcm).unwrap(), text);
    }

    #[test]
    fn aes_gcm_known_vector() {
        // NIST GCM test case 13: all-zero 256-bit key, all-zero nonce, empty plaintext
        let key = ConversationKey::from_bytes([0u8; 32]);
        let sealed = seal(b"", &key, CipherSuite::Aes256Gcm, [0u8; NONCE_SIZE]);

        assert_eq!(
            sealed.ciphertext,
            [
                0x53, 0x0f, 0x8a, 0xfb, 0xc7, 0x45, 0x36, 0xb9, 0xa9, 0x63, 0xb4, 0xf1, 0xc4, 0xcb,
                0x73, 0x8b
            ]
        );
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt("secret", &test_key(1), CipherSuite::Aes256Gcm);
        let result = decrypt(&sealed.ciphertext, &test_key(9), &sealed.nonce, CipherSuite::Aes256Gcm);

        assert_eq!(result, Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn wrong_suite_fails() {
        let key = test_key(1);
        let sealed = encrypt("secret", &key, CipherSuite::Aes256Gcm);
        let result = decrypt(&sealed.ciphertext, &key, &sealed.nonce, CipherSuite::ChaCha20Poly1305);

        assert_eq!(result, Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn tampered_nonce_fails() {
        let key = test_key(4);
        let sealed = encrypt("secret", &key, CipherSuite::ChaCha20Poly1305);
        let mut nonce = sealed.nonce;
        nonce[0] ^= 0x01;

        let result = decrypt(&sealed.ciphertext, &key, &nonce, CipherSuite::ChaCha20Poly1305);

        assert_eq!(result, Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn short_nonce_is_typed_error() {
        let key = test_key(5);
        let sealed = encrypt("secret", &key, CipherSuite::Aes256Gcm);

        let result = decrypt(&sealed.ciphertext, &key, &sealed.nonce[..8], CipherSuite::Aes256Gcm);

        assert_eq!(result, Err(DecryptError::InvalidNonceLength { expected: 12, actual: 8 }));
    }

    #[test]
    fn non_utf8_plaintext_is_typed_error() {
        let key = test_key(6);
        let sealed = seal(&[0xff, 0xfe], &key, CipherSuite::Aes256Gcm, [1; NONCE_SIZE]);

        let result = decrypt(&sealed.ciphertext, &key, &sealed.nonce, CipherSuite::Aes256Gcm);

        assert_eq!(result, Err(DecryptError::InvalidUtf8));
    }

    #[test]
    fn nonces_do_not_repeat() {
        let key = test_key(7);
        let mut seen = HashSet::new();

        for _ in 0..1000 {
            let sealed = encrypt("x", &key, CipherSuite::Aes256Gcm);
            assert!(seen.insert(sealed.nonce), "nonce reused");
        }
    }

    #[test]
    fn suite_names_parse() {
        for suite in SUITES {
            assert_eq!(suite.name().parse::<CipherSuite>(), Ok(suite));
        }
        assert!("rot13".parse::<CipherSuite>().is_err());
    }
}
