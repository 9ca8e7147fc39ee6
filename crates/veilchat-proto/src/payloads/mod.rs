//! Payload bodies carried inside frames and history responses.
//!
//! Binary fields are base64 on the wire; the types here hold raw bytes and
//! do the conversion at the serde boundary so that nothing above this crate
//! handles base64 text.

pub mod message;
pub mod presence;

use base64::{Engine, engine::general_purpose::STANDARD};
pub use message::MessageRecord;
pub use presence::TypingSnapshot;
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::{ProtocolError, Result};

/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Ciphertext and nonce as sent by a client.
///
/// Wire shape: `{"ciphertext": "<base64>", "iv": "<base64>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSealedPayload")]
pub struct SealedPayload {
    /// Ciphertext with the authentication tag appended.
    #[serde(serialize_with = "serialize_base64")]
    pub ciphertext: Vec<u8>,

    /// Nonce used for this ciphertext.
    #[serde(serialize_with = "serialize_base64")]
    pub iv: [u8; NONCE_LEN],
}

impl SealedPayload {
    /// Bundle a ciphertext and its nonce.
    pub fn new(ciphertext: Vec<u8>, iv: [u8; NONCE_LEN]) -> Self {
        Self { ciphertext, iv }
    }
}

#[derive(Deserialize)]
struct RawSealedPayload {
    ciphertext: String,
    iv: Option<String>,
    nonce: Option<String>,
}

impl TryFrom<RawSealedPayload> for SealedPayload {
    type Error = ProtocolError;

    fn try_from(raw: RawSealedPayload) -> Result<Self> {
        let iv = raw.iv.or(raw.nonce).ok_or(ProtocolError::MissingField("iv"))?;
        Ok(Self { ciphertext: decode_base64("ciphertext", &raw.ciphertext)?, iv: decode_nonce(&iv)? })
    }
}

/// Decode a standard padded base64 field.
pub(crate) fn decode_base64(field: &'static str, text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| ProtocolError::InvalidBase64 { field, reason: e.to_string() })
}

/// Decode a base64 nonce and check its length.
pub(crate) fn decode_nonce(text: &str) -> Result<[u8; NONCE_LEN]> {
    let bytes = decode_base64("iv", text)?;
    <[u8; NONCE_LEN]>::try_from(bytes.as_slice()).map_err(|_| ProtocolError::InvalidNonceLength {
        expected: NONCE_LEN,
        actual: bytes.len(),
    })
}

pub(crate) fn serialize_base64<S, B>(bytes: &B, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    B: AsRef<[u8]>,
{
    serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_payload_wire_shape() {
        let payload = SealedPayload::new(vec![1, 2, 3], [0; NONCE_LEN]);
        let json = serde_json::to_string(&payload).unwrap();

        insta::assert_snapshot!(json, @r#"{"ciphertext":"AQID","iv":"AAAAAAAAAAAAAAAA"}"#);
    }

    #[test]
    fn sealed_payload_accepts_nonce_alias() {
        let payload: SealedPayload =
            serde_json::from_str(r#"{"ciphertext":"AQID","nonce":"AAAAAAAAAAAAAAAA"}"#).unwrap();

        assert_eq!(payload.ciphertext, vec![1, 2, 3]);
        assert_eq!(payload.iv, [0; NONCE_LEN]);
    }

    #[test]
    fn short_nonce_rejected() {
        let err = decode_nonce("AAAA").unwrap_err();

        assert_eq!(err, ProtocolError::InvalidNonceLength { expected: NONCE_LEN, actual: 3 });
    }

    #[test]
    fn bad_base64_rejected() {
        let err = decode_base64("ciphertext", "not base64!").unwrap_err();

        assert!(matches!(err, ProtocolError::InvalidBase64 { field: "ciphertext", .. }));
    }

    #[test]
    fn missing_nonce_rejected() {
        let result = serde_json::from_str::<SealedPayload>(r#"{"ciphertext":"AQID"}"#);

        assert!(result.is_err());
    }
}
