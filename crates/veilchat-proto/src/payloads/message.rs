//! Stored message records.
//!
//! The same record shape is used for history responses and for the `data`
//! of streamed `private_message` / `group_message` frames. Private records
//! carry `receiver_username`, group records carry `room_id`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::{NONCE_LEN, decode_base64, decode_nonce, serialize_base64};
use crate::{
    errors::{ProtocolError, Result},
    identity::{Identity, RoomId},
};

/// Naive ISO-8601 layout used by relays that store UTC without an offset.
const NAIVE_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A relayed message as the server stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessageRecord")]
pub struct MessageRecord {
    /// Server-assigned id, unique per relay.
    pub id: u64,

    /// Author.
    pub sender_username: Identity,

    /// Receiver of a private message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_username: Option<Identity>,

    /// Room of a group message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,

    /// Ciphertext with tag.
    #[serde(serialize_with = "serialize_base64")]
    pub ciphertext: Vec<u8>,

    /// Nonce for `ciphertext`.
    #[serde(serialize_with = "serialize_base64")]
    pub iv: [u8; NONCE_LEN],

    /// Server receive time.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawMessageRecord {
    id: u64,
    sender_username: Option<Identity>,
    username: Option<Identity>,
    receiver_username: Option<Identity>,
    room_id: Option<RoomId>,
    ciphertext: String,
    iv: Option<String>,
    nonce: Option<String>,
    timestamp: String,
}

impl TryFrom<RawMessageRecord> for MessageRecord {
    type Error = ProtocolError;

    fn try_from(raw: RawMessageRecord) -> Result<Self> {
        let sender_username =
            raw.sender_username.or(raw.username).ok_or(ProtocolError::MissingField("sender_username"))?;
        let iv = raw.iv.or(raw.nonce).ok_or(ProtocolError::MissingField("iv"))?;

        Ok(Self {
            id: raw.id,
            sender_username,
            receiver_username: raw.receiver_username,
            room_id: raw.room_id,
            ciphertext: decode_base64("ciphertext", &raw.ciphertext)?,
            iv: decode_nonce(&iv)?,
            timestamp: parse_timestamp(&raw.timestamp)?,
        })
    }
}

/// Parse a record timestamp.
///
/// Accepts RFC 3339 with an offset, or a naive datetime which is taken as
/// UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, NAIVE_TIMESTAMP)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| ProtocolError::InvalidTimestamp(format!("{text}: {e}")))
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339())
}
