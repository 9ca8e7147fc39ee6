//! JSON text frames exchanged with the relay.
//!
//! [`ClientFrame`] is what this client sends, [`ServerFrame`] is what the
//! relay pushes. Both encode to a single WebSocket text message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::{ProtocolError, Result},
    identity::{Identity, RoomId},
    payloads::{MessageRecord, SealedPayload, TypingSnapshot},
};

/// Frame sent from the client to the relay.
///
/// Private sends carry no `type` tag; the relay routes them by `receiver`.
/// Everything else is a [`RoomCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    /// Encrypted message for one receiver.
    Private {
        /// Recipient identity.
        receiver: Identity,
        /// Sealed message body.
        payload: SealedPayload,
    },
    /// Room-scoped command.
    Room(RoomCommand),
}

/// Tagged client frame addressed to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomCommand {
    /// Encrypted group message.
    Group {
        /// Target room.
        room_id: RoomId,
        /// Sealed message body.
        payload: SealedPayload,
    },
    /// The local user started typing.
    TypingStart {
        /// Room being typed in.
        room_id: RoomId,
    },
    /// The local user stopped typing.
    TypingStop {
        /// Room being typed in.
        room_id: RoomId,
    },
}

impl ClientFrame {
    /// Private message frame.
    pub fn private(receiver: Identity, payload: SealedPayload) -> Self {
        Self::Private { receiver, payload }
    }

    /// Group message frame.
    pub fn group(room_id: RoomId, payload: SealedPayload) -> Self {
        Self::Room(RoomCommand::Group { room_id, payload })
    }

    /// Typing start notification.
    pub fn typing_start(room_id: RoomId) -> Self {
        Self::Room(RoomCommand::TypingStart { room_id })
    }

    /// Typing stop notification.
    pub fn typing_stop(room_id: RoomId) -> Self {
        Self::Room(RoomCommand::TypingStop { room_id })
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Frame pushed by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A private message addressed to, or echoed back to, this user.
    PrivateMessage(MessageRecord),
    /// A message posted in a room.
    GroupMessage(MessageRecord),
    /// Current typers of a room.
    TypingIndicator(TypingSnapshot),
    /// Identities currently connected to the relay.
    UserList(Vec<Identity>),
}

impl ServerFrame {
    const KNOWN_TYPES: [&'static str; 4] =
        ["private_message", "group_message", "typing_indicator", "user_list"];

    /// Wire tag of this frame.
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::PrivateMessage(_) => "private_message",
            Self::GroupMessage(_) => "group_message",
            Self::TypingIndicator(_) => "typing_indicator",
            Self::UserList(_) => "user_list",
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame.
    ///
    /// Frames with an unrecognised `type` produce
    /// [`ProtocolError::UnknownFrameType`] so callers can skip them without
    /// treating the connection as broken.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let frame_type = value.get("type").and_then(Value::as_str).ok_or(ProtocolError::MissingFrameType)?;

        if !Self::KNOWN_TYPES.contains(&frame_type) {
            return Err(ProtocolError::UnknownFrameType(frame_type.to_owned()));
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::NONCE_LEN;

    fn sealed() -> SealedPayload {
        SealedPayload::new(vec![0xde, 0xad], [7; NONCE_LEN])
    }

    #[test]
    fn private_send_has_no_type_tag() {
        let json = ClientFrame::private("bob".into(), sealed()).encode().unwrap();

        insta::assert_snapshot!(json, @r#"{"receiver":"bob","payload":{"ciphertext":"3q0=","iv":"BwcHBwcHBwcHBwcH"}}"#);
    }

    #[test]
    fn group_send_wire_shape() {
        let json = ClientFrame::group(5, sealed()).encode().unwrap();

        insta::assert_snapshot!(json, @r#"{"type":"group","room_id":5,"payload":{"ciphertext":"3q0=","iv":"BwcHBwcHBwcHBwcH"}}"#);
    }

    #[test]
    fn typing_wire_shape() {
        insta::assert_snapshot!(ClientFrame::typing_start(9).encode().unwrap(), @r#"{"type":"typing_start","room_id":9}"#);
        insta::assert_snapshot!(ClientFrame::typing_stop(9).encode().unwrap(), @r#"{"type":"typing_stop","room_id":9}"#);
    }

    #[test]
    fn client_frames_decode_by_shape() {
        let private = ClientFrame::private("bob".into(), sealed());
        let group = ClientFrame::group(5, sealed());
        let typing = ClientFrame::typing_stop(5);

        for frame in [private, group, typing] {
            let decoded = ClientFrame::decode(&frame.encode().unwrap()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn decode_typing_indicator() {
        let json = r#"{"type":"typing_indicator","data":{"room_id":4,"typing_users":["alice","bob"]}}"#;
        let frame = ServerFrame::decode(json).unwrap();

        assert_eq!(
            frame,
            ServerFrame::TypingIndicator(TypingSnapshot {
                room_id: 4,
                typing_users: vec!["alice".into(), "bob".into()],
            })
        );
        assert_eq!(frame.frame_type(), "typing_indicator");
    }

    #[test]
    fn decode_user_list() {
        let frame = ServerFrame::decode(r#"{"type":"user_list","data":["alice","bob"]}"#).unwrap();

        assert_eq!(frame, ServerFrame::UserList(vec!["alice".into(), "bob".into()]));
    }

    #[test]
    fn decode_private_message() {
        let json = r#"{"type":"private_message","data":{"id":1,"sender_username":"bob","receiver_username":"alice","ciphertext":"3q0=","iv":"BwcHBwcHBwcHBwcH","timestamp":"2024-01-01T00:00:00"}}"#;
        let ServerFrame::PrivateMessage(record) = ServerFrame::decode(json).unwrap() else {
            unreachable!("expected a private message");
        };

        assert_eq!(record.sender_username.as_str(), "bob");
        assert_eq!(record.ciphertext, vec![0xde, 0xad]);
        assert_eq!(record.iv, [7; NONCE_LEN]);
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = ServerFrame::decode(r#"{"type":"room_created","data":{}}"#).unwrap_err();

        assert_eq!(err, ProtocolError::UnknownFrameType("room_created".into()));
    }

    #[test]
    fn missing_type_is_reported() {
        assert_eq!(ServerFrame::decode(r#"{"data":[]}"#).unwrap_err(), ProtocolError::MissingFrameType);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(ServerFrame::decode("{not json"), Err(ProtocolError::Json(_))));
    }
}
