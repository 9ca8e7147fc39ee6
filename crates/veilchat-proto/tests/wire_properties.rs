//! Property-based tests for wire decoding.
//!
//! Decoding runs on untrusted relay input, so it must reject garbage with an
//! error rather than panic, and scope construction must be canonical for
//! every pair of handles.

use proptest::prelude::*;
use veilchat_proto::{ConversationScope, IdentityPair, ProtocolError, ServerFrame};

proptest! {
    #[test]
    fn pair_canonical_for_any_handles(a in ".{0,24}", b in ".{0,24}") {
        let ab = IdentityPair::new(a.clone().into(), b.clone().into());
        let ba = IdentityPair::new(b.into(), a.into());

        prop_assert_eq!(&ab, &ba);
        prop_assert!(ab.low() <= ab.high());
    }

    #[test]
    fn private_scope_symmetric(a in "[a-z]{1,12}", b in "[a-z]{1,12}") {
        prop_assert_eq!(
            ConversationScope::private(a.as_str(), b.as_str()),
            ConversationScope::private(b.as_str(), a.as_str())
        );
    }

    #[test]
    fn server_decode_never_panics(text in ".{0,256}") {
        let _ = ServerFrame::decode(&text);
    }

    #[test]
    fn unknown_frame_types_are_reported(frame_type in "[a-z_]{1,20}") {
        prop_assume!(!["private_message", "group_message", "typing_indicator", "user_list"]
            .contains(&frame_type.as_str()));

        let json = format!(r#"{{"type":"{frame_type}","data":null}}"#);

        prop_assert_eq!(ServerFrame::decode(&json), Err(ProtocolError::UnknownFrameType(frame_type)));
    }

    #[test]
    fn tampered_nonce_length_rejected(len in 0usize..32) {
        prop_assume!(len != 12);

        let nonce = base64_of_len(len);
        let json = format!(
            r#"{{"type":"group_message","data":{{"id":1,"sender_username":"a","room_id":1,"ciphertext":"AA==","iv":"{nonce}","timestamp":"2024-01-01T00:00:00Z"}}}}"#
        );

        prop_assert!(ServerFrame::decode(&json).is_err());
    }
}

fn base64_of_len(len: usize) -> String {
    use base64::{Engine, engine::general_purpose::STANDARD};
    STANDARD.encode(vec![0u8; len])
}
