//! Fuzz target for relay frame decoding
//!
//! Feeds arbitrary text to both frame decoders. Frames arrive from the
//! network, so every malformed input must come back as an error:
//! - Invalid JSON, wrong field types, missing `type` tags
//! - Bad base64 in payloads, wrong nonce lengths
//! - Unknown frame types
//!
//! Anything that decodes must encode again without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use veilchat_proto::{ClientFrame, ServerFrame};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    if let Ok(frame) = ServerFrame::decode(&text) {
        let _ = frame.encode();
    }

    if let Ok(frame) = ClientFrame::decode(&text) {
        let _ = frame.encode();
    }
});
