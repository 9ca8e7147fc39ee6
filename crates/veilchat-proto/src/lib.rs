//! Veilchat wire protocol.
//!
//! Everything that crosses the network boundary lives here: identities,
//! conversation scopes, the JSON text frames exchanged over the relay
//! WebSocket, and the message records returned by the history endpoints.
//!
//! # Frames
//!
//! The relay speaks JSON. Client frames are mostly tagged by a `type` field,
//! except for private sends which the relay recognises by the presence of a
//! `receiver`:
//!
//! ```text
//! client → relay   {receiver, payload:{ciphertext, iv}}
//!                  {type:"group", room_id, payload:{ciphertext, iv}}
//!                  {type:"typing_start" | "typing_stop", room_id}
//!
//! relay → client   {type:"private_message",  data: record}
//!                  {type:"group_message",    data: record}
//!                  {type:"typing_indicator", data:{room_id, typing_users}}
//!                  {type:"user_list",        data:[identity, ...]}
//! ```
//!
//! Binary fields (`ciphertext`, `iv`) travel as standard padded base64. The
//! relay never sees plaintext; it stores and forwards sealed payloads only.
//!
//! # Validation
//!
//! Decoding is strict about structure (nonce length, base64, timestamps) and
//! lenient about naming: `nonce` is accepted for `iv` and `username` for
//! `sender_username`, matching the record shapes older relays emit.

pub mod errors;
pub mod frame;
pub mod identity;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::{ClientFrame, RoomCommand, ServerFrame};
pub use identity::{ConversationScope, Identity, IdentityPair, RoomId};
pub use payloads::{MessageRecord, NONCE_LEN, SealedPayload, TypingSnapshot};
