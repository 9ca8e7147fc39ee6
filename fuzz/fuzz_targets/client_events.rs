//! Fuzz target for the session client state machine
//!
//! Drives one [`Client`] with arbitrary interleavings of user intents,
//! transport reports, relay frames, history results and time. Views are
//! picked from a small range so stale and current reports collide often.
//!
//! # Invariants
//!
//! - The client NEVER panics
//! - No message id appears twice in the conversation log
//! - Every logged message belongs to the open conversation
//! - The local user is never listed as typing
//! - The active connection is never also waiting to close

#![no_main]

use std::{collections::BTreeSet, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use veilchat_client::{Client, ClientConfig, ClientEvent, ViewId};
use veilchat_core::Environment;
use veilchat_harness::SimEnv;
use veilchat_proto::ConversationScope;

const PEOPLE: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Arbitrary)]
enum Input {
    OpenPrivate { peer: u8 },
    OpenRoom { room: u8 },
    Close,
    Opened { view: u8 },
    Closed { view: u8 },
    Failed { view: u8 },
    Frame { view: u8, text: String },
    HistoryFailed { view: u8 },
    Send { text: String },
    Typing,
    Advance { millis: u16 },
}

fn view(raw: u8) -> ViewId {
    ViewId(u64::from(raw % 6))
}

fuzz_target!(|inputs: Vec<Input>| {
    let env = SimEnv::with_seed(0);
    let mut client = Client::new(env.clone(), "alice".into(), "token".to_string(), ClientConfig::default());

    for input in inputs {
        let event = match input {
            Input::OpenPrivate { peer } => ClientEvent::OpenConversation {
                scope: ConversationScope::private("alice", PEOPLE[usize::from(peer) % PEOPLE.len()]),
            },
            Input::OpenRoom { room } => ClientEvent::OpenConversation { scope: ConversationScope::group(u64::from(room % 4)) },
            Input::Close => ClientEvent::CloseConversation,
            Input::Opened { view: v } => ClientEvent::TransportOpened { view: view(v) },
            Input::Closed { view: v } => ClientEvent::TransportClosed { view: view(v), reason: String::new() },
            Input::Failed { view: v } => ClientEvent::TransportFailed { view: view(v), reason: String::new() },
            Input::Frame { view: v, text } => ClientEvent::FrameReceived { view: view(v), text },
            Input::HistoryFailed { view: v } => ClientEvent::HistoryFailed { view: view(v), reason: String::new() },
            Input::Send { text } => ClientEvent::SendMessage { plaintext: text },
            Input::Typing => ClientEvent::LocalInput,
            Input::Advance { millis } => {
                env.advance(Duration::from_millis(u64::from(millis)));
                ClientEvent::Tick { now: env.now() }
            },
        };

        // Rejected intents are expected; only the state afterwards matters.
        let _ = client.handle(event);

        let mut seen = BTreeSet::new();
        for message in client.messages() {
            assert!(seen.insert(message.id()), "duplicate message {}", message.id());
            assert_eq!(Some(message.scope()), client.scope(), "message from another conversation");
        }
        assert!(!client.typing_users().contains(client.identity()), "self listed as typing");
        assert!(
            client.current_view().is_none_or(|current| !client.closing_views().contains(&current)),
            "active view is also closing"
        );
    }
});
