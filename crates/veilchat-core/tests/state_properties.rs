//! Property-based tests for the conversation log and typing presence.
//!
//! Any interleaving of history loads and streamed messages must leave the
//! log free of duplicate ids and free of messages from other scopes, and
//! the typing display must never contain the local user.

use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use veilchat_core::{
    ConversationState, IngestOutcome, Message, MessageId, PresenceTyping, TypingSignal,
};
use veilchat_proto::{ConversationScope, Identity, TypingSnapshot};

const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

fn message_strategy() -> impl Strategy<Value = Message> {
    (0u64..40, 0usize..4, 0usize..4, any::<bool>(), 0u64..3).prop_map(
        |(id, from, to, is_group, room)| {
            let scope = if is_group {
                ConversationScope::group(room)
            } else {
                ConversationScope::private(USERS[from], USERS[to])
            };
            Message::new(
                MessageId(id),
                Identity::new(USERS[from]),
                scope,
                vec![0; 17],
                [0; 12],
                DateTime::<Utc>::UNIX_EPOCH,
            )
        },
    )
}

#[derive(Debug, Clone)]
enum Op {
    Ingest(Message),
    Load(Vec<Message>),
    Merge(Vec<Message>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => message_strategy().prop_map(Op::Ingest),
        1 => prop::collection::vec(message_strategy(), 0..10).prop_map(Op::Load),
        1 => prop::collection::vec(message_strategy(), 0..10).prop_map(Op::Merge),
    ]
}

fn scope_strategy() -> impl Strategy<Value = ConversationScope> {
    prop_oneof![
        (1usize..4).prop_map(|peer| ConversationScope::private("alice", USERS[peer])),
        (0u64..3).prop_map(ConversationScope::group),
    ]
}

proptest! {
    #[test]
    fn no_duplicate_ids(scope in scope_strategy(), ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut state = ConversationState::new(Identity::new("alice"), scope);

        for op in ops {
            match op {
                Op::Ingest(message) => { state.ingest(message); },
                Op::Load(history) => state.load_history(history),
                Op::Merge(history) => state.merge_history(history),
            }

            let ids: HashSet<_> = state.messages().iter().map(Message::id).collect();
            prop_assert_eq!(ids.len(), state.len());
        }
    }

    #[test]
    fn streamed_messages_stay_in_scope(
        scope in scope_strategy(),
        messages in prop::collection::vec(message_strategy(), 0..60),
    ) {
        let mut state = ConversationState::new(Identity::new("alice"), scope.clone());

        for message in messages {
            let in_scope = state.in_scope(&message);
            let outcome = state.ingest(message);
            prop_assert_eq!(outcome == IngestOutcome::OutOfScope, !in_scope);
        }

        let me = Identity::new("alice");
        for message in state.messages() {
            match &scope {
                ConversationScope::Group(room) => {
                    prop_assert_eq!(message.scope(), &ConversationScope::group(*room));
                },
                ConversationScope::Private(pair) => {
                    let other = pair.other(&me);
                    prop_assert!(!message.scope().is_group());
                    prop_assert!(
                        Some(message.sender()) == other
                            || (*message.sender() == me && message.receiver() == other)
                    );
                },
            }
        }
    }

    #[test]
    fn third_party_never_appears_in_private(messages in prop::collection::vec(message_strategy(), 0..60)) {
        let mut state = ConversationState::new(Identity::new("alice"), ConversationScope::private("alice", "bob"));

        for message in messages {
            state.ingest(message);
        }

        for message in state.messages() {
            prop_assert!(["alice", "bob"].contains(&message.sender().as_str()));
        }
    }

    #[test]
    fn typing_display_excludes_self(typers in prop::collection::vec(0usize..4, 0..8)) {
        let mut typing: PresenceTyping<Duration> =
            PresenceTyping::new(Identity::new("alice"), 1, Duration::from_secs(2));

        typing.apply_snapshot(&TypingSnapshot {
            room_id: 1,
            typing_users: typers.iter().map(|&i| Identity::new(USERS[i])).collect(),
        });

        prop_assert!(!typing.displayed().contains(&Identity::new("alice")));
    }

    #[test]
    fn typing_signals_alternate(inputs in prop::collection::vec((any::<bool>(), 0u64..3000), 0..40)) {
        let mut typing: PresenceTyping<Duration> =
            PresenceTyping::new(Identity::new("alice"), 1, Duration::from_secs(2));
        let mut now = Duration::ZERO;
        let mut last = TypingSignal::Stop;

        for (keystroke, advance) in inputs {
            now += Duration::from_millis(advance);
            let signal = if keystroke { typing.on_local_input(now) } else { typing.tick(now) };

            if let Some(signal) = signal {
                prop_assert_ne!(signal, last, "start and stop must alternate");
                last = signal;
            }
        }
    }
}
