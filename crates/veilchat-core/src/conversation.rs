//! Message log of the active conversation.
//!
//! Reconciles fetched history with streamed messages: each id appears at
//! most once, messages outside the active scope never enter, and the log
//! keeps arrival order (no reordering by timestamp).

use std::collections::HashSet;

use tracing::trace;
use veilchat_proto::{ConversationScope, Identity};

use crate::message::{Message, MessageId};

/// Result of offering a message to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New message, appended.
    Appended,
    /// Id already present; ignored.
    Duplicate,
    /// Belongs to a different conversation; ignored.
    OutOfScope,
}

/// Ordered, deduplicated messages for one active scope.
#[derive(Debug, Clone)]
pub struct ConversationState {
    me: Identity,
    scope: ConversationScope,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl ConversationState {
    /// Empty log for `scope` as seen by `me`.
    pub fn new(me: Identity, scope: ConversationScope) -> Self {
        Self { me, scope, messages: Vec::new(), seen: HashSet::new() }
    }

    /// Active scope.
    pub fn scope(&self) -> &ConversationScope {
        &self.scope
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a message id is already present.
    pub fn contains(&self, id: MessageId) -> bool {
        self.seen.contains(&id)
    }

    /// Replace the log with fetched history.
    ///
    /// Duplicate ids within `history` keep their first occurrence.
    pub fn load_history(&mut self, history: Vec<Message>) {
        self.messages.clear();
        self.seen.clear();

        for message in history {
            if self.seen.insert(message.id()) {
                self.messages.push(message);
            }
        }
    }

    /// Reconcile history fetched after a reconnect.
    ///
    /// History becomes the prefix; messages already held that the fetch did
    /// not return (streamed while the request was in flight) are kept after
    /// it, in their original order.
    pub fn merge_history(&mut self, history: Vec<Message>) {
        let held = std::mem::take(&mut self.messages);
        self.load_history(history);

        for message in held {
            if self.seen.insert(message.id()) {
                self.messages.push(message);
            }
        }
    }

    /// Offer a streamed message.
    ///
    /// Appended iff its id is new and it passes the scope filter.
    pub fn ingest(&mut self, candidate: Message) -> IngestOutcome {
        if !self.in_scope(&candidate) {
            trace!(id = %candidate.id(), "message outside active conversation");
            return IngestOutcome::OutOfScope;
        }

        if !self.seen.insert(candidate.id()) {
            return IngestOutcome::Duplicate;
        }

        self.messages.push(candidate);
        IngestOutcome::Appended
    }

    /// Scope filter.
    ///
    /// Private: the candidate's sender/receiver pair must equal the active
    /// pair, and the active pair must include me. A frame from the other
    /// party addressed to anyone but me is rejected even though its sender
    /// matches. Group: posted in the active room.
    pub fn in_scope(&self, candidate: &Message) -> bool {
        match &self.scope {
            ConversationScope::Private(pair) => {
                pair.contains(&self.me) && *candidate.scope() == self.scope
            },
            ConversationScope::Group(_) => *candidate.scope() == self.scope,
        }
    }
}
