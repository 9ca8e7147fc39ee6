//! Properties every simulated client must keep, whatever the schedule.
//!
//! Scenario tests pin down one interleaving each. The checks here run after
//! every render and after every world step, so any interleaving the property
//! tests stumble into is held to the same rules: no message shown twice,
//! nothing from outside the open conversation, no self in the typing line,
//! one relay session per client and one key per conversation.
//!
//! Checks never look at live state. [`ClientSnapshot::from_app`] copies out
//! what the App shows and what the key store resolved, and the registry runs
//! over a [`SystemSnapshot`] of one or more clients.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SystemSnapshot::single(ClientSnapshot::from_app(&app, keys, 1));
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    KeyConvergence, MessagesMatchScope, NoDuplicateMessages, SingleConnection, TypingExcludesSelf,
};
pub use snapshot::{ClientSnapshot, MessageSnapshot, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which check failed.
    pub invariant: &'static str,
    /// Client and detail.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// One property checked against a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Stable name, used in violation reports.
    fn name(&self) -> &'static str;

    /// `Ok(())` if the property holds for every client in `state`.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of checks.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every client-side check:
    ///
    /// - [`NoDuplicateMessages`]
    /// - [`MessagesMatchScope`]
    /// - [`TypingExcludesSelf`]
    /// - [`SingleConnection`]
    /// - [`KeyConvergence`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(NoDuplicateMessages);
        registry.add(MessagesMatchScope);
        registry.add(TypingExcludesSelf);
        registry.add(SingleConnection);
        registry.add(KeyConvergence);
        registry
    }

    /// Register `check` after the existing ones.
    pub fn add<I: Invariant + 'static>(&mut self, check: I) {
        self.checks.push(Box::new(check));
    }

    /// Names of the registered checks, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    /// Run every check.
    ///
    /// # Errors
    ///
    /// Every violation found, in registration order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        for check in &self.checks {
            if let Err(violation) = check.check(state) {
                violations.push(violation);
            }
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and panic with all violations, labelled `context`.
    ///
    /// # Panics
    ///
    /// If any check fails.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let lines: Vec<String> = violations.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", lines.join("\n  "));
        }
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no check is registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use veilchat_proto::ConversationScope;

    use super::*;

    #[test]
    fn standard_registry_order() {
        let registry = InvariantRegistry::standard();

        assert_eq!(registry.names(), vec![
            "no_duplicate_messages",
            "messages_match_scope",
            "typing_excludes_self",
            "single_connection",
            "key_convergence",
        ]);
        assert!(InvariantRegistry::new().is_empty());
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        let snapshot = SystemSnapshot::empty();
        assert!(registry.check_all(&snapshot).is_ok());
    }

    #[test]
    fn all_violations_reported() {
        let registry = InvariantRegistry::standard();
        let client = ClientSnapshot::new("alice")
            .with_open_sessions(2)
            .with_scope(ConversationScope::group(1))
            .with_typing(vec!["alice".into()]);

        let violations = registry.check_all(&SystemSnapshot::single(client)).unwrap_err();

        let names: Vec<_> = violations.iter().map(|v| v.invariant).collect();
        assert_eq!(names, vec!["typing_excludes_self", "single_connection"]);
    }
}
