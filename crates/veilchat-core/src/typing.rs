//! Typing presence for group rooms.
//!
//! Two halves share one struct:
//! - outbound: a single-slot debounce. The first keystroke emits
//!   [`TypingSignal::Start`]; every keystroke restarts the window; when the
//!   window elapses without input, [`TypingSignal::Stop`] is emitted once.
//! - inbound: the relay's latest list of typers for the room, minus self,
//!   replacing whatever was shown before.

use std::{ops::Sub, time::Duration};

use veilchat_proto::{Identity, RoomId, TypingSnapshot};

/// Idle time after the last keystroke before typing stops.
pub const DEFAULT_TYPING_WINDOW: Duration = Duration::from_millis(2000);

/// Outbound typing notification to send to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// Local user started typing.
    Start,
    /// Local user stopped typing.
    Stop,
}

/// Typing state for one room.
#[derive(Debug, Clone)]
pub struct PresenceTyping<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    me: Identity,
    room_id: RoomId,
    window: Duration,
    last_input: Option<I>,
    displayed: Vec<Identity>,
}

impl<I> PresenceTyping<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Idle presence for `room_id`.
    pub fn new(me: Identity, room_id: RoomId, window: Duration) -> Self {
        Self { me, room_id, window, last_input: None, displayed: Vec::new() }
    }

    /// Room this presence tracks.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Whether the local user is currently marked as typing.
    pub fn is_typing(&self) -> bool {
        self.last_input.is_some()
    }

    /// Other identities currently typing, as last reported by the relay.
    pub fn displayed(&self) -> &[Identity] {
        &self.displayed
    }

    /// Local keystroke.
    ///
    /// Emits `Start` only on the transition into typing; always restarts the
    /// debounce window.
    pub fn on_local_input(&mut self, now: I) -> Option<TypingSignal> {
        let started = self.last_input.is_none();
        self.last_input = Some(now);
        started.then_some(TypingSignal::Start)
    }

    /// Advance time; emits `Stop` once the window has elapsed.
    pub fn tick(&mut self, now: I) -> Option<TypingSignal> {
        let last = self.last_input?;
        if now - last >= self.window {
            self.last_input = None;
            Some(TypingSignal::Stop)
        } else {
            None
        }
    }

    /// A message was sent; typing ends immediately.
    pub fn on_message_sent(&mut self) -> Option<TypingSignal> {
        self.last_input.take().map(|_| TypingSignal::Stop)
    }

    /// Apply a relay snapshot.
    ///
    /// Overwrites the displayed set, excluding self. Snapshots for other
    /// rooms are ignored. Returns whether the snapshot applied.
    pub fn apply_snapshot(&mut self, snapshot: &TypingSnapshot) -> bool {
        if snapshot.room_id != self.room_id {
            return false;
        }

        self.displayed =
            snapshot.typing_users.iter().filter(|user| **user != self.me).cloned().collect();
        true
    }

    /// Teardown: forget local typing without emitting anything.
    pub fn cancel(&mut self) {
        self.last_input = None;
    }

    /// Forget the relay's last snapshot.
    ///
    /// Used when the relay can no longer send updates. Returns whether
    /// anyone was shown as typing.
    pub fn clear_displayed(&mut self) -> bool {
        let had_typers = !self.displayed.is_empty();
        self.displayed.clear();
        had_typers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Milliseconds since an arbitrary origin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Ms(u64);

    impl Sub for Ms {
        type Output = Duration;

        fn sub(self, rhs: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(rhs.0))
        }
    }

    fn presence() -> PresenceTyping<Ms> {
        PresenceTyping::new(Identity::new("alice"), 1, DEFAULT_TYPING_WINDOW)
    }

    #[test]
    fn start_then_stop_after_window() {
        let mut typing = presence();

        assert_eq!(typing.on_local_input(Ms(0)), Some(TypingSignal::Start));
        assert_eq!(typing.tick(Ms(1999)), None);
        assert_eq!(typing.tick(Ms(2000)), Some(TypingSignal::Stop));
        assert_eq!(typing.tick(Ms(5000)), None, "stop is emitted once");
    }

    #[test]
    fn keystroke_restarts_window() {
        let mut typing = presence();

        assert_eq!(typing.on_local_input(Ms(0)), Some(TypingSignal::Start));
        assert_eq!(typing.on_local_input(Ms(1000)), None);
        assert_eq!(typing.tick(Ms(2000)), None);
        assert_eq!(typing.tick(Ms(3000)), Some(TypingSignal::Stop));
    }

    #[test]
    fn send_stops_immediately() {
        let mut typing = presence();
        typing.on_local_input(Ms(0));

        assert_eq!(typing.on_message_sent(), Some(TypingSignal::Stop));
        assert_eq!(typing.on_message_sent(), None);
        assert_eq!(typing.tick(Ms(2000)), None);
    }

    #[test]
    fn cancel_is_silent() {
        let mut typing = presence();
        typing.on_local_input(Ms(0));

        typing.cancel();

        assert!(!typing.is_typing());
        assert_eq!(typing.tick(Ms(5000)), None);
    }

    #[test]
    fn snapshot_excludes_self_and_overwrites() {
        let mut typing = presence();

        assert!(typing.apply_snapshot(&TypingSnapshot {
            room_id: 1,
            typing_users: vec!["alice".into(), "bob".into(), "carol".into()],
        }));
        assert_eq!(typing.displayed(), &[Identity::new("bob"), Identity::new("carol")]);

        typing.apply_snapshot(&TypingSnapshot { room_id: 1, typing_users: vec!["dave".into()] });
        assert_eq!(typing.displayed(), &[Identity::new("dave")]);
    }

    #[test]
    fn clear_displayed_reports_change_once() {
        let mut typing = presence();
        typing.apply_snapshot(&TypingSnapshot { room_id: 1, typing_users: vec!["bob".into()] });

        assert!(typing.clear_displayed());
        assert!(typing.displayed().is_empty());
        assert!(!typing.clear_displayed());
    }

    #[test]
    fn snapshot_for_other_room_ignored() {
        let mut typing = presence();

        assert!(!typing.apply_snapshot(&TypingSnapshot { room_id: 2, typing_users: vec!["bob".into()] }));
        assert!(typing.displayed().is_empty());
    }
}
