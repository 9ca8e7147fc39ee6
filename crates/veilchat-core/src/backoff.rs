//! Reconnect scheduling.
//!
//! After an unexpected loss the client waits `base * factor^attempt`
//! (capped) plus or minus a jitter fraction before dialling again, and gives
//! up after a fixed number of attempts. The jitter sample comes from the
//! caller so simulations stay deterministic.

use std::time::Duration;

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base: Duration,
    /// Multiplier applied per attempt
    pub factor: u32,
    /// Upper bound on any single delay
    pub cap: Duration,
    /// Jitter as a percentage of the delay, applied in both directions
    pub jitter_percent: u32,
    /// Attempts before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2,
            cap: Duration::from_secs(30),
            jitter_percent: 20,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects.
    pub fn disabled() -> Self {
        Self { max_attempts: 0, ..Self::default() }
    }
}

/// Attempt counter for one stretch of lost connectivity.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    /// Fresh schedule.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Attempts scheduled so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Maximum attempts allowed by the policy.
    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Whether the schedule is exhausted.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Delay before the next attempt, or `None` when attempts are used up.
    ///
    /// `random` is any uniformly distributed value; it picks the jitter
    /// offset.
    pub fn next_delay(&mut self, random: u64) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }

        let base_ms = millis(self.policy.base);
        let cap_ms = millis(self.policy.cap);
        let growth = u64::from(self.policy.factor).saturating_pow(self.attempts);
        let delay_ms = base_ms.saturating_mul(growth).min(cap_ms);

        let spread = delay_ms.saturating_mul(u64::from(self.policy.jitter_percent.min(100))) / 100;
        let offset = if spread == 0 { 0 } else { random % spread.saturating_mul(2).saturating_add(1) };
        let jittered = delay_ms.saturating_add(offset).saturating_sub(spread);

        self.attempts += 1;
        Some(Duration::from_millis(jittered))
    }

    /// Connectivity restored; start over.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
