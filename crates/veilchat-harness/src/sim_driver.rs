//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI's stdin driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`veilchat_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! Transport commands are carried out against a [`SimRelay`]; their outcomes
//! come back through [`Driver::poll_input`] in the order a real connection
//! would report them.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use veilchat_app::{App, AppEvent, Command, Driver, DriverInput, display::display_messages};
use veilchat_client::{ClientEvent, KeyStore, ViewId};
use veilchat_core::env::Environment;
use veilchat_proto::{ConversationScope, Identity};

use crate::{
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
    sim_env::{SimEnv, SimInstant},
    sim_relay::{SessionId, SimRelay},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Transport-level record of what the driver did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverLog {
    /// Relay accepted a connection for the view.
    Opened(ViewId),
    /// Relay refused the connection.
    Refused(ViewId),
    /// Close requested.
    Closed(ViewId),
    /// Transport dropped without a closing handshake.
    Aborted(ViewId),
    /// Frame handed to the relay.
    Sent(ViewId),
    /// History requested.
    FetchedHistory(ViewId),
}

/// Shared state for event injection.
///
/// This allows injection from outside async contexts.
#[derive(Default)]
struct SharedState {
    inputs: VecDeque<DriverInput<SimInstant>>,
    sessions: BTreeMap<ViewId, SessionId>,
    held_history: Vec<(ViewId, ConversationScope)>,
    hold_history: bool,
    stall_closes: bool,
    log: Vec<DriverLog>,
    transcript: Vec<String>,
    status: Option<String>,
    last_snapshot: Option<ClientSnapshot>,
    violations: Vec<Violation>,
    stopped: bool,
}

/// Simulation driver for deterministic testing.
///
/// Clones share state, so a test can keep a handle while the runtime owns
/// the driver.
#[derive(Clone)]
pub struct SimDriver {
    env: SimEnv,
    relay: SimRelay,
    identity: Identity,
    state: Arc<Mutex<SharedState>>,
    invariants: Option<Arc<InvariantRegistry>>,
}

impl SimDriver {
    /// Create a driver for `identity` connected to `relay`.
    pub fn new(env: SimEnv, relay: SimRelay, identity: impl Into<Identity>) -> Self {
        Self {
            env,
            relay,
            identity: identity.into(),
            state: Arc::new(Mutex::new(SharedState::default())),
            invariants: None,
        }
    }

    /// Enable invariant checking on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(Arc::new(registry));
        self
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inject an `AppEvent` for processing.
    pub fn inject_event(&self, event: AppEvent) {
        self.lock().inputs.push_back(DriverInput::App(event));
    }

    /// Inject a line typed by the user.
    pub fn inject_line(&self, line: impl Into<String>) {
        self.inject_event(AppEvent::Line(line.into()));
    }

    /// Inject a transport or history report directly.
    pub fn inject_network(&self, event: ClientEvent<SimInstant>) {
        self.lock().inputs.push_back(DriverInput::Network(event));
    }

    /// Check if there are pending inputs to process.
    pub fn has_pending(&self) -> bool {
        let state = self.lock();
        if state.stopped {
            return false;
        }
        !state.inputs.is_empty() || state.sessions.values().any(|s| self.relay.has_frames(*s))
    }

    /// Hold history requests until [`release_history`](Self::release_history).
    pub fn hold_history(&self, hold: bool) {
        self.lock().hold_history = hold;
    }

    /// Answer every held history request, oldest first.
    pub fn release_history(&self) {
        let mut state = self.lock();
        let held = std::mem::take(&mut state.held_history);
        for (view, scope) in held {
            let report = self.history_report(view, &scope);
            state.inputs.push_back(report);
        }
    }

    /// Leave graceful closes unacknowledged, as if the relay never answered.
    pub fn stall_closes(&self, stall: bool) {
        self.lock().stall_closes = stall;
    }

    /// Reset every open connection, as if the network dropped.
    pub fn drop_connections(&self) {
        let mut state = self.lock();
        let sessions = std::mem::take(&mut state.sessions);
        for (view, session) in sessions {
            self.relay.disconnect(session);
            state.inputs.push_back(DriverInput::Network(ClientEvent::TransportClosed {
                view,
                reason: "connection reset".to_string(),
            }));
        }
    }

    /// Relay sessions currently held open.
    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Everything the driver did so far.
    pub fn log(&self) -> Vec<DriverLog> {
        self.lock().log.clone()
    }

    /// Last rendered conversation as `sender: text` lines.
    pub fn transcript(&self) -> Vec<String> {
        self.lock().transcript.clone()
    }

    /// Last rendered status line.
    pub fn status(&self) -> Option<String> {
        self.lock().status.clone()
    }

    /// State captured at the last render.
    pub fn snapshot(&self) -> Option<ClientSnapshot> {
        self.lock().last_snapshot.clone()
    }

    /// Invariant violations seen at any render.
    pub fn violations(&self) -> Vec<Violation> {
        self.lock().violations.clone()
    }

    fn history_report(&self, view: ViewId, scope: &ConversationScope) -> DriverInput<SimInstant> {
        let event = match self.relay.history(&self.identity, scope) {
            Ok(records) => ClientEvent::HistoryLoaded { view, records },
            Err(error) => ClientEvent::HistoryFailed { view, reason: error.to_string() },
        };
        DriverInput::Network(event)
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_input(&mut self) -> Result<Option<DriverInput<SimInstant>>, Self::Error> {
        let mut state = self.lock();
        if state.stopped {
            return Ok(None);
        }

        if state.inputs.is_empty() {
            let sessions: Vec<(ViewId, SessionId)> =
                state.sessions.iter().map(|(view, session)| (*view, *session)).collect();
            for (view, session) in sessions {
                for text in self.relay.drain(session) {
                    state.inputs.push_back(DriverInput::Network(ClientEvent::FrameReceived { view, text }));
                }
            }
        }

        Ok(state.inputs.pop_front())
    }

    async fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
        let mut state = self.lock();

        match command {
            Command::Open { view, credential: _ } => match self.relay.connect(&self.identity) {
                Ok(session) => {
                    state.sessions.insert(view, session);
                    state.log.push(DriverLog::Opened(view));
                    state.inputs.push_back(DriverInput::Network(ClientEvent::TransportOpened { view }));
                },
                Err(error) => {
                    state.log.push(DriverLog::Refused(view));
                    state.inputs.push_back(DriverInput::Network(ClientEvent::TransportFailed {
                        view,
                        reason: error.to_string(),
                    }));
                },
            },
            Command::Close { view, code, reason } => {
                state.log.push(DriverLog::Closed(view));
                if state.stall_closes {
                    return Ok(());
                }
                if let Some(session) = state.sessions.remove(&view) {
                    self.relay.disconnect(session);
                    state.inputs.push_back(DriverInput::Network(ClientEvent::TransportClosed {
                        view,
                        reason: format!("{code} {reason}"),
                    }));
                }
            },
            Command::Abort { view } => {
                state.log.push(DriverLog::Aborted(view));
                if let Some(session) = state.sessions.remove(&view) {
                    self.relay.disconnect(session);
                }
            },
            Command::Send { view, frame } => {
                let Some(session) = state.sessions.get(&view).copied() else {
                    tracing::warn!(%view, "send on a view with no session");
                    return Ok(());
                };
                let text = frame.encode().map_err(|e| SimDriverError(e.to_string()))?;
                state.log.push(DriverLog::Sent(view));
                if let Err(error) = self.relay.receive(session, &text) {
                    tracing::warn!(%view, %error, "relay rejected frame");
                }
            },
            Command::FetchHistory { view, scope } => {
                state.log.push(DriverLog::FetchedHistory(view));
                if state.hold_history {
                    state.held_history.push((view, scope));
                } else {
                    let report = self.history_report(view, &scope);
                    state.inputs.push_back(report);
                }
            },
        }

        Ok(())
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn render(&mut self, app: &App, keys: &KeyStore) -> Result<(), Self::Error> {
        let mut state = self.lock();

        state.transcript = app
            .conversation()
            .map(|view| {
                display_messages(keys, app.identity(), &view.messages)
                    .into_iter()
                    .map(|line| format!("{}: {}", line.sender, line.text))
                    .collect()
            })
            .unwrap_or_default();
        state.status = app.status_message().map(str::to_string);

        let snapshot = ClientSnapshot::from_app(app, keys, state.sessions.len());
        if let Some(registry) = &self.invariants
            && let Err(violations) = registry.check_all(&SystemSnapshot::single(snapshot.clone()))
        {
            for violation in &violations {
                tracing::error!(%violation, "invariant violated");
            }
            state.violations.extend(violations);
        }
        state.last_snapshot = Some(snapshot);

        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        for (_, session) in std::mem::take(&mut state.sessions) {
            self.relay.disconnect(session);
        }
        state.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use veilchat_proto::ClientFrame;

    use super::*;

    fn driver() -> (SimDriver, SimRelay) {
        let relay = SimRelay::new();
        (SimDriver::new(SimEnv::with_seed(7), relay.clone(), "alice"), relay)
    }

    #[tokio::test]
    async fn inject_line_queues_input() {
        let (mut driver, _) = driver();
        driver.inject_line("/room 1");

        assert!(driver.has_pending());
        assert!(matches!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::App(AppEvent::Line(line))) if line == "/room 1"
        ));
        assert!(!driver.has_pending());
    }

    #[tokio::test]
    async fn open_reports_opened_and_registers() {
        let (mut driver, relay) = driver();

        driver.execute(Command::Open { view: ViewId(1), credential: "t".into() }).await.unwrap();

        assert!(relay.is_online(&"alice".into()));
        assert!(matches!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::Network(ClientEvent::TransportOpened { view: ViewId(1) }))
        ));
        assert!(matches!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::Network(ClientEvent::FrameReceived { view: ViewId(1), .. }))
        ));
    }

    #[tokio::test]
    async fn refused_open_reports_failure() {
        let (mut driver, relay) = driver();
        relay.set_refuse_connections(true);

        driver.execute(Command::Open { view: ViewId(1), credential: "t".into() }).await.unwrap();

        assert_eq!(driver.log(), vec![DriverLog::Refused(ViewId(1))]);
        assert!(matches!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::Network(ClientEvent::TransportFailed { view: ViewId(1), .. }))
        ));
    }

    #[tokio::test]
    async fn stalled_close_keeps_session_until_abort() {
        let (mut driver, relay) = driver();
        driver.execute(Command::Open { view: ViewId(1), credential: "t".into() }).await.unwrap();
        driver.stall_closes(true);

        driver.execute(Command::Close { view: ViewId(1), code: 1000, reason: "bye".into() }).await.unwrap();
        assert_eq!(driver.open_sessions(), 1);

        driver.execute(Command::Abort { view: ViewId(1) }).await.unwrap();
        assert_eq!(driver.open_sessions(), 0);
        assert!(!relay.is_online(&"alice".into()));
    }

    #[tokio::test]
    async fn send_reaches_relay() {
        let (mut driver, relay) = driver();
        driver.execute(Command::Open { view: ViewId(1), credential: "t".into() }).await.unwrap();
        let payload = veilchat_proto::SealedPayload::new(vec![1], [0; veilchat_proto::NONCE_LEN]);

        driver
            .execute(Command::Send { view: ViewId(1), frame: ClientFrame::group(2, payload) })
            .await
            .unwrap();

        assert_eq!(relay.stored().len(), 1);
    }

    #[tokio::test]
    async fn held_history_released_in_order() {
        let (mut driver, _) = driver();
        driver.hold_history(true);
        let scope = ConversationScope::group(2);

        driver.execute(Command::FetchHistory { view: ViewId(1), scope: scope.clone() }).await.unwrap();
        driver.execute(Command::FetchHistory { view: ViewId(2), scope }).await.unwrap();
        assert!(!driver.has_pending());

        driver.release_history();

        assert!(matches!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::Network(ClientEvent::HistoryLoaded { view: ViewId(1), .. }))
        ));
        assert!(matches!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::Network(ClientEvent::HistoryLoaded { view: ViewId(2), .. }))
        ));
    }
}
