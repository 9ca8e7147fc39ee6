//! Line driver for the CLI.
//!
//! Implements the [`Driver`] trait with stdin lines for input, one WebSocket
//! session per view for the relay, spawned REST requests for history and
//! plain stdout for rendering.

use std::{
    collections::{BTreeMap, VecDeque},
    io::{self, Stdout, Write},
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, warn};
use veilchat_app::{App, AppEvent, Command, Driver, DriverInput};
use veilchat_client::{
    ClientEvent, KeyStore, ViewId,
    history::{HistoryClient, HistoryError},
    transport::{self, TransportHandle},
};
use veilchat_proto::{ConversationScope, Identity};

use crate::screen::Screen;

/// Tick interval when no input arrives.
const TICK: Duration = Duration::from_millis(100);

/// Inbound report queue depth.
const EVENT_CAPACITY: usize = 256;

/// Line driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The history client could not be set up.
    #[error("history client: {0}")]
    History(#[from] HistoryError),
}

/// Line driver implementing the [`Driver`] trait.
pub struct TerminalDriver {
    ws_url: String,
    history: HistoryClient,
    lines: mpsc::Receiver<String>,
    stdin_open: bool,
    events_tx: mpsc::Sender<ClientEvent<Instant>>,
    events_rx: mpsc::Receiver<ClientEvent<Instant>>,
    /// Reports produced locally, delivered before channel traffic.
    pending: VecDeque<ClientEvent<Instant>>,
    sessions: BTreeMap<ViewId, TransportHandle>,
    screen: Screen,
    out: Stdout,
}

impl TerminalDriver {
    /// Driver talking to the relay at `ws_url` / `api_url` as `identity`.
    ///
    /// Must be called inside a tokio runtime: stdin is read by a spawned
    /// task.
    pub fn new(
        ws_url: String,
        api_url: &str,
        identity: Identity,
        credential: String,
    ) -> Result<Self, TerminalError> {
        let history = HistoryClient::new(api_url, identity, credential)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);

        Ok(Self {
            ws_url,
            history,
            lines: spawn_stdin_reader(),
            stdin_open: true,
            events_tx,
            events_rx,
            pending: VecDeque::new(),
            sessions: BTreeMap::new(),
            screen: Screen::new(),
            out: io::stdout(),
        })
    }

    fn open(&mut self, view: ViewId, credential: &str) {
        match transport::spawn_session(view, &self.ws_url, credential, self.events_tx.clone()) {
            Ok(handle) => {
                self.sessions.insert(view, handle);
            },
            Err(e) => {
                warn!(%view, error = %e, "cannot dial");
                self.pending.push_back(ClientEvent::TransportFailed { view, reason: e.to_string() });
            },
        }
    }

    fn fetch_history(&self, view: ViewId, scope: ConversationScope) {
        let history = self.history.clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let event = match history.fetch(&scope).await {
                Ok(records) => ClientEvent::HistoryLoaded { view, records },
                Err(e) => ClientEvent::HistoryFailed { view, reason: e.to_string() },
            };
            let _ = events.send(event).await;
        });
    }

    /// Forget connections that reported their end.
    fn retire(&mut self, event: &ClientEvent<Instant>) {
        if let ClientEvent::TransportClosed { view, .. } | ClientEvent::TransportFailed { view, .. } = event {
            self.sessions.remove(view);
        }
    }
}

/// Read stdin lines on a background task.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                },
            }
        }
    });

    rx
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn poll_input(&mut self) -> Result<Option<DriverInput<Self::Instant>>, Self::Error> {
        if let Some(event) = self.pending.pop_front() {
            self.retire(&event);
            return Ok(Some(DriverInput::Network(event)));
        }

        tokio::select! {
            biased;

            line = self.lines.recv(), if self.stdin_open => match line {
                Some(line) => Ok(Some(DriverInput::App(AppEvent::Line(line)))),
                None => {
                    // End of input behaves like /quit.
                    self.stdin_open = false;
                    Ok(Some(DriverInput::App(AppEvent::Line("/quit".to_string()))))
                },
            },

            Some(event) = self.events_rx.recv() => {
                self.retire(&event);
                Ok(Some(DriverInput::Network(event)))
            }

            () = tokio::time::sleep(TICK) => Ok(None),
        }
    }

    async fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
        match command {
            Command::Open { view, credential } => self.open(view, &credential),
            Command::Close { view, code, reason } => {
                let Some(handle) = self.sessions.get(&view) else {
                    debug!(%view, "close for unknown view");
                    return Ok(());
                };
                if handle.close(code, reason).await.is_err() {
                    self.sessions.remove(&view);
                    self.pending.push_back(ClientEvent::TransportClosed { view, reason: String::new() });
                }
            },
            Command::Abort { view } => {
                if let Some(handle) = self.sessions.remove(&view) {
                    handle.abort();
                }
            },
            Command::Send { view, frame } => {
                let Some(handle) = self.sessions.get(&view) else {
                    warn!(%view, "send on unknown view");
                    return Ok(());
                };
                match frame.encode() {
                    Ok(text) => {
                        if let Err(e) = handle.send(text).await {
                            warn!(%view, error = %e, "send failed");
                        }
                    },
                    Err(e) => warn!(%view, error = %e, "cannot encode frame"),
                }
            },
            Command::FetchHistory { view, scope } => self.fetch_history(view, scope),
        }
        Ok(())
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App, keys: &KeyStore) -> Result<(), Self::Error> {
        let lines = self.screen.update(app, keys);
        if lines.is_empty() {
            return Ok(());
        }

        let mut out = self.out.lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        for handle in std::mem::take(&mut self.sessions).into_values() {
            handle.abort();
        }
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
