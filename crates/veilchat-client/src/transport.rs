//! WebSocket transport for the client.
//!
//! Provides [`TransportHandle`], which owns one relay connection for one
//! [`ViewId`]. This is a thin layer that just moves text frames - protocol
//! logic remains in the Sans-IO [`Client`](crate::Client). Everything the
//! socket does is reported back as a [`ClientEvent`] tagged with the view, so
//! the client can tell a replaced connection's late traffic from the active
//! one's.

use std::time::Instant;

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message as WsMessage,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, trace, warn};

use crate::event::{ClientEvent, ViewId};

/// Outbound queue depth per connection.
const OUTGOING_CAPACITY: usize = 32;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay URL could not be parsed.
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    /// The connection task is gone.
    #[error("connection closed")]
    Closed,
}

/// Commands for the connection task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

/// Handle to one relay connection.
///
/// Frames are sent via the handle, and an internal task handles the socket
/// I/O and reports lifecycle and inbound frames on the events channel.
pub struct TransportHandle {
    /// View the connection was dialled for.
    view: ViewId,
    /// Commands to the connection task.
    to_server: mpsc::Sender<Outgoing>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl TransportHandle {
    /// View this connection serves.
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Queue a text frame.
    pub async fn send(&self, text: String) -> Result<(), TransportError> {
        self.to_server.send(Outgoing::Text(text)).await.map_err(|_| TransportError::Closed)
    }

    /// Start a graceful close; `TransportClosed` follows once the relay
    /// acknowledges.
    pub async fn close(&self, code: u16, reason: String) -> Result<(), TransportError> {
        self.to_server.send(Outgoing::Close { code, reason }).await.map_err(|_| TransportError::Closed)
    }

    /// Drop the connection without a closing handshake.
    pub fn abort(&self) {
        self.abort_handle.abort();
    }
}

/// Relay URL for a session: `{ws_url}/ws?token={credential}`.
pub fn session_url(ws_url: &str, credential: &str) -> Result<Url, TransportError> {
    let base = format!("{}/ws", ws_url.trim_end_matches('/'));
    Url::parse_with_params(&base, [("token", credential)])
        .map_err(|e| TransportError::InvalidUrl(format!("{ws_url}: {e}")))
}

/// Dial the relay for `view` in a background task.
///
/// Returns immediately; the task reports `TransportOpened`, then any number
/// of `FrameReceived`, then exactly one of `TransportClosed` or
/// `TransportFailed`.
pub fn spawn_session(
    view: ViewId,
    ws_url: &str,
    credential: &str,
    events: mpsc::Sender<ClientEvent<Instant>>,
) -> Result<TransportHandle, TransportError> {
    let url = session_url(ws_url, credential)?;
    let (to_server_tx, to_server_rx) = mpsc::channel(OUTGOING_CAPACITY);

    let handle = tokio::spawn(run_session(view, url, to_server_rx, events));

    Ok(TransportHandle { view, to_server: to_server_tx, abort_handle: handle.abort_handle() })
}

/// Run the connection, bridging between the channels and the socket.
async fn run_session(
    view: ViewId,
    url: Url,
    mut to_server: mpsc::Receiver<Outgoing>,
    events: mpsc::Sender<ClientEvent<Instant>>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(%view, error = %e, "dial failed");
            let _ = events.send(ClientEvent::TransportFailed { view, reason: e.to_string() }).await;
            return;
        },
    };

    if events.send(ClientEvent::TransportOpened { view }).await.is_err() {
        return;
    }

    let (mut write, mut read) = stream.split();
    let mut outgoing_open = true;

    let terminal = loop {
        tokio::select! {
            command = to_server.recv(), if outgoing_open => match command {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::text(text)).await {
                        break ClientEvent::TransportFailed { view, reason: e.to_string() };
                    }
                },
                Some(Outgoing::Close { code, reason }) => {
                    debug!(%view, code, "closing");
                    let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                    if let Err(e) = write.send(WsMessage::Close(Some(frame))).await {
                        break ClientEvent::TransportFailed { view, reason: e.to_string() };
                    }
                },
                None => {
                    // Handle dropped: no more commands will arrive.
                    outgoing_open = false;
                    let _ = write.send(WsMessage::Close(None)).await;
                },
            },
            inbound = read.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    let text = text.as_str().to_owned();
                    if events.send(ClientEvent::FrameReceived { view, text }).await.is_err() {
                        return;
                    }
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                    break ClientEvent::TransportClosed { view, reason };
                },
                Some(Ok(other)) => trace!(%view, ?other, "ignoring non-text message"),
                Some(Err(e)) => break ClientEvent::TransportFailed { view, reason: e.to_string() },
                None => break ClientEvent::TransportClosed { view, reason: String::new() },
            },
        }
    };

    let _ = events.send(terminal).await;
}
