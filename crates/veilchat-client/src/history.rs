//! REST history fetch.
//!
//! Stored history comes from the relay's HTTP API, authenticated with the
//! same bearer credential as the WebSocket. Results are returned untouched;
//! the [`Client`](crate::Client) decides whether they still apply.

use reqwest::Url;
use thiserror::Error;
use tracing::debug;
use veilchat_proto::{ConversationScope, Identity, MessageRecord};

/// History fetch errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The API base URL could not be used.
    #[error("invalid api url: {0}")]
    InvalidUrl(String),

    /// A private scope that does not include this identity.
    #[error("{identity} is not part of {scope}")]
    NotAParticipant {
        /// Own identity.
        identity: Identity,
        /// Requested scope.
        scope: ConversationScope,
    },

    /// Request, status or decoding failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// HTTP client for conversation history.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    api_url: Url,
    identity: Identity,
    credential: String,
}

impl HistoryClient {
    /// Client for the API at `api_url`.
    pub fn new(api_url: &str, identity: Identity, credential: String) -> Result<Self, HistoryError> {
        let api_url =
            Url::parse(api_url).map_err(|e| HistoryError::InvalidUrl(format!("{api_url}: {e}")))?;

        if api_url.cannot_be_a_base() {
            return Err(HistoryError::InvalidUrl(api_url.to_string()));
        }

        Ok(Self { http: reqwest::Client::new(), api_url, identity, credential })
    }

    /// Endpoint serving `scope`'s history.
    ///
    /// - Private: `{api}/messages/{other}`
    /// - Group: `{api}/rooms/{room_id}/messages`
    pub fn endpoint(&self, scope: &ConversationScope) -> Result<Url, HistoryError> {
        let mut url = self.api_url.clone();
        {
            let mut segments =
                url.path_segments_mut().map_err(|()| HistoryError::InvalidUrl(self.api_url.to_string()))?;
            segments.pop_if_empty();

            match scope {
                ConversationScope::Private(pair) => {
                    let other = pair.other(&self.identity).ok_or_else(|| {
                        HistoryError::NotAParticipant {
                            identity: self.identity.clone(),
                            scope: scope.clone(),
                        }
                    })?;
                    segments.push("messages").push(other.as_str());
                },
                ConversationScope::Group(room_id) => {
                    segments.push("rooms").push(&room_id.to_string()).push("messages");
                },
            }
        }
        Ok(url)
    }

    /// Fetch `scope`'s stored messages, ordered by timestamp.
    pub async fn fetch(&self, scope: &ConversationScope) -> Result<Vec<MessageRecord>, HistoryError> {
        let url = self.endpoint(scope)?;
        debug!(%scope, "fetching history");

        let records = self
            .http
            .get(url)
            .bearer_auth(&self.credential)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<MessageRecord>>()
            .await?;

        debug!(%scope, count = records.len(), "history fetched");
        Ok(records)
    }
}
