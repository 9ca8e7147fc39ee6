//! Command-line arguments.
//!
//! Every connection setting can also come from the environment, so a shell
//! profile can hold the relay address and credential.

use clap::Parser;
use veilchat_client::ClientConfig;
use veilchat_crypto::CipherSuite;
use veilchat_proto::{ConversationScope, Identity, RoomId};

/// Veilchat terminal client
#[derive(Parser, Debug, Clone)]
#[command(name = "veilchat")]
#[command(about = "End-to-end encrypted chat over a Veilchat relay")]
#[command(version)]
pub struct Args {
    /// Relay WebSocket base URL
    #[arg(long, env = "VEILCHAT_WS_URL", default_value = "ws://localhost:8000")]
    pub ws_url: String,

    /// Relay REST API base URL (history)
    #[arg(long, env = "VEILCHAT_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Username to chat as
    #[arg(short, long, env = "VEILCHAT_USER")]
    pub user: String,

    /// Bearer credential issued by the relay
    #[arg(short, long, env = "VEILCHAT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Open a private conversation with this user on start
    #[arg(long, conflicts_with = "room")]
    pub peer: Option<String>,

    /// Join this room on start
    #[arg(long)]
    pub room: Option<RoomId>,

    /// Message cipher (aes-gcm, chacha20-poly1305)
    #[arg(long, default_value = "aes-gcm")]
    pub cipher: CipherSuite,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Own identity.
    pub fn identity(&self) -> Identity {
        Identity::new(self.user.as_str())
    }

    /// Conversation to open at start-up, if any.
    pub fn initial_scope(&self) -> Option<ConversationScope> {
        match (&self.peer, self.room) {
            (Some(peer), _) => Some(ConversationScope::private(self.identity(), peer.as_str())),
            (None, Some(room_id)) => Some(ConversationScope::group(room_id)),
            (None, None) => None,
        }
    }

    /// Session tunables; everything but the cipher keeps its default.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig { suite: self.cipher, ..ClientConfig::default() }
    }
}
