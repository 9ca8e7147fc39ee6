//! Veilchat CLI entry point.
//!
//! # Usage
//!
//! ```bash
//! # Chat with bob on a local relay
//! VEILCHAT_USER=alice VEILCHAT_TOKEN=... veilchat --peer bob
//!
//! # Join room 7 on a remote relay
//! veilchat --ws-url wss://chat.example --api-url https://chat.example/api \
//!     --user alice --token ... --room 7
//! ```

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use veilchat_cli::{Args, Runtime, SystemEnv, TerminalDriver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    tracing::info!(user = %args.user, relay = %args.ws_url, cipher = %args.cipher, "veilchat starting");

    let driver = TerminalDriver::new(args.ws_url.clone(), &args.api_url, args.identity(), args.token.clone())?;
    let runtime = Runtime::new(
        driver,
        SystemEnv::new(),
        args.identity(),
        args.token.clone(),
        args.client_config(),
        args.initial_scope(),
    );

    Ok(runtime.run().await?)
}
