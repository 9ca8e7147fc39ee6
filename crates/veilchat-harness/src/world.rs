//! Multi-client simulated world.
//!
//! A [`SimWorld`] runs several full [`Runtime`] stacks against one
//! [`SimRelay`] on one virtual clock. Tests type lines into clients, let the
//! world settle, and then inspect transcripts and invariants.

use std::time::Duration;

use veilchat_app::{App, Runtime};
use veilchat_client::ClientConfig;
use veilchat_proto::Identity;

use crate::{
    invariants::{InvariantRegistry, SystemSnapshot, Violation},
    sim_driver::{SimDriver, SimDriverError},
    sim_env::SimEnv,
    sim_relay::SimRelay,
};

/// Upper bound on scheduling rounds in [`SimWorld::settle`].
const MAX_ROUNDS: usize = 10_000;

/// Index of a client in the world.
pub type ClientIndex = usize;

struct SimClient {
    runtime: Runtime<SimDriver, SimEnv>,
    handle: SimDriver,
    finished: bool,
}

/// Several clients sharing a relay and a clock.
pub struct SimWorld {
    env: SimEnv,
    relay: SimRelay,
    seed: u64,
    clients: Vec<SimClient>,
    registry: InvariantRegistry,
}

impl SimWorld {
    /// Empty world. Client RNGs are derived from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            relay: SimRelay::new(),
            seed,
            clients: Vec::new(),
            registry: InvariantRegistry::standard(),
        }
    }

    /// Shared relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Add a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails during startup.
    pub async fn add_client(&mut self, name: &str) -> Result<ClientIndex, SimDriverError> {
        self.add_client_with(name, ClientConfig::default()).await
    }

    /// Add a client with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails during startup.
    pub async fn add_client_with(
        &mut self,
        name: &str,
        config: ClientConfig,
    ) -> Result<ClientIndex, SimDriverError> {
        let index = self.clients.len();
        let env = self.env.fork(self.seed.wrapping_add(index as u64 + 1));
        let handle = SimDriver::new(env.clone(), self.relay.clone(), name)
            .with_invariants(InvariantRegistry::standard());

        let mut runtime = Runtime::new(
            handle.clone(),
            env,
            Identity::new(name),
            format!("token-{name}"),
            config,
            None,
        );
        runtime.start().await?;

        self.clients.push(SimClient { runtime, handle, finished: false });
        Ok(index)
    }

    /// Type `line` into a client and settle.
    ///
    /// # Errors
    ///
    /// Returns an error if any driver fails.
    pub async fn line(&mut self, client: ClientIndex, line: &str) -> Result<(), SimDriverError> {
        if let Some(c) = self.clients.get(client) {
            c.handle.inject_line(line);
        }
        self.settle().await
    }

    /// Move the clock forward, give every client a tick, then settle.
    ///
    /// # Errors
    ///
    /// Returns an error if any driver fails.
    pub async fn advance(&mut self, duration: Duration) -> Result<(), SimDriverError> {
        self.env.advance(duration);
        for client in self.clients.iter_mut().filter(|c| !c.finished) {
            if client.runtime.step().await? {
                client.runtime.shutdown().await?;
                client.finished = true;
            }
        }
        self.settle().await
    }

    /// Run every client until no input is pending anywhere.
    ///
    /// Clients are stepped round-robin, one input at a time, so frames
    /// produced by one client interleave with the others the way they would
    /// on a shared relay.
    ///
    /// # Errors
    ///
    /// Returns an error if any driver fails or the world does not settle.
    pub async fn settle(&mut self) -> Result<(), SimDriverError> {
        for _ in 0..MAX_ROUNDS {
            let mut progressed = false;

            for client in self.clients.iter_mut().filter(|c| !c.finished) {
                if !client.handle.has_pending() {
                    continue;
                }
                progressed = true;
                if client.runtime.step().await? {
                    client.runtime.shutdown().await?;
                    client.finished = true;
                }
            }

            if !progressed {
                return Ok(());
            }
        }

        Err(SimDriverError(format!("world did not settle after {MAX_ROUNDS} rounds")))
    }

    /// Driver handle of a client.
    ///
    /// # Panics
    ///
    /// If `client` was not returned by [`add_client`](Self::add_client).
    pub fn driver(&self, client: ClientIndex) -> &SimDriver {
        &self.clients[client].handle
    }

    /// Application state of a client.
    ///
    /// # Panics
    ///
    /// If `client` was not returned by [`add_client`](Self::add_client).
    pub fn app(&self, client: ClientIndex) -> &App {
        self.clients[client].runtime.app()
    }

    /// Runtime of a client.
    ///
    /// # Panics
    ///
    /// If `client` was not returned by [`add_client`](Self::add_client).
    pub fn runtime(&self, client: ClientIndex) -> &Runtime<SimDriver, SimEnv> {
        &self.clients[client].runtime
    }

    /// Whether a client has quit.
    pub fn finished(&self, client: ClientIndex) -> bool {
        self.clients.get(client).is_some_and(|c| c.finished)
    }

    /// Last rendered state of every client.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_clients(self.clients.iter().filter_map(|c| c.handle.snapshot()).collect())
    }

    /// Check world-level invariants plus every violation seen at a render.
    ///
    /// # Errors
    ///
    /// Every violation found.
    pub fn check_invariants(&self) -> Result<(), Vec<Violation>> {
        let mut violations: Vec<Violation> =
            self.clients.iter().flat_map(|c| c.handle.violations()).collect();
        if let Err(found) = self.registry.check_all(&self.snapshot()) {
            violations.extend(found);
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Panic with context if any invariant was violated.
    ///
    /// # Panics
    ///
    /// If any invariant was violated.
    #[allow(clippy::panic)]
    pub fn assert_invariants(&self, context: &str) {
        if let Err(violations) = self.check_invariants() {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", messages.join("\n  "));
        }
    }
}
