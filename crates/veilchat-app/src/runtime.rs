//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: UI state machine
//! - [`Bridge`]: Protocol bridge to Client
//! - [`Driver`]: Platform-specific I/O

use std::{ops::Sub, time::Duration};

use veilchat_client::ClientConfig;
use veilchat_core::env::Environment;
use veilchat_proto::{ConversationScope, Identity};

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverInput};

/// Pause between polls while waiting for closes to complete on shutdown.
const CLOSE_POLL: Duration = Duration::from_millis(50);

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    app: App,
    bridge: Bridge<E>,
    initial: Option<ConversationScope>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    D::Instant: Sub<Output = Duration>,
{
    /// Create a new runtime for `identity`.
    ///
    /// `initial` is opened as soon as [`run`](Self::run) starts.
    pub fn new(
        driver: D,
        env: E,
        identity: Identity,
        credential: String,
        config: ClientConfig,
        initial: Option<ConversationScope>,
    ) -> Self {
        let app = App::new(identity.clone());
        let bridge = Bridge::new(env.clone(), identity, credential, config);
        Self { driver, env, app, bridge, initial }
    }

    /// Run the main event loop.
    ///
    /// This is the core orchestration loop that:
    /// 1. Polls the driver for user input and network reports
    /// 2. Processes actions and events between App and Bridge
    /// 3. Hands outgoing commands to the driver
    /// 4. Ticks the client for timeouts, typing and reconnects
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.start().await?;

        loop {
            if self.step().await? {
                break;
            }
        }

        self.shutdown().await
    }

    /// Render once and open the initial conversation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn start(&mut self) -> Result<(), D::Error> {
        self.driver.render(&self.app, self.bridge.keys())?;

        if let Some(scope) = self.initial.take() {
            self.process_actions(vec![AppAction::OpenConversation { scope }, AppAction::Render])
                .await?;
        }

        Ok(())
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        match self.driver.poll_input().await? {
            Some(DriverInput::App(event)) => {
                let actions = self.app.handle(event);
                if self.process_actions(actions).await? {
                    return Ok(true);
                }
            },
            Some(DriverInput::Network(event)) => {
                let events = self.bridge.handle_network(event);
                self.send_outgoing().await?;
                if self.process_bridge_events(events).await? {
                    return Ok(true);
                }
            },
            None => {},
        }

        let now = self.driver.now();
        let events = self.bridge.handle_tick(now);
        self.send_outgoing().await?;
        self.process_bridge_events(events).await
    }

    /// Close the session and stop the driver.
    ///
    /// Connections get until their close timeout to finish the graceful
    /// close before the driver tears everything down.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn shutdown(&mut self) -> Result<(), D::Error> {
        let events = self.bridge.shutdown();
        self.send_outgoing().await?;
        for event in events {
            self.app.handle(event);
        }

        self.await_closes().await?;
        self.driver.stop();
        Ok(())
    }

    /// Feed transport reports and ticks to the client until no connection
    /// is left closing. Closes that stall are aborted by the client's close
    /// timeout.
    async fn await_closes(&mut self) -> Result<(), D::Error> {
        while !self.bridge.client().closing_views().is_empty() {
            match self.driver.poll_input().await? {
                Some(DriverInput::Network(event)) => {
                    for event in self.bridge.handle_network(event) {
                        self.app.handle(event);
                    }
                },
                Some(DriverInput::App(_)) => {},
                None => self.env.sleep(CLOSE_POLL).await,
            }

            let now = self.driver.now();
            for event in self.bridge.handle_tick(now) {
                self.app.handle(event);
            }
            self.send_outgoing().await?;
        }

        Ok(())
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app, self.bridge.keys())?,
                    AppAction::Quit => return Ok(true),

                    // Protocol operations go through the bridge
                    AppAction::OpenConversation { .. }
                    | AppAction::CloseConversation
                    | AppAction::SendMessage { .. }
                    | AppAction::LocalInput => {
                        let events = self.bridge.process_app_action(action);
                        for event in events {
                            let new_actions = self.app.handle(event);
                            pending_actions.extend(new_actions);
                        }
                        self.send_outgoing().await?;
                    },
                }
            }
        }
        Ok(false)
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(&mut self, events: Vec<AppEvent>) -> Result<bool, D::Error> {
        for event in events {
            let actions = self.app.handle(event);
            if self.process_actions(actions).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Hand all pending commands to the driver.
    async fn send_outgoing(&mut self) -> Result<(), D::Error> {
        for command in self.bridge.take_outgoing() {
            self.driver.execute(command).await?;
        }
        Ok(())
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Get a reference to the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
