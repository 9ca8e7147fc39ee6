//! Application state machine.
//!
//! This module defines the [`App`] state machine, which manages the interactive
//! state of the application completely decoupled from I/O and protocol
//! mechanics.
//!
//! This is a pure state machine: it consumes [`crate::AppEvent`] inputs and
//! produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Parses user lines into commands or outgoing messages.
//! - Mirrors the active conversation, the roster and connectivity for
//!   rendering.
//! - Refuses to send while the relay is not connected.

use veilchat_client::Connectivity;
use veilchat_proto::{ConversationScope, Identity, RoomId};

use crate::{AppAction, AppEvent, ConversationView};

/// Commands understood by [`App::handle`] on a `/` line.
pub const HELP: &str = "/dm <user>  /room <id>  /typing  /who  /close  /quit";

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App {
    /// Own identity.
    identity: Identity,
    /// Connectivity indicator.
    connectivity: Connectivity,
    /// Conversation on screen. `None` if none is open.
    conversation: Option<ConversationView>,
    /// Identities online at the relay.
    roster: Vec<Identity>,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
}

impl App {
    /// Create a new App for `identity`.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            connectivity: Connectivity::Offline,
            conversation: None,
            roster: Vec::new(),
            status_message: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Line(line) => self.handle_line(&line),
            AppEvent::Tick => vec![],
            AppEvent::Connectivity(connectivity) => {
                self.connectivity = connectivity;
                vec![AppAction::Render]
            },
            AppEvent::ConversationOpened { scope } => {
                let view = ConversationView::new(scope);
                self.status_message = Some(format!("Opened {}", view.title(&self.identity)));
                self.conversation = Some(view);
                vec![AppAction::Render]
            },
            AppEvent::ConversationClosed => {
                self.conversation = None;
                vec![AppAction::Render]
            },
            AppEvent::MessageAppended(message) => {
                if let Some(view) = self.conversation.as_mut() {
                    view.messages.push(message);
                }
                vec![AppAction::Render]
            },
            AppEvent::HistoryReplaced(messages) => {
                if let Some(view) = self.conversation.as_mut() {
                    view.messages = messages;
                    view.history_error = None;
                }
                vec![AppAction::Render]
            },
            AppEvent::HistoryUnavailable { reason } => {
                if let Some(view) = self.conversation.as_mut() {
                    view.history_error = Some(reason.clone());
                }
                self.status_message = Some(format!("History unavailable: {reason}"));
                vec![AppAction::Render]
            },
            AppEvent::TypingChanged(typing) => {
                if let Some(view) = self.conversation.as_mut() {
                    view.typing = typing;
                }
                vec![AppAction::Render]
            },
            AppEvent::RosterUpdated(roster) => {
                self.roster = roster;
                vec![AppAction::Render]
            },
            AppEvent::ConnectionLost { reason } => {
                self.status_message = Some(format!("Connection lost: {reason}"));
                vec![AppAction::Render]
            },
            AppEvent::ReconnectScheduled { attempt, delay } => {
                self.status_message =
                    Some(format!("Reconnecting in {}ms (attempt {attempt})", delay.as_millis()));
                vec![AppAction::Render]
            },
            AppEvent::Error { message } => {
                self.status_message = Some(format!("Error: {message}"));
                vec![AppAction::Render]
            },
        }
    }

    fn handle_line(&mut self, line: &str) -> Vec<AppAction> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return vec![];
        }

        // Messages go out exactly as typed.
        let Some(command) = trimmed.strip_prefix('/') else {
            return self.send_message(line);
        };

        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (command, ""),
        };

        match name {
            "dm" if !argument.is_empty() => self.open_private(Identity::new(argument)),
            "room" => match argument.parse::<RoomId>() {
                Ok(room_id) => self.open_room(room_id),
                Err(_) => self.status("Usage: /room <id>"),
            },
            "typing" => self.typing(),
            "who" => self.show_roster(),
            "close" => self.close_conversation(),
            "quit" => self.quit(),
            "dm" => self.status("Usage: /dm <user>"),
            _ => self.status(format!("Unknown command /{name}. Commands: {HELP}")),
        }
    }

    /// Set a status message to display to the user.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    fn status(&mut self, message: impl Into<String>) -> Vec<AppAction> {
        self.set_status(message);
        vec![AppAction::Render]
    }

    /// Open a private conversation with `peer`.
    pub fn open_private(&self, peer: Identity) -> Vec<AppAction> {
        let scope = ConversationScope::private(self.identity.clone(), peer);
        vec![AppAction::OpenConversation { scope }, AppAction::Render]
    }

    /// Open a group room.
    pub fn open_room(&self, room_id: RoomId) -> Vec<AppAction> {
        vec![AppAction::OpenConversation { scope: ConversationScope::group(room_id) }, AppAction::Render]
    }

    /// Close the active conversation.
    pub fn close_conversation(&mut self) -> Vec<AppAction> {
        if self.conversation.is_none() {
            return self.status("No conversation open");
        }
        vec![AppAction::CloseConversation, AppAction::Render]
    }

    /// Send a message in the active conversation.
    pub fn send_message(&mut self, text: &str) -> Vec<AppAction> {
        if self.conversation.is_none() {
            return self.status("No conversation open. Try /dm <user> or /room <id>");
        }

        if self.connectivity != Connectivity::Online {
            return self.status("Not connected; message not sent");
        }

        vec![AppAction::SendMessage { plaintext: text.to_string() }, AppAction::Render]
    }

    /// Signal typing in the active room.
    pub fn typing(&mut self) -> Vec<AppAction> {
        match &self.conversation {
            Some(view) if view.scope.is_group() => {
                if self.connectivity == Connectivity::Online {
                    vec![AppAction::LocalInput]
                } else {
                    vec![]
                }
            },
            Some(_) => self.status("Typing indicators are only shown in rooms"),
            None => self.status("No conversation open"),
        }
    }

    /// Put the online roster in the status line.
    pub fn show_roster(&mut self) -> Vec<AppAction> {
        if self.roster.is_empty() {
            return self.status("Nobody online");
        }

        let names: Vec<&str> = self.roster.iter().map(Identity::as_str).collect();
        self.status(format!("Online: {}", names.join(", ")))
    }

    /// Quit the application.
    pub fn quit(&self) -> Vec<AppAction> {
        vec![AppAction::Quit]
    }

    /// Own identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Connectivity indicator.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Conversation on screen. `None` if none is open.
    pub fn conversation(&self) -> Option<&ConversationView> {
        self.conversation.as_ref()
    }

    /// Identities online at the relay.
    pub fn roster(&self) -> &[Identity] {
        &self.roster
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_app(scope: ConversationScope) -> App {
        let mut app = App::new(Identity::new("alice"));
        app.handle(AppEvent::ConversationOpened { scope });
        app.handle(AppEvent::Connectivity(Connectivity::Online));
        app
    }

    fn line(app: &mut App, text: &str) -> Vec<AppAction> {
        app.handle(AppEvent::Line(text.to_string()))
    }

    #[test]
    fn dm_command_opens_private_scope() {
        let mut app = App::new(Identity::new("alice"));

        let actions = line(&mut app, "/dm bob");

        assert_eq!(actions, vec![
            AppAction::OpenConversation { scope: ConversationScope::private("alice", "bob") },
            AppAction::Render,
        ]);
    }

    #[test]
    fn room_command_parses_id() {
        let mut app = App::new(Identity::new("alice"));

        assert!(matches!(
            line(&mut app, "/room 42").as_slice(),
            [AppAction::OpenConversation { scope: ConversationScope::Group(42) }, AppAction::Render]
        ));

        assert_eq!(line(&mut app, "/room lobby"), vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("Usage: /room <id>"));
    }

    #[test]
    fn plain_line_sends_when_online() {
        let mut app = online_app(ConversationScope::private("alice", "bob"));

        assert_eq!(line(&mut app, "  hello  "), vec![
            AppAction::SendMessage { plaintext: "  hello  ".to_string() },
            AppAction::Render,
        ]);
    }

    #[test]
    fn sending_blocked_while_offline() {
        let mut app = online_app(ConversationScope::private("alice", "bob"));
        app.handle(AppEvent::Connectivity(Connectivity::Reconnecting { attempt: 1 }));

        let actions = line(&mut app, "hello");

        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("Not connected; message not sent"));
    }

    #[test]
    fn typing_only_in_rooms() {
        let mut room = online_app(ConversationScope::group(1));
        let mut dm = online_app(ConversationScope::private("alice", "bob"));

        assert_eq!(line(&mut room, "/typing"), vec![AppAction::LocalInput]);
        assert_eq!(line(&mut dm, "/typing"), vec![AppAction::Render]);
    }

    #[test]
    fn history_replaces_and_clears_error() {
        let mut app = online_app(ConversationScope::group(1));
        app.handle(AppEvent::HistoryUnavailable { reason: "503".to_string() });
        assert_eq!(app.conversation().unwrap().history_error.as_deref(), Some("503"));

        app.handle(AppEvent::HistoryReplaced(Vec::new()));

        assert!(app.conversation().unwrap().history_error.is_none());
    }

    #[test]
    fn who_lists_roster() {
        let mut app = App::new(Identity::new("alice"));
        app.handle(AppEvent::RosterUpdated(vec![Identity::new("alice"), Identity::new("bob")]));

        line(&mut app, "/who");

        assert_eq!(app.status_message(), Some("Online: alice, bob"));
    }

    #[test]
    fn unknown_command_reports_help() {
        let mut app = App::new(Identity::new("alice"));

        line(&mut app, "/nick zed");

        assert!(app.status_message().unwrap().starts_with("Unknown command /nick"));
    }

    #[test]
    fn quit_and_close() {
        let mut app = online_app(ConversationScope::group(1));

        assert_eq!(line(&mut app, "/close"), vec![AppAction::CloseConversation, AppAction::Render]);
        assert_eq!(line(&mut app, "/quit"), vec![AppAction::Quit]);
    }
}
