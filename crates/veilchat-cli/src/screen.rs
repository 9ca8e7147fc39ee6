//! Line-oriented rendering.
//!
//! The terminal is append-only, so rendering is a diff: [`Screen`] remembers
//! what it already printed and turns the next App state into the lines that
//! are new. Pure (no I/O); the driver writes the lines out.

use veilchat_app::{App, display::display_messages};
use veilchat_client::{Connectivity, KeyStore};
use veilchat_core::MessageId;
use veilchat_proto::{ConversationScope, Identity};

/// What has been printed so far.
#[derive(Debug)]
pub struct Screen {
    scope: Option<ConversationScope>,
    shown: Vec<MessageId>,
    typing: Vec<Identity>,
    connectivity: Connectivity,
    status: Option<String>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    /// Blank screen for an App that has not rendered yet.
    pub fn new() -> Self {
        Self {
            scope: None,
            shown: Vec::new(),
            typing: Vec::new(),
            connectivity: Connectivity::Offline,
            status: None,
        }
    }

    /// Lines to print so the terminal reflects `app`.
    ///
    /// Order: conversation header, connectivity, messages, typing, status.
    pub fn update(&mut self, app: &App, keys: &KeyStore) -> Vec<String> {
        let mut lines = Vec::new();

        match app.conversation() {
            Some(view) => {
                if self.scope.as_ref() != Some(&view.scope) {
                    lines.push(format!("== {} ==", view.title(app.identity())));
                    self.scope = Some(view.scope.clone());
                    self.shown.clear();
                    self.typing.clear();
                }
            },
            None => {
                if self.scope.take().is_some() {
                    lines.push("== closed ==".to_string());
                }
                self.shown.clear();
                self.typing.clear();
            },
        }

        if app.connectivity() != self.connectivity {
            self.connectivity = app.connectivity();
            lines.push(format!("[{}]", connectivity_label(self.connectivity)));
        }

        if let Some(view) = app.conversation() {
            let ids: Vec<MessageId> = view.messages.iter().map(veilchat_core::Message::id).collect();
            let fresh = if ids.starts_with(&self.shown) {
                self.shown.len()
            } else {
                lines.push("-- history reloaded --".to_string());
                0
            };

            for message in display_messages(keys, app.identity(), &view.messages[fresh..]) {
                lines.push(format!("{} {}: {}", message.timestamp.format("%H:%M"), message.sender, message.text));
            }
            self.shown = ids;

            if view.typing != self.typing {
                self.typing.clone_from(&view.typing);
                if let Some(line) = typing_line(&self.typing) {
                    lines.push(line);
                }
            }
        }

        if app.status_message() != self.status.as_deref() {
            self.status = app.status_message().map(str::to_string);
            if let Some(status) = &self.status {
                lines.push(format!("> {status}"));
            }
        }

        lines
    }
}

fn connectivity_label(connectivity: Connectivity) -> String {
    match connectivity {
        Connectivity::Offline => "offline".to_string(),
        Connectivity::Connecting => "connecting".to_string(),
        Connectivity::Online => "online".to_string(),
        Connectivity::Reconnecting { attempt } => format!("reconnecting, attempt {attempt}"),
        Connectivity::Lost => "connection lost".to_string(),
    }
}

fn typing_line(typing: &[Identity]) -> Option<String> {
    let names: Vec<&str> = typing.iter().map(Identity::as_str).collect();
    match names.as_slice() {
        [] => None,
        [one] => Some(format!("* {one} is typing")),
        many => Some(format!("* {} are typing", many.join(", "))),
    }
}
