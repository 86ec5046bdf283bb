//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage sessions and settings without sending messages
//! to the API.

use crate::chat::store::SessionId;
use crate::render::Theme;
use crate::types::Locale;

/// Numbers below this refer to a position in the session list; larger ones are session ids.
const MAX_LIST_INDEX: u64 = 1_000_000;

/// A reference to a session typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRef {
    /// One-based position in the displayed session list.
    Index(usize),
    /// A session identifier.
    Id(SessionId),
}

impl SessionRef {
    /// Resolve against the displayed order.
    pub fn resolve(self, ordered: &[SessionId]) -> Option<SessionId> {
        match self {
            SessionRef::Index(n) => n.checked_sub(1).and_then(|i| ordered.get(i)).copied(),
            SessionRef::Id(id) => ordered.contains(&id).then_some(id),
        }
    }
}

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new session.
    New,

    /// List the sessions.
    Chats,

    /// Activate a session.
    Open(SessionRef),

    /// Rename the active session; `None` asks for the title.
    Rename(Option<String>),

    /// Toggle the pin of a session, the active one by default.
    Pin(Option<SessionRef>),

    /// Delete a session, the active one by default.
    Delete(Option<SessionRef>),

    /// Reset the active session to its welcome message.
    Clear,

    /// Export the active session into a directory, the current one by default.
    Export(Option<String>),

    /// Stage a file for the next message.
    Attach(String),

    /// Drop the staged file.
    Detach,

    /// Fill the input from the speech recognizer.
    Voice,

    /// Change the model.
    Model(String),

    /// List the known models.
    Models,

    /// Set the language, or toggle it.
    Lang(Option<Locale>),

    /// Set the palette, or toggle it.
    Theme(Option<Theme>),

    /// Change the display name.
    Name(String),

    /// Print the active session.
    History,

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use groqchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model llama-3.3-70b-versatile").is_some());
/// assert!(parse_command("Merhaba!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "chats" | "list" => ChatCommand::Chats,
        "open" => match argument.map(parse_session_ref) {
            Some(Ok(target)) => ChatCommand::Open(target),
            Some(Err(err)) => ChatCommand::Invalid(format!("/open {err}")),
            None => ChatCommand::Invalid("/open requires a number or id".to_string()),
        },
        "rename" => ChatCommand::Rename(argument.map(|s| s.to_string())),
        "pin" => match argument.map(parse_session_ref).transpose() {
            Ok(target) => ChatCommand::Pin(target),
            Err(err) => ChatCommand::Invalid(format!("/pin {err}")),
        },
        "delete" | "rm" => match argument.map(parse_session_ref).transpose() {
            Ok(target) => ChatCommand::Delete(target),
            Err(err) => ChatCommand::Invalid(format!("/delete {err}")),
        },
        "clear" => ChatCommand::Clear,
        "export" => ChatCommand::Export(argument.map(|s| s.to_string())),
        "attach" => match argument {
            Some(path) => ChatCommand::Attach(path.to_string()),
            None => ChatCommand::Invalid("/attach requires a file path".to_string()),
        },
        "detach" => ChatCommand::Detach,
        "voice" | "mic" => ChatCommand::Voice,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "models" => ChatCommand::Models,
        "lang" => match argument.map(str::parse::<Locale>).transpose() {
            Ok(locale) => ChatCommand::Lang(locale),
            Err(err) => ChatCommand::Invalid(format!("/lang {err}")),
        },
        "theme" => match argument.map(parse_theme) {
            Some(Some(theme)) => ChatCommand::Theme(Some(theme)),
            Some(None) => ChatCommand::Invalid("/theme expects 'dark' or 'light'".to_string()),
            None => ChatCommand::Theme(None),
        },
        "name" => match argument {
            Some(name) => ChatCommand::Name(name.to_string()),
            None => ChatCommand::Invalid("/name requires a name".to_string()),
        },
        "history" => ChatCommand::History,
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_session_ref(arg: &str) -> Result<SessionRef, String> {
    let value: u64 = arg
        .trim_start_matches('#')
        .parse()
        .map_err(|_| "expects a list number or session id".to_string())?;
    if value == 0 {
        return Err("list numbers start at 1".to_string());
    }
    if value < MAX_LIST_INDEX {
        usize::try_from(value)
            .map(SessionRef::Index)
            .map_err(|_| "list number out of range".to_string())
    } else {
        Ok(SessionRef::Id(SessionId::new(value)))
    }
}

fn parse_theme(value: &str) -> Option<Theme> {
    match value.to_lowercase().as_str() {
        "dark" | "on" => Some(Theme::Dark),
        "light" | "off" => Some(Theme::Light),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new chat
  /chats                 List chats (pinned first, then by date)
  /open <n|id>           Switch to a chat
  /rename [title]        Rename the current chat
  /pin [n|id]            Pin or unpin a chat
  /delete [n|id]         Delete a chat (asks first)
  /clear                 Clear the current chat
  /export [dir]          Save the current chat as a text file
  /attach <path>         Attach a file to the next message
  /detach                Drop the attached file
  /voice                 Dictate the next message
  /model <name>          Change the model (e.g., /model llama-3.3-70b-versatile)
  /models                List known models
  /lang [tr|en]          Set or toggle the language
  /theme [dark|light]    Set or toggle the palette
  /name <name>           Change your display name
  /history               Show the current chat
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Ctrl+C stops a reply in progress; Ctrl+D exits."#
}
