//! The chat session store.
//!
//! An ordered list of sessions, newest first, with at most one active.  The store is the only
//! owner of the list; every mutation writes the whole list through to storage.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::attachment::UserTurn;
use crate::error::{Error, Result};
use crate::storage::{CHAT_HISTORY_KEY, KeyValueStore, Storage};
use crate::types::{Locale, Message, Role};
use crate::utils::time::{self as timeutil, rfc3339};

/// Characters of the first user text that become the title.
pub const TITLE_LENGTH: usize = 30;

/// Identifier of a session: its creation time in Unix milliseconds, bumped when two sessions
/// would share a millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim().parse::<u64>().map(SessionId).map_err(|err| {
            Error::validation(format!("invalid session id {s:?}: {err}"), None)
        })
    }
}

/// One conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Identifier.
    pub id: SessionId,
    /// Display title.
    pub title: String,
    /// Creation time.
    #[serde(rename = "date", with = "rfc3339")]
    pub created_at: OffsetDateTime,
    /// Whether the session is listed in the pinned group.
    #[serde(default)]
    pub pinned: bool,
    /// The conversation.  Index 0 is always the welcome message.
    pub messages: Vec<Message>,
}

impl ChatSession {
    fn new(id: SessionId, created_at: OffsetDateTime, locale: Locale) -> Self {
        let strings = locale.strings();
        Self {
            id,
            title: strings.new_chat.to_string(),
            created_at,
            pinned: false,
            messages: vec![Message::assistant(strings.welcome)],
        }
    }

    /// The messages shown on screen: everything after the welcome message.
    pub fn visible_messages(&self) -> &[Message] {
        self.messages.get(1..).unwrap_or(&[])
    }

    /// True until the first user turn.
    pub fn is_fresh(&self) -> bool {
        self.messages.len() <= 1
    }
}

/// A plain-text export of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Suggested file name, `<title>-<millis>.txt`.
    pub file_name: String,
    /// `"<Role>: <content>"` blocks joined by blank lines.
    pub body: String,
}

impl Transcript {
    /// Export `session` with `millis` as the timestamp in the file name.
    pub fn new(session: &ChatSession, millis: u64) -> Self {
        let body = session
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role().export_label(), m.content()))
            .collect::<Vec<_>>()
            .join("\n\n");
        let stem = if session.title.is_empty() {
            "chat".to_string()
        } else {
            session.title.replace(['/', '\\'], "_")
        };
        Self {
            file_name: format!("{stem}-{millis}.txt"),
            body,
        }
    }

    /// Write the transcript into `dir` and return the full path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.body)
            .map_err(|err| Error::io(format!("failed to write {}", path.display()), err))?;
        Ok(path)
    }
}

/// The session list as it is displayed: pinned first, the rest by relative date.
#[derive(Debug, Default)]
pub struct SessionGroups<'a> {
    /// Pinned sessions, in list order.
    pub pinned: Vec<&'a ChatSession>,
    /// Unpinned sessions grouped by date label, groups in order of first appearance.
    pub recent: Vec<(String, Vec<&'a ChatSession>)>,
}

impl SessionGroups<'_> {
    /// Session ids in display order, for numbered selection.
    pub fn ordered_ids(&self) -> Vec<SessionId> {
        self.pinned
            .iter()
            .chain(self.recent.iter().flat_map(|(_, sessions)| sessions.iter()))
            .map(|session| session.id)
            .collect()
    }
}

/// The ordered session list and the active selection.
pub struct ChatSessionStore<S: KeyValueStore> {
    storage: Storage<S>,
    sessions: Vec<ChatSession>,
    active: Option<SessionId>,
    // Highest id ever handed out, including deleted sessions.
    last_id: u64,
}

impl<S: KeyValueStore> ChatSessionStore<S> {
    /// Load the persisted list and activate its first session.  An empty list has nothing
    /// active until [`Self::ensure_active`] or [`Self::create_session`] runs.
    pub fn load(storage: Storage<S>) -> Self {
        let sessions: Vec<ChatSession> = storage.load(CHAT_HISTORY_KEY);
        tracing::debug!(sessions = sessions.len(), "loaded chat history");
        let last_id = sessions.iter().map(|s| s.id.0).max().unwrap_or(0);
        let active = sessions.first().map(|s| s.id);
        Self {
            storage,
            sessions,
            active,
            last_id,
        }
    }

    /// The underlying storage, for preferences kept alongside the history.
    pub fn storage_mut(&mut self) -> &mut Storage<S> {
        &mut self.storage
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    /// All sessions, newest first.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// The active session's id.
    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    /// The active session.
    pub fn active(&self) -> Option<&ChatSession> {
        self.active.and_then(|id| self.get(id))
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: SessionId) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Make sure some session is active: keep the current one, else the first stored, else a
    /// new one.
    pub fn ensure_active(&mut self, locale: Locale) -> SessionId {
        if let Some(id) = self.active.filter(|id| self.get(*id).is_some()) {
            return id;
        }
        match self.sessions.first() {
            Some(first) => {
                self.active = Some(first.id);
                first.id
            }
            None => self.create_session(locale),
        }
    }

    /// Prepend a new session holding only the welcome message and make it active.
    pub fn create_session(&mut self, locale: Locale) -> SessionId {
        let now = timeutil::now();
        let millis = timeutil::unix_millis(now);
        let id = match self.last_id.checked_add(1) {
            Some(next) => {
                self.last_id = next.max(millis);
                SessionId(self.last_id)
            }
            // The counter is exhausted; any free id keeps sessions distinct.
            None => self.unused_id(millis),
        };
        self.sessions.insert(0, ChatSession::new(id, now, locale));
        self.active = Some(id);
        tracing::debug!(%id, "created session");
        self.persist();
        id
    }

    fn unused_id(&self, from: u64) -> SessionId {
        let mut candidate = from;
        while self.get(SessionId(candidate)).is_some() {
            candidate = candidate.wrapping_add(1);
        }
        SessionId(candidate)
    }

    /// Activate `id`.  Unknown ids are ignored and return false.
    pub fn select_session(&mut self, id: SessionId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Remove `id`.  If it was active the first remaining session takes over; if none remain a
    /// new one is created.
    pub fn delete_session(&mut self, id: SessionId, locale: Locale) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return false;
        }
        self.persist();
        if self.sessions.is_empty() {
            self.create_session(locale);
        } else if self.active == Some(id) {
            self.active = self.sessions.first().map(|s| s.id);
        }
        true
    }

    /// Replace the title.  Any string is accepted, including an empty one.
    pub fn rename_session(&mut self, id: SessionId, title: &str) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        session.title = title.to_string();
        self.persist();
        true
    }

    /// Flip the pinned flag.  The list order is untouched.
    pub fn toggle_pin(&mut self, id: SessionId) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        session.pinned = !session.pinned;
        self.persist();
        true
    }

    /// Append the user message and an empty assistant placeholder in one update.
    ///
    /// On the first real exchange the title becomes the first [`TITLE_LENGTH`] characters of the
    /// typed text (with `...` if it was longer), or the locale's file-upload title when only a
    /// file was sent.
    pub fn append_user_turn(&mut self, id: SessionId, turn: &UserTurn, locale: Locale) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        if session.is_fresh() {
            let mut title: String = turn.text.chars().take(TITLE_LENGTH).collect();
            if title.is_empty() && turn.has_attachment {
                title = locale.strings().file_upload.to_string();
            }
            if turn.text.chars().count() > TITLE_LENGTH {
                title.push_str("...");
            }
            session.title = title;
        }
        session.messages.push(Message::user(turn.content.clone()));
        session.messages.push(Message::assistant(""));
        self.persist();
        true
    }

    /// Append one character to the trailing assistant message.
    ///
    /// Does nothing (and returns false) when the last message is not from the assistant.
    pub fn append_assistant_char(&mut self, id: SessionId, c: char) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        match session.messages.last_mut() {
            Some(last) if last.role() == Role::Assistant => last.push_char(c),
            _ => {
                tracing::warn!(%id, "no assistant message to append to");
                return false;
            }
        }
        self.persist();
        true
    }

    /// Reset the conversation to a fresh welcome message.  The title is kept.
    pub fn clear_session(&mut self, id: SessionId, locale: Locale) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        session.messages = vec![Message::assistant(locale.strings().welcome)];
        self.persist();
        true
    }

    /// Export `id` as a plain-text transcript stamped with the current time.
    pub fn export(&self, id: SessionId) -> Option<Transcript> {
        let millis = timeutil::unix_millis(timeutil::now());
        self.get(id).map(|session| Transcript::new(session, millis))
    }

    /// Group the list for display relative to `now`.
    pub fn grouped(&self, locale: Locale, now: OffsetDateTime) -> SessionGroups<'_> {
        let mut groups = SessionGroups::default();
        for session in &self.sessions {
            if session.pinned {
                groups.pinned.push(session);
                continue;
            }
            let label = timeutil::relative_date_label(session.created_at, now, locale);
            match groups.recent.iter_mut().find(|(l, _)| *l == label) {
                Some((_, sessions)) => sessions.push(session),
                None => groups.recent.push((label, vec![session])),
            }
        }
        groups
    }

    fn persist(&mut self) {
        if let Err(err) = self.storage.save(CHAT_HISTORY_KEY, &self.sessions) {
            tracing::error!(error = %err, "could not save chat history");
        }
    }
}
