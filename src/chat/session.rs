//! The send pipeline.
//!
//! [`ChatController`] ties the pieces together: a user turn is composed, written into the session
//! store, streamed from the endpoint into the typewriter, and revealed one character at a time
//! into both the store and the renderer.  A [`SubmissionLock`] keeps turns from overlapping and a
//! [`StopHandle`] lets another thread (a Ctrl+C handler, say) stop the turn in flight.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::attachment::{Attachment, UserTurn};
use crate::chat::config::ChatConfig;
use crate::chat::store::{ChatSessionStore, SessionId};
use crate::client::{Groq, StreamOutcome};
use crate::error::{Error, Result};
use crate::render::{Renderer, Theme};
use crate::storage::{KeyValueStore, Preferences};
use crate::typewriter::{self, Typewriter, TypewriterStop};
use crate::types::{ApiMessage, Locale, Model, Role};
use crate::voice::{self, SpeechRecognizer};

/// How a call to [`ChatController::send`] ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Nothing to send: blank text and no attachment.
    Empty,
    /// Another turn was in flight; this one was dropped.
    Dropped,
    /// The reply was streamed and fully revealed.
    Completed {
        /// Characters revealed.
        revealed: usize,
    },
    /// The user stopped the reply; what was revealed stays.
    Cancelled {
        /// Characters revealed before the stop.
        revealed: usize,
    },
    /// The request or stream failed; what was revealed stays.
    Failed(Error),
}

/// The "submission in progress" flag.  Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct SubmissionLock {
    busy: Arc<AtomicBool>,
}

/// Releases the [`SubmissionLock`] when dropped.
#[derive(Debug)]
pub struct SubmissionGuard {
    busy: Arc<AtomicBool>,
}

impl SubmissionLock {
    /// Take the lock, or `None` if a submission is already in progress.
    pub fn try_acquire(&self) -> Option<SubmissionGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmissionGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// True while a submission holds the lock.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Stops the turn in flight from anywhere.  Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl StopHandle {
    /// Cancel the turn in flight.  Returns false when there was nothing to stop.
    pub fn stop(&self) -> bool {
        let Ok(current) = self.current.lock() else {
            return false;
        };
        match current.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn install(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(token.clone());
        }
        token
    }

    fn clear(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

/// Drives the chat: one store, one client, one turn at a time.
pub struct ChatController<S: KeyValueStore> {
    client: Groq,
    store: ChatSessionStore<S>,
    config: ChatConfig,
    prefs: Preferences,
    typewriter: Typewriter,
    recognizer: Box<dyn SpeechRecognizer>,
    lock: SubmissionLock,
    stop: StopHandle,
}

impl<S: KeyValueStore> ChatController<S> {
    /// Assemble a controller and make sure a session is active.
    pub fn new(client: Groq, mut store: ChatSessionStore<S>, config: ChatConfig) -> Result<Self> {
        let prefs = Preferences::load(store.storage());
        let recognizer = voice::recognizer(config.voice_command.as_deref())?;
        store.ensure_active(config.locale);
        Ok(Self {
            client: client
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature),
            typewriter: Typewriter::new(config.tick),
            store,
            config,
            prefs,
            recognizer,
            lock: SubmissionLock::default(),
            stop: StopHandle::default(),
        })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// The session store.
    pub fn store(&self) -> &ChatSessionStore<S> {
        &self.store
    }

    /// The session store, for list operations.
    pub fn store_mut(&mut self) -> &mut ChatSessionStore<S> {
        &mut self.store
    }

    /// A handle that stops the turn in flight.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The submission flag.
    pub fn submission_lock(&self) -> SubmissionLock {
        self.lock.clone()
    }

    /// The active session, creating one if needed.
    pub fn active_id(&mut self) -> SessionId {
        self.store.ensure_active(self.config.locale)
    }

    /// Start a new session.
    pub fn new_session(&mut self) -> SessionId {
        self.store.create_session(self.config.locale)
    }

    /// Delete a session.  No confirmation is asked here.
    pub fn delete_session(&mut self, id: SessionId) -> bool {
        self.store.delete_session(id, self.config.locale)
    }

    /// Reset the active session.
    pub fn clear_active(&mut self) -> bool {
        let id = self.active_id();
        self.store.clear_session(id, self.config.locale)
    }

    /// Write the active session's transcript into `dir`.
    pub fn export_active(&mut self, dir: &Path) -> Result<PathBuf> {
        let id = self.active_id();
        let transcript = self
            .store
            .export(id)
            .ok_or_else(|| Error::not_found(format!("session {id} not found")))?;
        transcript.write_to(dir)
    }

    /// Switch models for later turns.
    pub fn set_model(&mut self, model: Model) {
        tracing::info!(%model, "model changed");
        self.config.model = model;
    }

    /// Switch and persist the language.
    pub fn set_locale(&mut self, locale: Locale) -> Result<()> {
        self.config.locale = locale;
        self.prefs.save_locale(self.store.storage_mut(), locale)
    }

    /// Switch and persist the palette.
    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.config.theme = theme;
        self.prefs
            .save_dark_mode(self.store.storage_mut(), theme.is_dark())
    }

    /// Change and persist the display name.
    pub fn set_username(&mut self, username: &str) -> Result<()> {
        self.config.username = username.to_string();
        self.prefs.save_username(self.store.storage_mut(), username)
    }

    /// Listen for one utterance with the configured recognizer.
    pub async fn listen(&self) -> Result<String> {
        self.recognizer.listen(self.config.locale).await
    }

    /// Send one user turn and stream the reply into the active session.
    ///
    /// Blank input without an attachment is ignored, and a send while another is in flight is
    /// dropped.  Failures and stops leave the partially revealed reply in place.
    pub async fn send(
        &mut self,
        text: &str,
        attachment: Option<&Attachment>,
        renderer: &mut dyn Renderer,
    ) -> TurnOutcome {
        if text.trim().is_empty() && attachment.is_none() {
            return TurnOutcome::Empty;
        }
        let Some(_guard) = self.lock.try_acquire() else {
            tracing::debug!("send dropped, a turn is in flight");
            return TurnOutcome::Dropped;
        };

        let locale = self.config.locale;
        let id = self.store.ensure_active(locale);
        let turn = UserTurn::compose(text, attachment, locale).await;
        self.store.append_user_turn(id, &turn, locale);

        let history: Vec<ApiMessage> = match self.store.get(id) {
            Some(session) => {
                let upto = session.messages.len().saturating_sub(1);
                session.messages[..upto].iter().map(ApiMessage::from).collect()
            }
            None => Vec::new(),
        };
        let model = self.config.model.clone();

        renderer.start_reply(Role::Assistant.export_label());
        let cancel = self.stop.install();
        let halt = cancel.child_token();
        let (feed, events) = typewriter::channel();

        let client = &self.client;
        let store = &mut self.store;
        let producer = async {
            let result = client
                .send_message(
                    history,
                    &model,
                    |text| feed.push(text),
                    || feed.finish(),
                    &cancel,
                )
                .await;
            if result.is_err() {
                halt.cancel();
            }
            result
        };
        let consumer = self.typewriter.run(
            events,
            |c| {
                store.append_assistant_char(id, c);
                renderer.print_reply_char(c);
            },
            &halt,
        );
        let (result, report) = tokio::join!(producer, consumer);
        self.stop.clear();

        match result {
            Err(err) => {
                tracing::error!(
                    error = %err,
                    status = ?err.status_code(),
                    request_id = ?err.request_id(),
                    transient = err.is_transient(),
                    revealed = report.revealed,
                    "reply failed"
                );
                renderer.finish_reply();
                TurnOutcome::Failed(err)
            }
            Ok(StreamOutcome::Cancelled) => {
                tracing::debug!(revealed = report.revealed, "reply stopped");
                renderer.print_interrupted();
                TurnOutcome::Cancelled {
                    revealed: report.revealed,
                }
            }
            Ok(StreamOutcome::Completed) if report.stop == TypewriterStop::Cancelled => {
                tracing::debug!(revealed = report.revealed, "reply stopped while revealing");
                renderer.print_interrupted();
                TurnOutcome::Cancelled {
                    revealed: report.revealed,
                }
            }
            Ok(StreamOutcome::Completed) => {
                renderer.finish_reply();
                TurnOutcome::Completed {
                    revealed: report.revealed,
                }
            }
        }
    }
}
