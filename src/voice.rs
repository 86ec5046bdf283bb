//! Voice input.
//!
//! Recognition is single-utterance: one call listens once and returns the transcript, which then
//! becomes the input line.  The terminal has no speech facility of its own, so the default
//! recognizer runs an external command and reads its standard output.

use std::io;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};
use crate::types::Locale;

/// Placeholder in a recognizer command replaced by the BCP 47 language tag.
pub const LANG_PLACEHOLDER: &str = "{lang}";

/// Turns one spoken utterance into text.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen for a single utterance in `locale` and return its transcript.
    async fn listen(&self, locale: Locale) -> Result<String>;
}

/// Recognizer backed by an external program.
///
/// The command line is split on whitespace (no shell is involved) and every `{lang}` is replaced
/// by `tr-TR` or `en-US`.  The trimmed stdout is the transcript.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: String,
}

impl CommandRecognizer {
    /// Wrap a command line.  Blank commands are rejected.
    pub fn new(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(Error::validation(
                "voice command is empty",
                Some("voice-command".to_string()),
            ));
        }
        Ok(Self { command })
    }

    fn argv(&self, locale: Locale) -> Vec<String> {
        self.command
            .split_whitespace()
            .map(|arg| arg.replace(LANG_PLACEHOLDER, locale.language_tag()))
            .collect()
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self, locale: Locale) -> Result<String> {
        let argv = self.argv(locale);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::validation("voice command is empty", None));
        };
        tracing::debug!(program, ?args, "starting speech recognizer");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|err| Error::io(format!("failed to start {program}"), err))?;
        if !output.status.success() {
            return Err(Error::io(
                format!("{program} failed"),
                io::Error::other(format!("exited with {}", output.status)),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Stand-in when no recognizer is configured; every call fails with [`Error::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecognizer;

#[async_trait::async_trait]
impl SpeechRecognizer for NoRecognizer {
    async fn listen(&self, locale: Locale) -> Result<String> {
        Err(Error::unsupported(locale.strings().voice_unsupported))
    }
}

/// The recognizer for an optional configured command.
pub fn recognizer(command: Option<&str>) -> Result<Box<dyn SpeechRecognizer>> {
    match command {
        Some(command) => Ok(Box::new(CommandRecognizer::new(command)?)),
        None => Ok(Box::new(NoRecognizer)),
    }
}
