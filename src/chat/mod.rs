//! The chat application.
//!
//! This module provides the session store and the send pipeline behind the
//! `groqchat` REPL:
//!
//! - Multiple persisted sessions with one active at a time
//! - Streamed replies revealed with a typing effect
//! - Slash commands for session and preference control
//! - File attachments and voice input
//!
//! # Architecture
//!
//! - [`store`]: the ordered session list and its persistence
//! - [`session`]: the controller that runs a turn end to end
//! - [`commands`]: slash command parsing
//! - [`config`]: CLI argument parsing and configuration

pub mod commands;
pub mod config;
pub mod session;
pub mod store;

pub use crate::render::{PlainTextRenderer, Renderer, Theme};
pub use commands::{ChatCommand, SessionRef, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, data_dir};
pub use session::{ChatController, StopHandle, SubmissionGuard, SubmissionLock, TurnOutcome};
pub use store::{ChatSession, ChatSessionStore, SessionGroups, SessionId, Transcript};
