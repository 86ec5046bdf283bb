// Public modules
pub mod attachment;
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod storage;
pub mod types;
pub mod typewriter;
pub mod utils;
pub mod voice;

// Re-exports
pub use attachment::{Attachment, UserTurn};
pub use client::{Groq, StreamOutcome};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer, Theme};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Preferences, Storage};
pub use types::*;
pub use typewriter::{Typewriter, TypewriterFeed, TypewriterReport, TypewriterStop};
pub use voice::{CommandRecognizer, NoRecognizer, SpeechRecognizer};
