// Public modules
pub mod chat_completion;
pub mod locale;
pub mod message;
pub mod model;

// Re-exports
pub use chat_completion::{
    ApiMessage, ChatCompletionChunk, ChatCompletionParams, ChunkChoice, ChunkDelta, FinishReason,
};
pub use locale::{Locale, Translations};
pub use message::{ContentPart, DEFAULT_IMAGE_PROMPT, ImageUrl, Message, MessageContent, Role};
pub use model::{KnownModel, Model};
