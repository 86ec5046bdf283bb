use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prompt sent alongside an image when the user typed no caption.
pub const DEFAULT_IMAGE_PROMPT: &str = "Bu görsel hakkında ne düşünüyorsun?";

static EMBEDDED_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[.*?\]\((data:image/.*?;base64,.*?)\)").expect("embedded image pattern")
});

/// Who authored a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person at the keyboard.
    User,

    /// The model.
    Assistant,
}

impl Role {
    /// Label used in exported transcripts.
    pub fn export_label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "AI",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// The content of a message as the completion endpoint receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),

    /// A caption and an image.
    Multimodal(Vec<ContentPart>),
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text part.
    Text {
        /// The text.
        text: String,
    },

    /// Image part.
    ImageUrl {
        /// Where the image lives; here always a `data:` URI.
        image_url: ImageUrl,
    },
}

/// The URL wrapper of an `image_url` content part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// The URL, usually `data:image/...;base64,...`.
    pub url: String,
}

/// A role-tagged chat message.
///
/// `content` is what the user sees and what gets persisted.  When a user message embeds a base64
/// image in markdown, the two-part form the endpoint expects is worked out once, when the message
/// is built or loaded, and kept alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredMessage", into = "StoredMessage")]
pub struct Message {
    role: Role,
    content: String,
    parts: Option<Vec<ContentPart>>,
}

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: Role,
    content: String,
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Message::new(stored.role, stored.content)
    }
}

impl From<Message> for StoredMessage {
    fn from(message: Message) -> Self {
        StoredMessage {
            role: message.role,
            content: message.content,
        }
    }
}

impl Message {
    /// Create a message, resolving any embedded image.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let parts = match role {
            Role::User => extract_image_parts(&content),
            Role::Assistant => None,
        };
        Self {
            role,
            content,
            parts,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Who wrote the message.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The displayed (and persisted) text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// True when the message carries an image for the endpoint.
    pub fn is_multimodal(&self) -> bool {
        self.parts.is_some()
    }

    /// The content in the shape the completion endpoint expects.
    pub fn api_content(&self) -> MessageContent {
        match &self.parts {
            Some(parts) => MessageContent::Multimodal(parts.clone()),
            None => MessageContent::Text(self.content.clone()),
        }
    }

    /// Append one character.  Only assistant messages grow this way, so there is never an image
    /// to re-resolve.
    pub(crate) fn push_char(&mut self, c: char) {
        debug_assert_eq!(self.role, Role::Assistant);
        self.content.push(c);
    }
}

fn extract_image_parts(content: &str) -> Option<Vec<ContentPart>> {
    if !content.contains("data:image") {
        return None;
    }
    let captures = EMBEDDED_IMAGE.captures(content)?;
    let whole = captures.get(0)?.as_str();
    let url = captures.get(1)?.as_str().to_string();
    let caption = content.replacen(whole, "", 1);
    let caption = caption.trim();
    let text = if caption.is_empty() {
        DEFAULT_IMAGE_PROMPT.to_string()
    } else {
        caption.to_string()
    };
    Some(vec![
        ContentPart::Text { text },
        ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn plain_user_message() {
        let message = Message::user("Hi");
        assert!(!message.is_multimodal());
        assert_eq!(message.api_content(), MessageContent::Text("Hi".to_string()));
        assert_eq!(
            to_value(&message).unwrap(),
            json!({"role": "user", "content": "Hi"})
        );
    }

    #[test]
    fn image_without_caption_gets_default_prompt() {
        let message = Message::user("\n\n![Görsel](data:image/png;base64,iVBORw0KGgo=)");
        assert!(message.is_multimodal());
        let content = to_value(message.api_content()).unwrap();
        assert_eq!(
            content,
            json!([
                {"type": "text", "text": DEFAULT_IMAGE_PROMPT},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw0KGgo="}}
            ])
        );
    }

    #[test]
    fn image_with_caption_keeps_caption() {
        let message =
            Message::user("What is this?\n\n![Image](data:image/jpeg;base64,/9j/4AAQ)");
        match message.api_content() {
            MessageContent::Multimodal(parts) => {
                assert_eq!(
                    parts[0],
                    ContentPart::Text {
                        text: "What is this?".to_string()
                    }
                );
                assert_eq!(
                    parts[1],
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,/9j/4AAQ".to_string()
                        }
                    }
                );
            }
            other => panic!("expected multimodal content, got {other:?}"),
        }
    }

    #[test]
    fn assistant_messages_are_never_multimodal() {
        let message = Message::assistant("![x](data:image/png;base64,AAAA)");
        assert!(!message.is_multimodal());
    }

    #[test]
    fn image_mention_without_markdown_stays_text() {
        let message = Message::user("what does data:image mean?");
        assert!(!message.is_multimodal());
    }

    #[test]
    fn deserialization_resolves_images() {
        let message: Message = serde_json::from_value(json!({
            "role": "user",
            "content": "![a](data:image/gif;base64,R0lGOD)"
        }))
        .unwrap();
        assert!(message.is_multimodal());
        assert_eq!(message.content(), "![a](data:image/gif;base64,R0lGOD)");
    }

    #[test]
    fn push_char_appends() {
        let mut message = Message::assistant("");
        message.push_char('o');
        message.push_char('k');
        assert_eq!(message.content(), "ok");
    }
}
