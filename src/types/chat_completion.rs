use serde::{Deserialize, Serialize};

use crate::types::{Message, MessageContent, Model, Role};

/// A message as sent to the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Who wrote the message.
    pub role: Role,

    /// Plain text or a caption/image pair.
    pub content: MessageContent,
}

impl From<&Message> for ApiMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            content: message.api_content(),
        }
    }
}

/// Request body of a chat-completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionParams {
    /// The model to run.
    pub model: Model,

    /// The conversation so far, oldest first.
    pub messages: Vec<ApiMessage>,

    /// Always true for this client.
    pub stream: bool,

    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionParams {
    /// Create streaming parameters for `messages`.
    pub fn new(model: Model, messages: Vec<ApiMessage>) -> Self {
        Self {
            model,
            messages,
            stream: true,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the token limit.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// One `data:` payload of the completion stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Completion identifier, shared by every chunk of a reply.
    #[serde(default)]
    pub id: String,

    /// Model that produced the chunk.
    #[serde(default)]
    pub model: Option<String>,

    /// Usually exactly one choice.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// The text carried by the first choice, if any and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// The finish reason of the first choice, if the reply ended here.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|choice| choice.finish_reason)
    }
}

/// A choice within a streamed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    #[serde(default)]
    pub index: u32,

    /// The incremental part.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the last chunk of the choice.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// The incremental part of a streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Present on the first chunk only.
    #[serde(default)]
    pub role: Option<Role>,

    /// Newly generated text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply.
    Stop,
    /// `max_tokens` reached.
    Length,
    /// The model wants to call a tool.
    ToolCalls,
    /// Output was filtered.
    ContentFilter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;
    use serde_json::{json, to_value};

    #[test]
    fn params_serialization() {
        let params = ChatCompletionParams::new(
            Model::Known(KnownModel::Llama31_8bInstant),
            vec![ApiMessage::from(&Message::user("Hi"))],
        )
        .with_max_tokens(Some(256));
        assert_eq!(
            to_value(&params).unwrap(),
            json!({
                "model": "llama-3.1-8b-instant",
                "messages": [{"role": "user", "content": "Hi"}],
                "stream": true,
                "max_tokens": 256
            })
        );
    }

    #[test]
    fn chunk_deserialization() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","created":1,"model":"llama-3.1-8b-instant","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"},"logprobs":null,"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.text(), Some("Hel"));
        assert_eq!(chunk.finish_reason(), None);
    }

    #[test]
    fn final_chunk_has_finish_reason_and_no_text() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"x_groq":{"id":"req_1"}}"#,
        )
        .unwrap();
        assert_eq!(chunk.text(), None);
        assert_eq!(chunk.finish_reason(), Some(FinishReason::Stop));
    }
}
