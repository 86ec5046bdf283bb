//! Server-Sent Events (SSE) processing for streaming completions.
//!
//! The completion endpoint speaks the OpenAI dialect of SSE: every event is a block of
//! `data: <json>` lines terminated by a blank line, and the stream ends with `data: [DONE]`.
//! This module turns the raw byte stream into [`SseEvent`]s.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::STREAM_BYTES;
use crate::{ChatCompletionChunk, Error, Result};

/// A decoded event of the completion stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// An incremental piece of the reply.
    Chunk(ChatCompletionChunk),

    /// The `[DONE]` sentinel; nothing follows.
    Done,
}

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    exhausted: bool,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// Bytes are buffered until a whole event is available, so multi-byte characters split across
/// network reads decode correctly.  Comment lines and events without data are skipped.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let state = SseState {
        stream,
        buffer: Vec::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            while let Some(block) = take_block(&mut state.buffer) {
                match parse_block(&block) {
                    Ok(Some(event)) => return Some((Ok(event), state)),
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), state)),
                }
            }

            if state.exhausted {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state
                        .buffer
                        .extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                }
                Some(Err(e)) => return Some((Err(e), state)),
                None => {
                    // A final event may arrive without its trailing blank line.
                    state.exhausted = true;
                    if state.buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                        state.buffer.extend_from_slice(b"\n\n");
                    } else {
                        state.buffer.clear();
                    }
                }
            }
        }
    })
}

/// Remove and return the first complete event block from `buffer`.
fn take_block(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let block = buffer[..end].to_vec();
    buffer.drain(..end + 2);
    Some(block)
}

#[derive(Deserialize)]
struct StreamErrorBody {
    error: StreamErrorDetail,
}

#[derive(Deserialize)]
struct StreamErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

/// Parse one event block.  `Ok(None)` means the block carried nothing of interest.
fn parse_block(block: &[u8]) -> Result<Option<SseEvent>> {
    let text = std::str::from_utf8(block)?;

    let mut data: Option<String> = None;
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    let Some(data) = data else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    if let Ok(body) = serde_json::from_str::<StreamErrorBody>(data) {
        return Err(Error::api(
            500,
            Some(
                body.error
                    .error_type
                    .unwrap_or_else(|| "stream_error".to_string()),
            ),
            body.error
                .message
                .unwrap_or_else(|| "error event in stream".to_string()),
            None,
        ));
    }

    serde_json::from_str::<ChatCompletionChunk>(data)
        .map(|chunk| Some(SseEvent::Chunk(chunk)))
        .map_err(|e| {
            Error::serialization(
                format!("Failed to parse chunk JSON: {e}"),
                Some(Box::new(e)),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const HELLO: &str = r#"data: {"id":"c1","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;

    fn chunk_text(event: &SseEvent) -> Option<&str> {
        match event {
            SseEvent::Chunk(chunk) => chunk.text(),
            SseEvent::Done => None,
        }
    }

    #[tokio::test]
    async fn parse_chunk_and_done() {
        let data = format!("{HELLO}\n\ndata: [DONE]\n\n");
        let stream = Box::pin(stream::once(async move { Ok(Bytes::from(data)) }));

        let mut sse_stream = Box::pin(process_sse(stream));
        let first = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(chunk_text(&first), Some("Hello"));

        let second = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(second, SseEvent::Done);

        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn handle_split_event() {
        let (head, tail) = HELLO.split_at(20);
        let stream = Box::pin(stream::iter(vec![
            Ok(Bytes::from(head.to_string())),
            Ok(Bytes::from(format!("{tail}\n"))),
            Ok(Bytes::from_static(b"\n")),
        ]));

        let mut sse_stream = Box::pin(process_sse(stream));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(chunk_text(&event), Some("Hello"));
    }

    #[tokio::test]
    async fn handle_multibyte_split_across_reads() {
        let event = r#"data: {"id":"c1","choices":[{"delta":{"content":"görsel"}}]}"#.to_string()
            + "\n\n";
        let bytes = event.into_bytes();
        let split = bytes.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let (head, tail) = bytes.split_at(split);
        let stream = Box::pin(stream::iter(vec![
            Ok(Bytes::from(head.to_vec())),
            Ok(Bytes::from(tail.to_vec())),
        ]));

        let mut sse_stream = Box::pin(process_sse(stream));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(chunk_text(&event), Some("görsel"));
    }

    #[tokio::test]
    async fn crlf_and_comments_are_tolerated() {
        let data = format!(": keep-alive\r\n\r\n{HELLO}\r\n\r\n");
        let stream = Box::pin(stream::once(async move { Ok(Bytes::from(data)) }));

        let mut sse_stream = Box::pin(process_sse(stream));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(chunk_text(&event), Some("Hello"));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let stream = Box::pin(stream::once(async {
            Ok(Bytes::from_static(b"data: [DONE]"))
        }));

        let mut sse_stream = Box::pin(process_sse(stream));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event, SseEvent::Done);
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn error_event_becomes_error() {
        let data = b"data: {\"error\":{\"message\":\"over capacity\",\"type\":\"server_error\"}}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from_static(data)) }));

        let mut sse_stream = Box::pin(process_sse(stream));
        let event = sse_stream.next().await.unwrap();
        let err = event.unwrap_err();
        assert!(err.to_string().contains("over capacity"));
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn handle_malformed_event() {
        let data = b"data: {not json}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from_static(data)) }));

        let mut sse_stream = Box::pin(process_sse(stream));
        let event = sse_stream.next().await.unwrap();
        assert!(event.is_err());
    }
}
