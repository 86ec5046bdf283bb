use std::env;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_CANCELLATIONS, STREAM_CHUNKS, STREAM_DURATION,
};
use crate::sse::{SseEvent, process_sse};
use crate::types::{ApiMessage, ChatCompletionParams, Model};

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/";
const API_KEY_VAR: &str = "GROQ_API_KEY";
const BASE_URL_VAR: &str = "GROQ_BASE_URL";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How a streamed reply ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The endpoint finished the reply and the completion callback ran.
    Completed,

    /// The caller cancelled; no callback ran after the cancellation was observed.
    Cancelled,
}

/// Client for Groq's OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct Groq {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl Groq {
    /// Create a new Groq client.
    ///
    /// The API key can be provided directly or read from the GROQ_API_KEY environment variable.
    /// GROQ_BASE_URL, when set, replaces the default endpoint.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let base_url = env::var(BASE_URL_VAR).ok();
        Self::with_options(api_key, base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_VAR).map_err(|_| {
                Error::authentication(
                    "API key not provided and GROQ_API_KEY environment variable not set",
                )
            })?,
        };

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
            max_tokens: None,
            temperature: None,
        })
    }

    /// Limit the length of every reply.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature for every request.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// The endpoint requests go to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            Error::validation(
                "API key contains characters not allowed in a header",
                Some("api_key".to_string()),
            )
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            code: Option<String>,
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|parsed| parsed.error);
        let (error_type, message, code) = match detail {
            Some(detail) => (
                detail.error_type,
                detail.message.unwrap_or_else(|| body.clone()),
                detail.code,
            ),
            None => (None, body, None),
        };

        match status_code {
            400 => Error::bad_request(message, code),
            401 => Error::authentication(message),
            403 => Error::permission(message),
            404 => Error::not_found(message),
            408 => Error::timeout(message, None),
            429 => Error::rate_limit(message, retry_after),
            500 => Error::internal_server(message, request_id),
            502..=504 => Error::service_unavailable(message, retry_after),
            _ => Error::api(status_code, error_type, message, request_id),
        }
    }

    /// Open a streaming chat completion.
    ///
    /// Returns the decoded event stream once the endpoint has accepted the request.
    pub async fn stream(
        &self,
        mut params: ChatCompletionParams,
    ) -> Result<impl Stream<Item = Result<SseEvent>>> {
        params.stream = true;
        let url = self.base_url.join("chat/completions")?;

        CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(&params)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        Ok(process_sse(response.bytes_stream()))
    }

    /// Stream a reply to `messages`, one callback per text fragment.
    ///
    /// `on_chunk` runs zero or more times in arrival order, then `on_done` runs exactly once when
    /// the endpoint signals the end of the reply.  Once `cancel` fires the in-flight request is
    /// dropped, neither callback runs again, and the result is `Ok(StreamOutcome::Cancelled)`.
    pub async fn send_message<F, D>(
        &self,
        messages: Vec<ApiMessage>,
        model: &Model,
        on_chunk: F,
        on_done: D,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome>
    where
        F: FnMut(&str),
        D: FnOnce(),
    {
        let params = ChatCompletionParams::new(model.clone(), messages)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let start = Instant::now();
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                STREAM_CANCELLATIONS.click();
                return Ok(StreamOutcome::Cancelled);
            }
            stream = self.stream(params) => stream?,
        };
        let outcome = drive_stream(Box::pin(stream), on_chunk, on_done, cancel).await;
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        outcome
    }
}

/// Feed an event stream into the chunk/completion callbacks until it ends or `cancel` fires.
pub(crate) async fn drive_stream<S, F, D>(
    mut stream: S,
    mut on_chunk: F,
    on_done: D,
    cancel: &CancellationToken,
) -> Result<StreamOutcome>
where
    S: Stream<Item = Result<SseEvent>> + Unpin,
    F: FnMut(&str),
    D: FnOnce(),
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                STREAM_CANCELLATIONS.click();
                return Ok(StreamOutcome::Cancelled);
            }
            next = stream.next() => next,
        };
        match next {
            Some(Ok(SseEvent::Chunk(chunk))) => {
                STREAM_CHUNKS.click();
                if let Some(text) = chunk.text() {
                    on_chunk(text);
                }
            }
            Some(Ok(SseEvent::Done)) | None => break,
            Some(Err(e)) => return Err(e),
        }
    }
    on_done();
    Ok(StreamOutcome::Completed)
}
