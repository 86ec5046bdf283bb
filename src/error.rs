//! Error types for groqchat.
//!
//! Every fallible operation in the crate returns [`Result`].  Stream cancellation is deliberately
//! absent from this enum: a stopped reply is an outcome, not a failure.

use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for groqchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// The completion endpoint answered with a status we do not map more precisely.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error type string reported by the endpoint.
        error_type: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Request ID for debugging and support.
        request_id: Option<String>,
    },

    /// The API key was missing or rejected.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The API key is valid but may not use the resource.
    Permission {
        /// Human-readable error message.
        message: String,
    },

    /// The model or endpoint does not exist.
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Rate limit exceeded.
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// Bad request due to invalid parameters.
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Error code or parameter reported by the endpoint.
        param: Option<String>,
    },

    /// The request or the stream timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// Could not reach the endpoint.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Server returned a 500 internal error.
    InternalServer {
        /// Human-readable error message.
        message: String,
        /// Request ID for debugging and support.
        request_id: Option<String>,
    },

    /// Server is overloaded or unavailable.
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// JSON serialization or deserialization failed.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A value was rejected before any request was made.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// The event stream broke mid-reply.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A file selected for attachment could not be read.
    Attachment {
        /// Human-readable error message.
        message: String,
        /// The file that was being attached.
        path: PathBuf,
    },

    /// A facility the caller asked for is not available here.
    Unsupported {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(
        status_code: u16,
        error_type: Option<String>,
        message: String,
        request_id: Option<String>,
    ) -> Self {
        Error::Api {
            status_code,
            error_type,
            message,
            request_id,
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>, request_id: Option<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
            request_id,
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new attachment error for `path`.
    pub fn attachment(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::Attachment {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Creates a new unsupported-facility error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error is related to rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if this error came from the server side of the exchange.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => *status_code >= 500,
            Error::InternalServer { .. } | Error::ServiceUnavailable { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the same request might succeed later.
    pub fn is_transient(&self) -> bool {
        self.is_rate_limit() || self.is_timeout() || self.is_connection() || self.is_server_error()
    }

    /// Returns true if this error is an attachment failure.
    pub fn is_attachment(&self) -> bool {
        matches!(self, Error::Attachment { .. })
    }

    /// Returns true if the requested facility is unavailable.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    /// Returns the request ID associated with this error, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api { request_id, .. } | Error::InternalServer { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::Authentication { .. } => Some(401),
            Error::Permission { .. } => Some(403),
            Error::NotFound { .. } => Some(404),
            Error::RateLimit { .. } => Some(429),
            Error::InternalServer { .. } => Some(500),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                message,
                error_type,
                request_id,
                status_code,
            } => {
                match error_type {
                    Some(error_type) => write!(f, "{error_type} ({status_code}): {message}")?,
                    None => write!(f, "API error ({status_code}): {message}")?,
                }
                if let Some(request_id) = request_id {
                    write!(f, " (Request ID: {request_id})")?;
                }
                Ok(())
            }
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Permission error: {message}"),
            Error::NotFound { message } => write!(f, "Not found: {message}"),
            Error::RateLimit {
                message,
                retry_after: Some(retry_after),
            } => write!(
                f,
                "Rate limit exceeded: {message} (retry after {retry_after} seconds)"
            ),
            Error::RateLimit { message, .. } => write!(f, "Rate limit exceeded: {message}"),
            Error::BadRequest {
                message,
                param: Some(param),
            } => write!(f, "Bad request: {message} ({param})"),
            Error::BadRequest { message, .. } => write!(f, "Bad request: {message}"),
            Error::Timeout {
                message,
                duration: Some(duration),
            } => write!(f, "Timeout error: {message} ({duration} seconds)"),
            Error::Timeout { message, .. } => write!(f, "Timeout error: {message}"),
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::InternalServer {
                message,
                request_id: Some(request_id),
            } => write!(
                f,
                "Internal server error: {message} (Request ID: {request_id})"
            ),
            Error::InternalServer { message, .. } => write!(f, "Internal server error: {message}"),
            Error::ServiceUnavailable {
                message,
                retry_after: Some(retry_after),
            } => write!(
                f,
                "Service unavailable: {message} (retry after {retry_after} seconds)"
            ),
            Error::ServiceUnavailable { message, .. } => {
                write!(f, "Service unavailable: {message}")
            }
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Validation {
                message,
                param: Some(param),
            } => write!(f, "Validation error: {message} (parameter: {param})"),
            Error::Validation { message, .. } => write!(f, "Validation error: {message}"),
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
            Error::Attachment { message, path } => {
                write!(f, "Attachment error: {message} ({})", path.display())
            }
            Error::Unsupported { message } => write!(f, "Unsupported: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for groqchat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_request_id() {
        let err = Error::api(
            418,
            Some("teapot_error".to_string()),
            "short and stout".to_string(),
            Some("req_123".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "teapot_error (418): short and stout (Request ID: req_123)"
        );
        assert_eq!(err.request_id(), Some("req_123"));
        assert_eq!(err.status_code(), Some(418));
    }

    #[test]
    fn rate_limit_mentions_retry() {
        let err = Error::rate_limit("slow down", Some(7));
        assert!(err.is_rate_limit());
        assert!(err.to_string().contains("retry after 7 seconds"));
    }

    #[test]
    fn server_error_classification() {
        assert!(Error::internal_server("boom", None).is_server_error());
        assert!(Error::service_unavailable("busy", None).is_server_error());
        assert!(Error::api(503, None, "x".to_string(), None).is_server_error());
        assert!(!Error::bad_request("bad", None).is_server_error());
    }

    #[test]
    fn transient_errors() {
        assert!(Error::rate_limit("slow down", None).is_transient());
        assert!(Error::timeout("late", Some(1.0)).is_transient());
        assert!(Error::connection("refused", None).is_transient());
        assert!(Error::connection("refused", None).is_connection());
        assert!(Error::service_unavailable("busy", None).is_transient());
        assert!(!Error::authentication("bad key").is_transient());
        assert!(!Error::bad_request("bad", None).is_transient());
        assert_eq!(Error::authentication("bad key").status_code(), Some(401));
    }

    #[test]
    fn io_error_keeps_source() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn attachment_error_shows_path() {
        let err = Error::attachment("cannot read", "/tmp/missing.png");
        assert!(err.is_attachment());
        assert!(err.to_string().contains("/tmp/missing.png"));
    }
}
