use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by a failing [`ProgressHandler`](crate::ProgressHandler).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors that can occur when using the FrameQuery SDK.
#[derive(Error, Debug)]
pub enum FrameQueryError {
    /// The API key is missing or invalid (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The key is valid but may not access this resource (HTTP 403).
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// HTTP 404.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// HTTP 429 that persisted through every retry.
    #[error("rate limited (retry after {retry_after:?}s): {message}")]
    RateLimit {
        message: String,
        retry_after: Option<f64>,
    },

    /// Any other non-2xx response. `body` has the parsed JSON if it was valid.
    #[error("API error {status_code}: {message}")]
    Api {
        status_code: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// The job reached the `FAILED` status while being polled.
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// Polling exceeded the overall deadline.
    #[error("timed out after {timeout:?} waiting for job {job_id}")]
    Timeout { job_id: String, timeout: Duration },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled { job_id: Option<String> },

    /// Request construction or network failure (DNS, TLS, reset, per-request timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The signed upload URL rejected the file.
    #[error("upload to signed URL failed with status {status_code}: {message}")]
    Upload { status_code: u16, message: String },

    /// The base URL or a signed upload URL could not be used.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Reading the local video file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A 2xx response whose body was not JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The progress handler returned an error.
    #[error("progress handler failed: {0}")]
    Progress(#[source] BoxError),
}

impl FrameQueryError {
    /// HTTP status carried by the error, if it came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::PermissionDenied { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::RateLimit { .. } => Some(429),
            Self::Api { status_code, .. } | Self::Upload { status_code, .. } => Some(*status_code),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the transport would retry a failure of this kind.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Api { status_code, .. } | Self::Upload { status_code, .. } => *status_code >= 500,
            Self::Http(err) => is_transient(err),
            _ => false,
        }
    }
}

/// Connection and timeout failures are worth another attempt; a request that
/// could not even be built is not.
pub(crate) fn is_transient(err: &reqwest::Error) -> bool {
    !err.is_builder() && !err.is_decode() && !err.is_redirect()
}

/// A convenience alias for `Result<T, FrameQueryError>`.
pub type Result<T> = std::result::Result<T, FrameQueryError>;
