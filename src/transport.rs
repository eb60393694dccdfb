use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{is_transient, FrameQueryError, Result};

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("framequery-rust/", env!("CARGO_PKG_VERSION"));

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff for retry `attempt` (0-based): 500ms doubling, capped at 30s.
pub(crate) fn backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Delay before the next attempt. A server `Retry-After` wins over backoff.
/// Values too large for a `Duration` saturate.
pub(crate) fn retry_delay(attempt: u32, retry_after: Option<f64>) -> Duration {
    match retry_after {
        Some(secs) => Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX),
        None => backoff(attempt),
    }
}

/// `Retry-After` as seconds. The HTTP-date form is ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Runs `fut` unless `cancel` fires first, in which case `fut` is dropped.
pub(crate) async fn cancellable<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(FrameQueryError::Cancelled { job_id: None }),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}

/// Whether a request carries the API key. Signed upload URLs authorize
/// themselves and must not receive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    Bearer,
    Anonymous,
}

/// HTTP plumbing shared by every client operation: auth headers, the
/// per-attempt timeout, retry with backoff, and status-to-error mapping.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: Url,
    authorization: HeaderValue,
    user_agent: HeaderValue,
    max_retries: u32,
    timeout: Duration,
}

impl Transport {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        user_agent: &str,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let base_url = Url::parse(base).map_err(|err| FrameQueryError::InvalidUrl {
            url: base.to_string(),
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FrameQueryError::InvalidUrl {
                url: base.to_string(),
                reason: "not a hierarchical URL".into(),
            });
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            FrameQueryError::Authentication {
                message: "API key contains characters not allowed in an HTTP header".into(),
            }
        })?;
        authorization.set_sensitive(true);

        let user_agent = HeaderValue::from_str(user_agent).unwrap_or_else(|_| {
            warn!(user_agent, "ignoring user agent that is not a valid header value");
            HeaderValue::from_static(DEFAULT_USER_AGENT)
        });

        Ok(Self {
            http,
            base_url,
            authorization,
            user_agent,
            max_retries,
            timeout,
        })
    }

    /// API URL for the given path segments. Each segment is percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can always take path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends a JSON API request and returns the decoded body, envelope intact.
    /// A 2xx with an empty body decodes as `null`.
    pub(crate) async fn request_json(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value> {
        let response = self
            .execute(Auth::Bearer, cancel, || {
                let req = self.http.request(method.clone(), url.clone());
                match body {
                    Some(json) => req.json(json),
                    None => req,
                }
            })
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = cancellable(cancel, response.bytes()).await??;

        if !status.is_success() {
            return Err(error_from_response(status, &headers, &bytes));
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// PUTs raw bytes to a signed upload URL, without the bearer header.
    pub(crate) async fn put_bytes(
        &self,
        upload_url: &str,
        data: Bytes,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let url = Url::parse(upload_url).map_err(|err| FrameQueryError::InvalidUrl {
            url: upload_url.to_string(),
            reason: err.to_string(),
        })?;

        let response = self
            .execute(Auth::Anonymous, cancel, || {
                self.http
                    .put(url.clone())
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(data.clone())
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = cancellable(cancel, response.text())
            .await?
            .unwrap_or_default();
        Err(FrameQueryError::Upload {
            status_code: status.as_u16(),
            message: text,
        })
    }

    /// Sends the request built by `build`, retrying 5xx, 429 and transient
    /// network failures up to `max_retries` extra times. The last response is
    /// returned as-is, whatever its status.
    async fn execute<F>(
        &self,
        auth: Auth,
        cancel: Option<&CancellationToken>,
        build: F,
    ) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let mut req = build()
                .timeout(self.timeout)
                .header(USER_AGENT, self.user_agent.clone());
            if auth == Auth::Bearer {
                req = req.header(AUTHORIZATION, self.authorization.clone());
            }
            let req = req.build()?;
            let (method, path) = (req.method().clone(), req.url().path().to_string());
            debug!(%method, %path, attempt, "sending request");

            let can_retry = attempt < self.max_retries;
            let delay = match cancellable(cancel, self.http.execute(req)).await? {
                Ok(response) if can_retry && is_retryable_status(response.status()) => {
                    let delay = retry_delay(attempt, parse_retry_after(response.headers()));
                    warn!(
                        %method,
                        %path,
                        status = response.status().as_u16(),
                        attempt,
                        ?delay,
                        "retrying after server error"
                    );
                    delay
                }
                Ok(response) => return Ok(response),
                Err(err) if can_retry && is_transient(&err) => {
                    let delay = backoff(attempt);
                    warn!(
                        %method,
                        %path,
                        error = %err,
                        attempt,
                        ?delay,
                        "retrying after network error"
                    );
                    delay
                }
                Err(err) => return Err(FrameQueryError::Http(err)),
            };

            cancellable(cancel, tokio::time::sleep(delay)).await?;
            attempt += 1;
        }
    }
}

/// Maps a non-2xx response to a typed error.
pub(crate) fn error_from_response(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> FrameQueryError {
    let status_code = status.as_u16();
    let text = String::from_utf8_lossy(body).into_owned();
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|b| {
            b.get("error")
                .and_then(Value::as_str)
                .or_else(|| b.get("message").and_then(Value::as_str))
        })
        .map(str::to_string)
        .or_else(|| (!text.trim().is_empty()).then(|| text.clone()))
        .unwrap_or_else(|| format!("API error {status_code}"));

    match status_code {
        401 => FrameQueryError::Authentication { message },
        403 => FrameQueryError::PermissionDenied { message },
        404 => FrameQueryError::NotFound { message },
        429 => {
            let retry_after = parse_retry_after(headers).or_else(|| {
                parsed
                    .as_ref()
                    .and_then(|b| b.get("retryAfter"))
                    .and_then(Value::as_f64)
            });
            FrameQueryError::RateLimit {
                message,
                retry_after,
            }
        }
        _ => FrameQueryError::Api {
            status_code,
            message,
            body: parsed,
        },
    }
}
