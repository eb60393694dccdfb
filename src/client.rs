use std::time::Duration;

use reqwest::Method;

use crate::envelope::{split_page, unwrap_data};
use crate::errors::{FrameQueryError, Result};
use crate::models::{parse_job, parse_quota, Job, JobPage, ProcessOptions, ProcessingResult, Quota};
use crate::poll::poll_until_done;
use crate::transport::{Transport, DEFAULT_USER_AGENT};
use crate::upload::{self, UploadSource};

const DEFAULT_BASE_URL: &str = "https://api.framequery.com/v1/api";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const API_KEY_ENV: &str = "FRAMEQUERY_API_KEY";

/// Builder for constructing a [`Client`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use framequery::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> framequery::Result<()> {
/// let client = ClientBuilder::new()
///     .api_key("fq_live_abc123")
///     .base_url("https://custom.example.com/v1/api")
///     .max_retries(5)
///     .timeout(Duration::from_secs(120))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: String,
    max_retries: u32,
    timeout: Duration,
    user_agent: String,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http: None,
        }
    }

    /// Set the API key. Falls back to `FRAMEQUERY_API_KEY` when unset.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the base URL (defaults to `https://api.framequery.com/v1/api`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Extra attempts for 5xx, 429 and network failures (defaults to 2).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Timeout for each individual HTTP attempt (defaults to 5 minutes).
    /// Polling has its own, much longer deadline in [`ProcessOptions`].
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Override the `User-Agent` header (defaults to `framequery-rust/<version>`).
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Use a preconfigured `reqwest::Client` (proxies, TLS roots, pooling).
    /// The per-attempt timeout still applies on top of it.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the [`Client`].
    ///
    /// If no API key was set via [`api_key`](Self::api_key), the builder reads
    /// the `FRAMEQUERY_API_KEY` environment variable.
    ///
    /// Returns [`FrameQueryError::Authentication`] if no usable key is available.
    pub fn build(self) -> Result<Client> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| FrameQueryError::Authentication {
                message: "API key is required. Pass it to ClientBuilder::api_key() \
                          or set the FRAMEQUERY_API_KEY environment variable."
                    .into(),
            })?;

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().build()?,
        };

        let transport = Transport::new(
            http,
            &self.base_url,
            &api_key,
            &self.user_agent,
            self.max_retries,
            self.timeout,
        )?;

        Ok(Client { transport })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The FrameQuery API client.
///
/// Cheap to clone; clones share one connection pool. Configuration is fixed
/// at construction, so a single client can drive many jobs concurrently.
///
/// # Example
///
/// ```no_run
/// use framequery::Client;
///
/// # async fn example() -> framequery::Result<()> {
/// let client = Client::new("fq_live_abc123")?;
///
/// // Upload and process a video, blocking until complete
/// let result = client.process("video.mp4", Default::default()).await?;
/// println!("{} scenes detected", result.scenes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
}

impl Client {
    /// Client with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().api_key(api_key).build()
    }

    /// Client keyed from `FRAMEQUERY_API_KEY`.
    pub fn from_env() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Upload a video and poll until processing completes.
    ///
    /// Creates a job, PUTs the file to the signed URL the API returns, then
    /// polls until the job reaches a terminal status. `opts` sets the
    /// filename override, polling cadence, deadline, progress handler and
    /// cancellation token.
    ///
    /// # Errors
    ///
    /// - [`FrameQueryError::Io`] if the file cannot be read.
    /// - [`FrameQueryError::Upload`] if the signed URL rejects the file.
    /// - [`FrameQueryError::Timeout`] if polling exceeds `opts.timeout`.
    /// - [`FrameQueryError::JobFailed`] if the job reaches `FAILED` status.
    /// - [`FrameQueryError::Cancelled`] if `opts.cancel` fires.
    pub async fn process(
        &self,
        source: impl Into<UploadSource>,
        opts: ProcessOptions,
    ) -> Result<ProcessingResult> {
        let job = upload::upload(
            &self.transport,
            source.into(),
            opts.filename.as_deref(),
            opts.cancel.as_ref(),
        )
        .await?;
        self.wait_for_job(&job.id, &opts).await
    }

    /// Submit a URL for server-side download and poll until processing completes.
    ///
    /// # Errors
    ///
    /// - [`FrameQueryError::Timeout`] if polling exceeds `opts.timeout`.
    /// - [`FrameQueryError::JobFailed`] if the job reaches `FAILED` status.
    /// - [`FrameQueryError::Cancelled`] if `opts.cancel` fires.
    pub async fn process_url(&self, url: &str, opts: ProcessOptions) -> Result<ProcessingResult> {
        let job = upload::submit_url(
            &self.transport,
            url,
            opts.filename.as_deref(),
            opts.cancel.as_ref(),
        )
        .await?;
        self.wait_for_job(&job.id, &opts).await
    }

    /// Upload a video and return immediately with the created [`Job`].
    ///
    /// This performs two HTTP calls:
    /// 1. `POST /jobs` to create the job and obtain a signed upload URL.
    /// 2. `PUT` the file bytes to the signed URL.
    ///
    /// The returned handle is built locally with status `PENDING_UPLOAD`
    /// unless the API echoed one. Use [`get_job`](Self::get_job) or
    /// [`wait_for_job`](Self::wait_for_job) to follow it.
    pub async fn upload(
        &self,
        source: impl Into<UploadSource>,
        filename: Option<&str>,
    ) -> Result<Job> {
        upload::upload(&self.transport, source.into(), filename, None).await
    }

    /// Submit a URL for server-side download without waiting for the result.
    pub async fn submit_url(&self, url: &str, filename: Option<&str>) -> Result<Job> {
        upload::submit_url(&self.transport, url, filename, None).await
    }

    /// Poll an existing job until it completes, fails, times out or is cancelled.
    pub async fn wait_for_job(&self, job_id: &str, opts: &ProcessOptions) -> Result<ProcessingResult> {
        poll_until_done(job_id, opts, move || self.get_job(job_id)).await
    }

    /// Fetch the current state of a job by its identifier.
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let url = self.transport.endpoint(&["jobs", job_id]);
        let body = self.transport.request_json(Method::GET, url, None, None).await?;
        Ok(parse_job(unwrap_data(body)))
    }

    /// List jobs with optional filtering and pagination.
    ///
    /// # Parameters
    ///
    /// - `limit` — Maximum number of jobs to return per page (default decided by the API).
    /// - `cursor` — Cursor from a previous [`JobPage::next_cursor`] for pagination.
    /// - `status` — Filter to only jobs with this status (e.g. `"COMPLETED"`).
    pub async fn list_jobs(
        &self,
        limit: Option<u32>,
        cursor: Option<&str>,
        status: Option<&str>,
    ) -> Result<JobPage> {
        let mut url = self.transport.endpoint(&["jobs"]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
                query.append_pair("cursor", cursor);
            }
            if let Some(status) = status.filter(|s| !s.is_empty()) {
                query.append_pair("status", status);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let body = self
            .transport
            .request_json(Method::GET, url, None, None)
            .await?;
        let (items, next_cursor) = split_page(body);

        Ok(JobPage {
            jobs: items.into_iter().map(parse_job).collect(),
            next_cursor,
        })
    }

    /// Retrieve the account's plan, included hours and credit balance.
    pub async fn get_quota(&self) -> Result<Quota> {
        let body = self
            .transport
            .request_json(Method::GET, self.transport.endpoint(&["quota"]), None, None)
            .await?;
        Ok(parse_quota(&unwrap_data(body)))
    }
}
