use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::BoxError;

/// Server-side job status.
///
/// Unrecognised values are kept verbatim in [`JobStatus::Unknown`] so a newer
/// server never breaks parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    PendingUpload,
    PendingOrchestration,
    FfmpegProcessing,
    VisionApiProcessing,
    SttProcessing,
    Completed,
    CompletedNoScenes,
    Failed,
    Unknown(String),
}

impl JobStatus {
    /// Parse a wire status string; unknown values are kept as [`JobStatus::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING_UPLOAD" => Self::PendingUpload,
            "PENDING_ORCHESTRATION" => Self::PendingOrchestration,
            "FFMPEG_PROCESSING" => Self::FfmpegProcessing,
            "VISION_API_PROCESSING" => Self::VisionApiProcessing,
            "STT_PROCESSING" => Self::SttProcessing,
            "COMPLETED" => Self::Completed,
            "COMPLETED_NO_SCENES" => Self::CompletedNoScenes,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PendingUpload => "PENDING_UPLOAD",
            Self::PendingOrchestration => "PENDING_ORCHESTRATION",
            Self::FfmpegProcessing => "FFMPEG_PROCESSING",
            Self::VisionApiProcessing => "VISION_API_PROCESSING",
            Self::SttProcessing => "STT_PROCESSING",
            Self::Completed => "COMPLETED",
            Self::CompletedNoScenes => "COMPLETED_NO_SCENES",
            Self::Failed => "FAILED",
            Self::Unknown(raw) => raw,
        }
    }

    /// Won't change anymore.
    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }

    /// COMPLETED or COMPLETED_NO_SCENES.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedNoScenes)
    }

    /// FAILED.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub description: String,

    /// Seconds from video start.
    #[serde(rename = "endTs")]
    pub end_time: f64,

    /// e.g. "person", "car". Server order, duplicates kept.
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    #[serde(rename = "StartTime")]
    pub start_time: f64,

    #[serde(rename = "EndTime")]
    pub end_time: f64,

    #[serde(rename = "Text")]
    pub text: String,
}

/// Returned by `process` / `process_url` once the job completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub job_id: String,
    /// Always a successful-terminal status.
    pub status: JobStatus,
    pub filename: String,
    /// Video length in seconds.
    pub duration: f64,
    pub scenes: Vec<Scene>,
    pub transcript: Vec<TranscriptSegment>,
    /// ISO 8601.
    pub created_at: String,
    /// Full API response JSON.
    pub raw: Value,
}

/// Immutable snapshot of a job. Re-fetch with `get_job` to observe progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub filename: String,
    /// ISO 8601. Empty for handles built locally right after an upload.
    pub created_at: String,
    /// Server-provided ETA, if any.
    pub eta_seconds: Option<f64>,
    /// Full API response JSON.
    pub raw: Value,
}

impl Job {
    /// See [`JobStatus::is_terminal`].
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Finished successfully, with or without scenes.
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    /// Processing failed; see [`error_message`](Self::error_message).
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    /// `errorMessage` from the raw payload, or `""` when the server sent none.
    pub fn error_message(&self) -> &str {
        self.raw
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// The processing result, if this snapshot is successful-terminal.
    pub fn result(&self) -> Option<ProcessingResult> {
        self.is_complete()
            .then(|| parse_processing_result(self.raw.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quota {
    /// "free", "starter", "pro", or "enterprise".
    pub plan: String,

    /// Resets each billing period.
    #[serde(rename = "includedHours")]
    pub included_hours: f64,

    /// Purchased credits, never expire.
    #[serde(rename = "creditsBalanceHours")]
    pub credits_balance_hours: f64,

    /// When included hours reset, as formatted by the server.
    #[serde(rename = "resetDate")]
    pub reset_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    /// Pass to `list_jobs` for the next page. `None` means no more results.
    pub next_cursor: Option<String>,
}

impl JobPage {
    pub fn has_more(&self) -> bool {
        self.next_cursor.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Receives every job snapshot fetched while polling, before the loop looks
/// at its status. Returning `Err` stops the poll with
/// [`FrameQueryError::Progress`](crate::FrameQueryError::Progress).
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, job: &Job) -> Result<(), BoxError>;
}

impl<F> ProgressHandler for F
where
    F: Fn(&Job) + Send + Sync,
{
    fn on_progress(&self, job: &Job) -> Result<(), BoxError> {
        self(job);
        Ok(())
    }
}

/// Polling config for `process`, `process_url` and `wait_for_job`.
#[derive(Clone)]
pub struct ProcessOptions {
    /// Object name sent when creating the job. Defaults to the source's name.
    pub filename: Option<String>,
    /// Wait between polls when the server reports no long ETA. Default: 5s.
    pub poll_interval: Duration,
    /// Overall deadline for polling. Default: 24h.
    pub timeout: Duration,
    pub on_progress: Option<Arc<dyn ProgressHandler>>,
    /// Aborts in-flight requests, retry backoff and poll waits.
    pub cancel: Option<CancellationToken>,
}

impl ProcessOptions {
    /// Override the object name sent when creating the job.
    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Base wait between status fetches.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overall polling deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Called with every snapshot fetched while polling.
    pub fn on_progress(mut self, handler: impl ProgressHandler + 'static) -> Self {
        self.on_progress = Some(Arc::new(handler));
        self
    }

    /// Token that stops the upload and polling when cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            filename: None,
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(24 * 60 * 60),
            on_progress: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("filename", &self.filename)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Lenient parsing. A missing or mistyped field becomes its zero value.
// ---------------------------------------------------------------------------

fn str_field(val: &Value, key: &str) -> String {
    val.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn f64_field(val: &Value, key: &str) -> f64 {
    val.get(key).and_then(Value::as_f64).unwrap_or_default()
}

fn array_field<'a>(val: &'a Value, key: &str) -> &'a [Value] {
    val.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(crate) fn parse_job(val: Value) -> Job {
    Job {
        id: str_field(&val, "jobId"),
        status: JobStatus::parse(&str_field(&val, "status")),
        filename: str_field(&val, "originalFilename"),
        created_at: str_field(&val, "createdAt"),
        eta_seconds: val
            .get("estimatedCompletionTimeSeconds")
            .and_then(Value::as_f64),
        raw: val,
    }
}

fn parse_scene(val: &Value) -> Scene {
    Scene {
        description: str_field(val, "description"),
        end_time: f64_field(val, "endTs"),
        objects: array_field(val, "objects")
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    }
}

// The transcript keys are capitalised on the wire, unlike the rest of the API.
fn parse_transcript_segment(val: &Value) -> TranscriptSegment {
    TranscriptSegment {
        start_time: f64_field(val, "StartTime"),
        end_time: f64_field(val, "EndTime"),
        text: str_field(val, "Text"),
    }
}

pub(crate) fn parse_processing_result(val: Value) -> ProcessingResult {
    let processed = val.get("processedData").unwrap_or(&Value::Null);

    let duration = f64_field(processed, "length");
    let scenes = array_field(processed, "scenes")
        .iter()
        .map(parse_scene)
        .collect();
    let transcript = array_field(processed, "transcript")
        .iter()
        .map(parse_transcript_segment)
        .collect();

    ProcessingResult {
        job_id: str_field(&val, "jobId"),
        status: JobStatus::parse(&str_field(&val, "status")),
        filename: str_field(&val, "originalFilename"),
        duration,
        scenes,
        transcript,
        created_at: str_field(&val, "createdAt"),
        raw: val,
    }
}

pub(crate) fn parse_quota(val: &Value) -> Quota {
    Quota {
        plan: str_field(val, "plan"),
        included_hours: f64_field(val, "includedHours"),
        credits_balance_hours: f64_field(val, "creditsBalanceHours"),
        reset_date: val
            .get("resetDate")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
