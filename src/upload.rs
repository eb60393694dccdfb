use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::envelope::unwrap_data;
use crate::errors::{FrameQueryError, Result};
use crate::models::{Job, JobStatus};
use crate::transport::{cancellable, Transport};

const FALLBACK_FILENAME: &str = "video.mp4";

/// What to upload: a file on disk or bytes already in memory.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Bytes),
}

impl UploadSource {
    /// Name sent to the API when the caller gives no override.
    fn default_filename(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| FALLBACK_FILENAME.to_string()),
            Self::Bytes(_) => FALLBACK_FILENAME.to_string(),
        }
    }

    async fn read(self) -> Result<Bytes> {
        match self {
            Self::Path(path) => Ok(Bytes::from(tokio::fs::read(&path).await?)),
            Self::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for UploadSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for UploadSource {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

impl From<Bytes> for UploadSource {
    fn from(data: Bytes) -> Self {
        Self::Bytes(data)
    }
}

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    #[serde(rename = "fileName")]
    file_name: &'a str,
}

#[derive(Serialize)]
struct CreateJobFromUrlRequest<'a> {
    url: &'a str,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn missing_field(data: Value, field: &str) -> FrameQueryError {
    FrameQueryError::Api {
        status_code: 200,
        message: format!("response is missing `{field}`"),
        body: Some(data),
    }
}

/// Creates a job, PUTs the whole payload to the signed URL it returns and
/// hands back a local job handle. No status fetch happens here.
pub(crate) async fn upload(
    transport: &Transport,
    source: UploadSource,
    filename: Option<&str>,
    cancel: Option<&CancellationToken>,
) -> Result<Job> {
    let filename = filename
        .map(str::to_string)
        .unwrap_or_else(|| source.default_filename());

    // Read before creating the job so an unreadable file leaves nothing behind.
    let payload = cancellable(cancel, source.read()).await??;

    let body = serde_json::to_value(CreateJobRequest {
        file_name: &filename,
    })?;
    let response = transport
        .request_json(Method::POST, transport.endpoint(&["jobs"]), Some(&body), cancel)
        .await?;
    let data = unwrap_data(response);

    let Some(job_id) = str_field(&data, "jobId").map(str::to_string) else {
        return Err(missing_field(data, "jobId"));
    };
    let Some(upload_url) = str_field(&data, "uploadUrl").map(str::to_string) else {
        return Err(missing_field(data, "uploadUrl"));
    };
    info!(%job_id, %filename, bytes = payload.len(), "job created, uploading");

    transport.put_bytes(&upload_url, payload, cancel).await?;
    info!(%job_id, "upload finished");

    let status = str_field(&data, "status")
        .map(JobStatus::parse)
        .unwrap_or(JobStatus::PendingUpload);

    Ok(Job {
        id: job_id,
        status,
        filename,
        created_at: String::new(),
        eta_seconds: None,
        raw: data,
    })
}

/// Asks the service to fetch `url` itself. Returns a handle without polling.
pub(crate) async fn submit_url(
    transport: &Transport,
    url: &str,
    filename: Option<&str>,
    cancel: Option<&CancellationToken>,
) -> Result<Job> {
    let body = serde_json::to_value(CreateJobFromUrlRequest {
        url,
        file_name: filename,
    })?;
    let response = transport
        .request_json(
            Method::POST,
            transport.endpoint(&["jobs", "from-url"]),
            Some(&body),
            cancel,
        )
        .await?;
    let data = unwrap_data(response);

    let Some(job_id) = str_field(&data, "jobId").map(str::to_string) else {
        return Err(missing_field(data, "jobId"));
    };
    let status = str_field(&data, "status")
        .map(JobStatus::parse)
        .unwrap_or(JobStatus::PendingUpload);
    info!(%job_id, %status, "URL submitted");

    Ok(Job {
        id: job_id,
        status,
        filename: filename.unwrap_or_default().to_string(),
        created_at: String::new(),
        eta_seconds: None,
        raw: data,
    })
}
