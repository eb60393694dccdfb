use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::{FrameQueryError, Result};
use crate::models::{parse_processing_result, Job, ProcessOptions, ProcessingResult};
use crate::transport::cancellable;

/// ETAs above this many seconds switch polling to the adaptive cadence.
const ADAPTIVE_ETA_THRESHOLD_SECS: f64 = 60.0;
const MAX_ADAPTIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Wait before the next status fetch: a third of a long ETA, capped at 30s,
/// otherwise the configured interval.
pub(crate) fn next_interval(eta_seconds: Option<f64>, base: Duration) -> Duration {
    match eta_seconds {
        Some(eta) if eta > ADAPTIVE_ETA_THRESHOLD_SECS => {
            Duration::from_secs_f64((eta / 3.0).min(MAX_ADAPTIVE_INTERVAL.as_secs_f64()))
        }
        _ => base,
    }
}

/// Fetches `job_id` through `fetch` until it reaches a terminal status.
///
/// Fetches are strictly sequential. The progress handler sees every snapshot
/// before its status is checked. The overall deadline bounds in-flight
/// fetches as well as the waits between them, and the cancellation token
/// interrupts either.
pub(crate) async fn poll_until_done<F, Fut>(
    job_id: &str,
    opts: &ProcessOptions,
    mut fetch: F,
) -> Result<ProcessingResult>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Job>>,
{
    let deadline = Instant::now() + opts.timeout;
    let cancel = opts.cancel.as_ref();
    let timed_out = || FrameQueryError::Timeout {
        job_id: job_id.to_string(),
        timeout: opts.timeout,
    };
    let cancelled = || FrameQueryError::Cancelled {
        job_id: Some(job_id.to_string()),
    };

    loop {
        let fetched = cancellable(cancel, tokio::time::timeout_at(deadline, fetch()))
            .await
            .map_err(|_| cancelled())?;
        let job = fetched.map_err(|_| timed_out())??;

        if let Some(handler) = &opts.on_progress {
            handler.on_progress(&job).map_err(FrameQueryError::Progress)?;
        }

        if job.is_failed() {
            info!(job_id, "job failed");
            return Err(FrameQueryError::JobFailed {
                job_id: job_id.to_string(),
                message: job.error_message().to_string(),
            });
        }

        if job.is_complete() {
            info!(job_id, status = %job.status, "job finished");
            return Ok(parse_processing_result(job.raw));
        }

        let wait = next_interval(job.eta_seconds, opts.poll_interval);
        debug!(
            job_id,
            status = %job.status,
            eta_seconds = ?job.eta_seconds,
            ?wait,
            "job still running"
        );

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out());
        }
        let wake = (now + wait).min(deadline);
        cancellable(cancel, tokio::time::sleep_until(wake))
            .await
            .map_err(|_| cancelled())?;
        if wake == deadline {
            return Err(timed_out());
        }
    }
}
