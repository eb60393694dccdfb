//! # FrameQuery SDK for Rust
//!
//! Async client for the [FrameQuery](https://framequery.com) video
//! processing API. Upload a video or submit a URL, follow the job while the
//! service detects scenes and transcribes speech, and get back a typed
//! [`ProcessingResult`].
//!
//! Transient failures (5xx, 429, dropped connections) are retried with
//! exponential backoff that honours `Retry-After`. Polling adapts to the
//! server's ETA, has its own overall deadline and can be cancelled with a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! The crate logs through [`tracing`] and never installs a subscriber.
//!
//! ## Quick start
//!
//! ```no_run
//! use framequery::{Client, Job, ProcessOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> framequery::Result<()> {
//!     let client = Client::new("fq_live_your_api_key")?;
//!
//!     let opts = ProcessOptions::default()
//!         .timeout(Duration::from_secs(30 * 60))
//!         .on_progress(|job: &Job| println!("{} {}", job.id, job.status));
//!
//!     let result = client.process("meeting.mp4", opts).await?;
//!
//!     println!("Duration: {:.1}s", result.duration);
//!     for scene in &result.scenes {
//!         println!("  [{:.1}s] {}", scene.end_time, scene.description);
//!     }
//!     for seg in &result.transcript {
//!         println!("  [{:.1}-{:.1}] {}", seg.start_time, seg.end_time, seg.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod envelope;
mod errors;
mod models;
mod poll;
mod transport;
mod upload;

pub use client::{Client, ClientBuilder};
pub use errors::{BoxError, FrameQueryError, Result};
pub use models::{
    Job, JobPage, JobStatus, ProcessOptions, ProcessingResult, ProgressHandler, Quota, Scene,
    TranscriptSegment,
};
pub use tokio_util::sync::CancellationToken;
pub use upload::UploadSource;
