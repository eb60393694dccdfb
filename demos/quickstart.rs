//! Walks through every client operation against the live API.
//!
//! Run with:
//!   FRAMEQUERY_API_KEY=fq_live_... cargo run --example quickstart -- demo.mp4
//!
//! Set `RUST_LOG`-style filtering in your own subscriber to see the client's
//! `tracing` output; this demo prints with `println!` only.

use std::time::Duration;

use framequery::{CancellationToken, Client, FrameQueryError, Job, ProcessOptions};

#[tokio::main]
async fn main() -> framequery::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "demo.mp4".to_string());
    let client = Client::from_env()?;

    let quota = client.get_quota().await?;
    println!("Plan: {}", quota.plan);
    println!("Included hours: {:.1}", quota.included_hours);
    println!("Credits balance: {:.1}h", quota.credits_balance_hours);
    if let Some(ref date) = quota.reset_date {
        println!("Resets: {date}");
    }
    println!();

    // Ctrl-C stops polling but leaves the job running server-side.
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let opts = ProcessOptions::default()
        .poll_interval(Duration::from_secs(3))
        .timeout(Duration::from_secs(30 * 60))
        .cancel_token(cancel)
        .on_progress(|job: &Job| match job.eta_seconds {
            Some(eta) => println!("  {} (ETA {eta:.0}s)", job.status),
            None => println!("  {}", job.status),
        });

    let result = match client.process(path.as_str(), opts).await {
        Ok(result) => result,
        Err(FrameQueryError::Cancelled { .. }) => {
            println!("Stopped waiting.");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    println!("Job {} finished ({})", result.job_id, result.status);
    println!("Duration: {:.1}s", result.duration);
    for scene in &result.scenes {
        println!(
            "  [{:.1}s] {} (objects: {})",
            scene.end_time,
            scene.description,
            scene.objects.join(", ")
        );
    }
    for seg in &result.transcript {
        println!("  [{:.1}s - {:.1}s] {}", seg.start_time, seg.end_time, seg.text);
    }
    println!();

    let job = client
        .submit_url("https://example.com/sample.mp4", Some("sample.mp4"))
        .await?;
    println!("Submitted {} ({})", job.id, job.status);
    let job = client.get_job(&job.id).await?;
    println!("Now {} (terminal: {})", job.status, job.is_terminal());
    println!();

    let mut cursor: Option<String> = None;
    loop {
        let page = client
            .list_jobs(Some(10), cursor.as_deref(), Some("COMPLETED"))
            .await?;
        for job in &page.jobs {
            println!("  {} | {} | {}", job.id, job.status, job.filename);
        }
        if !page.has_more() {
            break;
        }
        cursor = page.next_cursor;
    }

    Ok(())
}
