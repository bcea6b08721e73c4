//! Job command handlers
//!
//! Submitting jobs, inspecting their records and cleaning up the store.

use anyhow::{Context, Result, anyhow, bail};
use assay_client::{AssayClient, PollError, ValidationJobOptions, run_validation_job};
use assay_core::domain::job::{JobRecord, JobStatus};
use clap::Args;
use colored::*;
use serde_json::Value as JsonValue;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::id_resolver::resolve_job_id;

/// Arguments of `assay submit`
#[derive(Args)]
pub struct SubmitArgs {
    /// Upstream endpoint path (e.g. /v5/ingredient-analysis/transaction)
    #[arg(long)]
    endpoint: String,

    /// Upstream HTTP method
    #[arg(long)]
    method: Option<String>,

    /// JSON file with the request payload, `-` for stdin
    #[arg(long)]
    body: Option<PathBuf>,

    /// Upstream API key
    #[arg(long, env = "ASSAY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Caller metadata stored with the job (JSON)
    #[arg(long)]
    metadata: Option<String>,

    /// Give up waiting after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// First delay between status polls, in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_ms: Option<u64>,
}

// =============================================================================
// Job Lifecycle
// =============================================================================

/// Submit a job, poll until it finishes and print the record
pub async fn submit_job(client: &AssayClient, args: SubmitArgs) -> Result<()> {
    let payload = read_payload(args.body.as_ref())?;

    let mut options = ValidationJobOptions::new(args.endpoint, payload);
    if let Some(key) = args.api_key {
        options = options.with_api_key(key);
    }
    if let Some(method) = args.method {
        options = options.with_method(method);
    }
    if let Some(raw) = args.metadata {
        let metadata = serde_json::from_str(&raw).context("--metadata is not valid JSON")?;
        options = options.with_metadata(metadata);
    }
    if let Some(secs) = args.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = args.poll_ms {
        options = options.with_poll_interval(Duration::from_millis(ms));
    }

    // Ctrl-C stops waiting; the job keeps running server-side
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    options = options.with_cancel(cancel);

    println!("{}", "Submitting job...".dimmed());

    match run_validation_job(client, options).await {
        Ok(record) => {
            print_job_details(&record);
            if record.status == JobStatus::Failed {
                bail!("Job {} failed", record.job_id);
            }
            Ok(())
        }
        Err(PollError::Submission(e)) => Err(anyhow!("Job was not accepted: {}", e)),
        Err(e @ PollError::Timeout { .. }) | Err(e @ PollError::Cancelled { .. }) => {
            if let Some(job_id) = e.job_id() {
                println!(
                    "{}",
                    format!("Stopped waiting. Check later with: assay status {}", job_id).yellow()
                );
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Show the current record of a job
pub async fn show_status(client: &AssayClient, id: &str, cleanup: bool) -> Result<()> {
    let job_id = match client.get_job_status(id).await? {
        Some(_) => id.to_string(),
        None => resolve_job_id(client, id).await?,
    };

    let record = if cleanup {
        client.take_job_status(&job_id).await?
    } else {
        client.get_job_status(&job_id).await?
    };

    match record {
        Some(record) => {
            print_job_details(&record);
            if cleanup && record.status.is_terminal() {
                println!("{}", "Record deleted from the store.".dimmed());
            }
            Ok(())
        }
        None => Err(anyhow!("Job {} not found", job_id)),
    }
}

// =============================================================================
// Maintenance
// =============================================================================

/// List all stored job IDs
pub async fn list_jobs(client: &AssayClient) -> Result<()> {
    let job_ids = client.list_jobs().await?;

    if job_ids.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", job_ids.len()).bold());
        for job_id in job_ids {
            println!("  {} {}", "▸".cyan(), job_id);
        }
    }

    Ok(())
}

/// Delete a job record
pub async fn delete_job(client: &AssayClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    client.delete_job(&job_id).await?;

    println!("{}", format!("✓ Deleted job {}", job_id).green());
    Ok(())
}

/// Delete terminal jobs older than the given age
pub async fn purge_jobs(client: &AssayClient, older_than_secs: u32) -> Result<()> {
    let deleted = client.purge_jobs(older_than_secs).await?;

    if deleted.is_empty() {
        println!("{}", "Nothing to purge.".yellow());
    } else {
        println!("{}", format!("✓ Purged {} job(s):", deleted.len()).green());
        for job_id in deleted {
            println!("  {}", job_id.dimmed());
        }
    }

    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Read the request payload; no `--body` means an empty object
fn read_payload(body: Option<&PathBuf>) -> Result<JsonValue> {
    let raw = match body {
        None => return Ok(JsonValue::Object(Default::default())),
        Some(path) if path.as_os_str() == "-" => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read payload from stdin")?;
            raw
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file {}", path.display()))?,
    };

    serde_json::from_str(&raw).context("Payload is not valid JSON")
}

/// Print detailed job information
fn print_job_details(job: &JobRecord) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.job_id.cyan());
    println!("  Status:      {}", colorize_status(job.status));
    if !job.request.endpoint.is_empty() {
        println!("  Request:     {} {}", job.request.method, job.request.endpoint);
    }
    println!("  Started:     {}", job.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:     {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(completed) = job.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(duration_ms) = job.metrics.as_ref().and_then(|m| m.duration_ms) {
        println!("  Duration:    {}ms", duration_ms);
    }

    if let Some(result) = &job.result {
        println!("\n{}", "Upstream Response:".bold());
        match &result.status_text {
            Some(text) => println!("  Status:     {} {}", result.status, text),
            None => println!("  Status:     {}", result.status),
        }
        if let Some(bytes) = result.weight_bytes {
            println!("  Size:       {} bytes", bytes);
        }

        if let Some(body) = &result.body {
            println!("\n{}", "Body:".bold());
            if let Ok(pretty) = serde_json::to_string_pretty(body) {
                println!("{}", pretty);
            }
        } else if let Some(raw) = &result.raw_body {
            println!("\n{}", "Body:".bold());
            println!("{}", raw);
        }
    }

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.message.red());
        if let Some(details) = &error.details {
            if let Ok(pretty) = serde_json::to_string_pretty(details) {
                println!("{}", pretty.dimmed());
            }
        }
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
