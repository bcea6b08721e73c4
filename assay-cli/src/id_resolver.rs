//! ID resolver module
//!
//! Resolves job ID prefixes to full job IDs by listing the store.
//! This allows users to type a short, unambiguous prefix instead of a full ID.

use anyhow::{Context, Result, anyhow};
use assay_client::AssayClient;

/// Resolve a job ID or prefix to a full job ID
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_job_id(client: &AssayClient, id_or_prefix: &str) -> Result<String> {
    let job_ids = client
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(&job_ids, id_or_prefix)
}

/// Pick the single job ID that equals or starts with `prefix`
fn match_prefix(job_ids: &[String], prefix: &str) -> Result<String> {
    if job_ids.iter().any(|id| id == prefix) {
        return Ok(prefix.to_string());
    }

    let matches: Vec<&String> = job_ids.iter().filter(|id| id.starts_with(prefix)).collect();

    match matches.len() {
        0 => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        1 => Ok(matches[0].clone()),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|id| id.as_str()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        ["3f2a-1", "3f2a-12", "9c0d"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_exact_match_wins_over_prefix() {
        assert_eq!(match_prefix(&ids(), "3f2a-1").unwrap(), "3f2a-1");
    }

    #[test]
    fn test_unique_prefix() {
        assert_eq!(match_prefix(&ids(), "9c").unwrap(), "9c0d");
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = match_prefix(&ids(), "3f").unwrap_err();
        assert!(err.to_string().contains("Ambiguous prefix"));
    }

    #[test]
    fn test_no_match() {
        assert!(match_prefix(&ids(), "zz").is_err());
    }
}
