//! JSON run summary output.
//!
//! One summary file per benchmark execution, carrying the run metadata,
//! aggregate counts, and every row outcome. This is the machine-readable
//! counterpart of the annotated CSV, meant for downstream tooling and audits.

use crate::models::{Decision, RowOutcome};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Aggregate record of one benchmark run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run date, `YYYY-MM-DD`.
    pub local_date: String,
    /// Run start time, `HH:MM:SS`.
    pub local_time: String,
    /// The client activity description every company was compared against.
    pub client_description: String,
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl RunSummary {
    pub fn new(client_description: String, outcomes: Vec<RowOutcome>) -> Self {
        let now = Local::now();
        let rejected = outcomes
            .iter()
            .filter(|o| o.decision == Decision::Reject)
            .count();
        Self {
            local_date: now.date_naive().to_string(),
            local_time: now.time().format("%H:%M:%S").to_string(),
            client_description,
            total: outcomes.len(),
            accepted: outcomes.len() - rejected,
            rejected,
            outcomes,
        }
    }
}

/// Write a [`RunSummary`] as pretty-printed JSON and return its path.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_summary(
    summary: &RunSummary,
    output_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("benchmark_{timestamp}.json"));

    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).await?;

    info!(path = %path.display(), rows = summary.total, "Wrote run summary JSON");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(decision: Decision) -> RowOutcome {
        RowOutcome {
            company: "Acme".to_string(),
            website: "https://acme.example".to_string(),
            decision,
            missing_information: "NO".to_string(),
            different_functions: "NO".to_string(),
            different_service: "NO".to_string(),
            group: "NO".to_string(),
            comment: "ok (confidence: 70%)".to_string(),
            evidence_link: String::new(),
            confidence: 70,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::new(
            "administrative services".to_string(),
            vec![
                outcome(Decision::Accept),
                outcome(Decision::Reject),
                outcome(Decision::Reject),
            ],
        );
        assert_eq!(summary.total, 3);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 2);
    }

    #[tokio::test]
    async fn test_write_summary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::new(
            "administrative services".to_string(),
            vec![outcome(Decision::Accept)],
        );

        let path = write_summary(&summary, dir.path()).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: RunSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.total, 1);
        assert_eq!(parsed.client_description, "administrative services");
    }
}
