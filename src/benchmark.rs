//! The benchmark loop: scrape, classify, capture evidence, decide.
//!
//! Drives one company row at a time, sequentially: each scrape and each
//! screenshot goes through its own isolated worker process, and a fresh
//! browser per request is the price of a loop that survives any single site.
//! Every failure inside a row folds into a rejection outcome for that row;
//! nothing a company's website does can abort the batch.
//!
//! Decision rules, in order (any hit rejects the company):
//! 1. Group membership (holding, subsidiary, headquarters)
//! 2. Manufacturing activity (functionally different from a service client)
//! 3. Activity mismatch with the client description
//! 4. Confidence below the review floor (thin or ambiguous evidence)

use crate::config::Config;
use crate::llm::Classifier;
use crate::models::{
    CaptureResult, Classification, CompanyRow, Decision, EvidenceQuery, FetchResult, RowOutcome,
};
use crate::utils::{evidence_path, sanitize_company};
use crate::worker::WorkerClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Confidence floor below which a row is flagged for human review and
/// rejected for missing information.
const CONFIDENCE_FLOOR: u8 = 30;

/// Flag cell text for a criterion that triggered the rejection.
const FLAG_REJECTED: &str = "YES (rejected)";
/// Flag cell text for a criterion that passed.
const FLAG_CLEAR: &str = "NO";

/// Per-company scrape blob persisted for auditability and cheap resume.
///
/// When a blob already exists for a row index, its fetch result is reused
/// instead of re-scraping, so re-running a half-finished batch only pays for
/// the rows that never completed.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeBlob {
    pub index: usize,
    pub company: String,
    pub url: Option<String>,
    #[serde(flatten)]
    pub result: FetchResult,
}

/// Apply the business rules to one classified company.
pub fn apply_rules(
    row: &CompanyRow,
    classification: &Classification,
    evidence_link: String,
) -> RowOutcome {
    let mut decision = Decision::Accept;
    let mut reason = if classification.reasoning.is_empty() {
        "No reasoning given".to_string()
    } else {
        classification.reasoning.clone()
    };
    let confidence = classification.confidence_score;

    let group = if classification.is_group {
        decision = Decision::Reject;
        FLAG_REJECTED
    } else {
        FLAG_CLEAR
    };

    let different_functions = if classification.is_manufacturer {
        decision = Decision::Reject;
        FLAG_REJECTED
    } else {
        FLAG_CLEAR
    };

    let different_service = if !classification.service_match {
        decision = Decision::Reject;
        FLAG_REJECTED
    } else {
        FLAG_CLEAR
    };

    let missing_information = if confidence < CONFIDENCE_FLOOR {
        decision = Decision::Reject;
        reason = "Insufficient information or inactive website.".to_string();
        FLAG_REJECTED
    } else {
        FLAG_CLEAR
    };

    RowOutcome {
        company: row.company.clone(),
        website: row.website.clone(),
        decision,
        missing_information: missing_information.to_string(),
        different_functions: different_functions.to_string(),
        different_service: different_service.to_string(),
        group: group.to_string(),
        comment: format!("{reason} (confidence: {confidence}%)"),
        evidence_link,
        confidence,
    }
}

/// A rejection decided before the pipeline ran (bad URL, dead site, junk).
fn rejected_row(row: &CompanyRow, comment: String, confidence: u8) -> RowOutcome {
    RowOutcome {
        company: row.company.clone(),
        website: row.website.clone(),
        decision: Decision::Reject,
        missing_information: FLAG_REJECTED.to_string(),
        different_functions: String::new(),
        different_service: String::new(),
        group: String::new(),
        comment,
        evidence_link: String::new(),
        confidence,
    }
}

/// Spreadsheet hyperlink formula for a local screenshot.
fn hyperlink_formula(path: &Path) -> String {
    let abs = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("=HYPERLINK(\"{}\", \"View evidence\")", abs.display())
}

/// One benchmark run over an input sheet.
pub struct Benchmark<C: Classifier> {
    config: Config,
    worker: WorkerClient,
    classifier: C,
    client_description: String,
}

impl<C: Classifier> Benchmark<C> {
    pub fn new(
        config: Config,
        worker: WorkerClient,
        classifier: C,
        client_description: String,
    ) -> Self {
        Self {
            config,
            worker,
            classifier,
            client_description,
        }
    }

    /// Process every row sequentially and return one outcome per row.
    #[instrument(level = "info", skip_all, fields(rows = rows.len()))]
    pub async fn run(&self, rows: &[CompanyRow]) -> Vec<RowOutcome> {
        let total = rows.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, row) in rows.iter().enumerate() {
            info!(current = index + 1, total, company = %row.company, "Processing company");
            outcomes.push(self.process_row(index, row).await);
        }

        let rejected = outcomes
            .iter()
            .filter(|o| o.decision == Decision::Reject)
            .count();
        info!(total, accepted = total - rejected, rejected, "Benchmark complete");
        outcomes
    }

    async fn process_row(&self, index: usize, row: &CompanyRow) -> RowOutcome {
        let Some(url) = crate::utils::normalize_url(&row.website) else {
            return rejected_row(row, "Rejected: invalid website value (0).".to_string(), 100);
        };

        // Scrape (or reuse a previous run's blob for this row)
        let fetch = self.scrape_or_resume(index, row, &url).await;

        if !fetch.is_usable() {
            let reason = fetch
                .error_msg
                .clone()
                .unwrap_or_else(|| "Website inaccessible".to_string());
            return rejected_row(row, format!("Error/junk: {reason}"), 0);
        }

        // Classify
        let classification = self
            .classifier
            .analyze(&fetch.text_content, &self.client_description)
            .await;

        // Capture evidence, highlighting the quoted phrase when there is one
        let capture = self.capture_evidence(&fetch, &classification).await;
        let evidence_link = match &capture {
            CaptureResult {
                success: true,
                path: Some(path),
                ..
            } => hyperlink_formula(Path::new(path)),
            _ => String::new(),
        };

        apply_rules(row, &classification, evidence_link)
    }

    async fn scrape_or_resume(&self, index: usize, row: &CompanyRow, url: &str) -> FetchResult {
        let blob_path = self.blob_path(index, row);
        if let Some(result) = load_blob(&blob_path).await {
            info!(path = %blob_path.display(), "Reusing scrape blob from previous run");
            return result;
        }

        let result = self.worker.scrape(url).await;
        self.write_blob(&blob_path, index, row, url, &result).await;
        result
    }

    fn blob_path(&self, index: usize, row: &CompanyRow) -> PathBuf {
        self.config
            .scrape_blob_dir
            .join(format!("{index}_{}.json", sanitize_company(&row.company)))
    }

    async fn write_blob(
        &self,
        path: &Path,
        index: usize,
        row: &CompanyRow,
        url: &str,
        result: &FetchResult,
    ) {
        let blob = ScrapeBlob {
            index,
            company: row.company.clone(),
            url: Some(url.to_string()),
            result: result.clone(),
        };
        match serde_json::to_string_pretty(&blob) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(path, json).await {
                    warn!(path = %path.display(), error = %e, "Failed to write scrape blob");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize scrape blob"),
        }
    }

    async fn capture_evidence(
        &self,
        fetch: &FetchResult,
        classification: &Classification,
    ) -> CaptureResult {
        let path = evidence_path(&self.config.evidence_dir, &fetch.evidence_url);
        let query = EvidenceQuery {
            url: fetch.evidence_url.clone(),
            text: classification.evidence_quote.clone(),
            path: path.to_string_lossy().into_owned(),
        };
        self.worker.capture(&query).await
    }
}

/// Load a previous run's scrape blob, if present and parseable.
async fn load_blob(path: &Path) -> Option<FetchResult> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<ScrapeBlob>(&raw) {
        Ok(blob) => Some(blob.result),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt scrape blob; re-scraping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CompanyRow {
        CompanyRow {
            company: "Acme Services SL".to_string(),
            website: "https://acme.example".to_string(),
        }
    }

    fn accepted_classification() -> Classification {
        Classification {
            is_group: false,
            is_manufacturer: false,
            service_match: true,
            reasoning: "Independent administrative services provider.".to_string(),
            evidence_quote: String::new(),
            confidence_score: 85,
        }
    }

    #[test]
    fn test_accepts_clean_company() {
        let outcome = apply_rules(&row(), &accepted_classification(), String::new());
        assert_eq!(outcome.decision, Decision::Accept);
        assert_eq!(outcome.group, FLAG_CLEAR);
        assert_eq!(outcome.different_functions, FLAG_CLEAR);
        assert_eq!(outcome.different_service, FLAG_CLEAR);
        assert_eq!(outcome.missing_information, FLAG_CLEAR);
        assert!(outcome.comment.contains("(confidence: 85%)"));
    }

    #[test]
    fn test_group_membership_rejects() {
        let classification = Classification {
            is_group: true,
            ..accepted_classification()
        };
        let outcome = apply_rules(&row(), &classification, String::new());
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.group, FLAG_REJECTED);
        assert_eq!(outcome.different_functions, FLAG_CLEAR);
    }

    #[test]
    fn test_manufacturer_rejects_with_functions_flag() {
        let classification = Classification {
            is_manufacturer: true,
            ..accepted_classification()
        };
        let outcome = apply_rules(&row(), &classification, String::new());
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.different_functions, FLAG_REJECTED);
    }

    #[test]
    fn test_service_mismatch_rejects() {
        let classification = Classification {
            service_match: false,
            ..accepted_classification()
        };
        let outcome = apply_rules(&row(), &classification, String::new());
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.different_service, FLAG_REJECTED);
    }

    #[test]
    fn test_low_confidence_rejects_and_overrides_reason() {
        let classification = Classification {
            confidence_score: 20,
            ..accepted_classification()
        };
        let outcome = apply_rules(&row(), &classification, String::new());
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.missing_information, FLAG_REJECTED);
        assert!(outcome.comment.starts_with("Insufficient information"));
        assert!(outcome.comment.contains("(confidence: 20%)"));
    }

    #[test]
    fn test_multiple_triggers_all_flagged() {
        let classification = Classification {
            is_group: true,
            is_manufacturer: true,
            service_match: false,
            confidence_score: 10,
            ..accepted_classification()
        };
        let outcome = apply_rules(&row(), &classification, String::new());
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.group, FLAG_REJECTED);
        assert_eq!(outcome.different_functions, FLAG_REJECTED);
        assert_eq!(outcome.different_service, FLAG_REJECTED);
        assert_eq!(outcome.missing_information, FLAG_REJECTED);
    }

    #[test]
    fn test_rejected_row_shape() {
        let outcome = rejected_row(&row(), "Error/junk: HTTP 404".to_string(), 0);
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.missing_information, FLAG_REJECTED);
        // Criteria the pipeline never reached stay blank.
        assert!(outcome.group.is_empty());
        assert!(outcome.evidence_link.is_empty());
    }

    #[test]
    fn test_hyperlink_formula_shape() {
        let formula = hyperlink_formula(Path::new("/tmp/evidence/acme_20250101_120000.png"));
        assert!(formula.starts_with("=HYPERLINK(\""));
        assert!(formula.ends_with("\", \"View evidence\")"));
        assert!(formula.contains("acme_20250101_120000.png"));
    }

    #[test]
    fn test_scrape_blob_round_trip() {
        let blob = ScrapeBlob {
            index: 3,
            company: "Acme".to_string(),
            url: Some("https://acme.example".to_string()),
            result: FetchResult {
                status: 200,
                is_junk: false,
                text_content: "corpus".to_string(),
                error_msg: None,
                evidence_url: "https://acme.example/about".to_string(),
            },
        };
        let json = serde_json::to_string(&blob).unwrap();
        // Flattened: the fetch fields sit at the top level of the blob.
        assert!(json.contains("\"url_evidencia\""));
        let parsed: ScrapeBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.index, 3);
        assert_eq!(parsed.result.status, 200);
    }
}
