//! Data models for scrape results, evidence capture, and LLM classifications.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FetchResult`]: Outcome of one website scrape, as produced by the worker
//! - [`NavigationTarget`]: A secondary navigation link discovered on a home page
//! - [`EvidenceQuery`] / [`CaptureResult`]: Input and output of one screenshot request
//! - [`Classification`]: LLM comparability verdict for one company
//! - [`CompanyRow`] / [`RowOutcome`]: Spreadsheet input row and its annotation
//!
//! `FetchResult`, `EvidenceQuery`, and `CaptureResult` cross the worker process
//! boundary as JSON, so their serde names are part of the wire contract and must
//! not change independently of the worker binary.

use serde::{Deserialize, Serialize};

/// Outcome of scraping one company website.
///
/// Produced once per scrape request by the worker process and consumed by the
/// benchmark loop. The struct is immutable after creation; the caller that
/// requested the scrape owns it exclusively.
///
/// # Invariants
///
/// - `is_junk = true` implies `status` is in `[200, 400)`: junk is a content
///   classification, not a transport failure.
/// - `error_msg` is `Some` exactly when the fetch produced no usable text.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchResult {
    /// HTTP status of the final document response; 0 on DNS/timeout failure.
    pub status: u16,
    /// Whether the page was classified as a parked/placeholder page.
    pub is_junk: bool,
    /// Combined, whitespace-normalized visible text from the visited pages.
    pub text_content: String,
    /// Failure description, present only when no usable text was produced.
    pub error_msg: Option<String>,
    /// Best URL to screenshot as evidence (home page, or the secondary page
    /// when it contributed the bulk of the text).
    #[serde(rename = "url_evidencia")]
    pub evidence_url: String,
}

impl FetchResult {
    /// Build the standard failure shape: no text, an error message, and the
    /// input URL carried through as the evidence URL.
    pub fn failure(url: &str, status: u16, error_msg: impl Into<String>) -> Self {
        Self {
            status,
            is_junk: false,
            text_content: String::new(),
            error_msg: Some(error_msg.into()),
            evidence_url: url.to_string(),
        }
    }

    /// A fetch is usable when the transport succeeded, the content is not a
    /// placeholder page, and some text was extracted.
    pub fn is_usable(&self) -> bool {
        (200..400).contains(&self.status) && !self.is_junk && !self.text_content.is_empty()
    }
}

/// A secondary navigation link discovered on a home page.
///
/// Ephemeral: derived from a single fetch and discarded after the link is
/// followed.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTarget {
    /// Absolute URL, resolved against the page the anchor was found on.
    pub href: String,
    /// The anchor's visible text, as matched against the navigation keywords.
    pub anchor_text: String,
}

/// Input to one screenshot request.
///
/// An empty `text` means "no highlight requested": the capture still happens
/// and carries the audit banner, just without an evidence mark.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvidenceQuery {
    /// Page to capture.
    pub url: String,
    /// Quoted phrase to locate and highlight; may be empty.
    pub text: String,
    /// Where the PNG should be written.
    pub path: String,
}

/// Terminal result of one screenshot request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureResult {
    /// Whether a screenshot file was written.
    pub success: bool,
    /// Path of the written PNG, when `success` is true.
    pub path: Option<String>,
    /// Whether the evidence phrase was located and marked in the live DOM.
    /// False is a normal outcome (phrase absent, or no highlight requested).
    #[serde(default)]
    pub highlighted: bool,
    /// Whether the audit banner was stamped onto the page.
    #[serde(default)]
    pub stamped: bool,
}

impl CaptureResult {
    pub fn failed() -> Self {
        Self {
            success: false,
            path: None,
            highlighted: false,
            stamped: false,
        }
    }
}

/// LLM comparability verdict for one company.
///
/// The field names match the JSON schema the model is instructed to return,
/// so serialization round-trips the API response unchanged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Classification {
    /// Company belongs to a corporate group (holding, subsidiary, etc).
    pub is_group: bool,
    /// Company manufactures rather than provides services/distribution.
    pub is_manufacturer: bool,
    /// Company activity matches the client activity description.
    pub service_match: bool,
    /// Short justification, at most a sentence.
    pub reasoning: String,
    /// Literal excerpt from the scraped text backing the verdict; empty when
    /// the company is accepted.
    pub evidence_quote: String,
    /// Self-reported confidence, 0-100.
    pub confidence_score: u8,
}

impl Classification {
    /// Fallback verdict used when no backend produced a usable answer or the
    /// scraped content was too thin to analyze.
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            is_group: false,
            is_manufacturer: false,
            service_match: false,
            reasoning: reasoning.into(),
            evidence_quote: String::new(),
            confidence_score: 0,
        }
    }
}

/// One input row of the candidate spreadsheet.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompanyRow {
    /// Company name, used for logging and evidence blob filenames.
    pub company: String,
    /// Candidate website; may be empty or the literal `"0"` placeholder.
    pub website: String,
}

/// Accept/reject decision for one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Single-letter spreadsheet code ("A"/"R").
    pub fn code(&self) -> &'static str {
        match self {
            Decision::Accept => "A",
            Decision::Reject => "R",
        }
    }
}

/// The annotation written back for one company row.
///
/// Flag fields hold the spreadsheet cell text: "NO" when the criterion
/// passed, "YES (rejected)" when it triggered a rejection, or empty when the
/// pipeline never reached that criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowOutcome {
    pub company: String,
    pub website: String,
    pub decision: Decision,
    pub missing_information: String,
    pub different_functions: String,
    pub different_service: String,
    pub group: String,
    pub comment: String,
    /// Spreadsheet hyperlink formula pointing at the local screenshot.
    pub evidence_link: String,
    pub confidence: u8,
}
