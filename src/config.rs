//! Runtime configuration, built once at the program boundary.
//!
//! Every component receives its settings from this module explicitly at
//! construction time; nothing below the boundary reads environment variables
//! or hardcodes paths. The CLI supplies the API key and directories, an
//! optional YAML file overrides the tuning knobs, and the defaults here match
//! the behavior the pipeline was calibrated with.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

/// Ordered list of capability-equivalent Gemini backends, tried in order.
fn default_models() -> Vec<String> {
    [
        "gemini-2.5-flash",
        "gemini-2.5-flash-lite",
        "gemini-2.0-flash",
        "gemini-2.0-flash-001",
        "gemini-2.0-flash-lite-001",
        "gemini-2.0-flash-lite",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_quota_backoff_secs() -> u64 {
    5
}

fn default_max_content_chars() -> usize {
    8000
}

/// LLM classifier settings.
///
/// The backend list is configuration data, not control flow: exhausting it
/// yields a zero-confidence fallback classification rather than an error.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key for the Gemini REST endpoint. Injected from the CLI at load
    /// time; never read from the environment inside the client.
    #[serde(default)]
    pub api_key: String,
    /// Model names to try, in order of preference.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Per-request timeout against one backend.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Fixed delay after a quota-exceeded response before the next backend.
    #[serde(default = "default_quota_backoff_secs")]
    pub quota_backoff_secs: u64,
    /// Upper bound on the corpus characters sent per classification.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            models: default_models(),
            request_timeout_secs: default_request_timeout_secs(),
            quota_backoff_secs: default_quota_backoff_secs(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_scrape_timeout_ms() -> u64 {
    20_000
}

fn default_home_settle_ms() -> u64 {
    1_500
}

fn default_secondary_settle_ms() -> u64 {
    2_000
}

fn default_max_anchors() -> usize {
    50
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

/// Text-scraping settings (worker scrape mode).
///
/// Serializable because they ride inside worker request messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Navigation timeout per page load.
    #[serde(default = "default_scrape_timeout_ms")]
    pub nav_timeout_ms: u64,
    /// Settle delay after the home page's DOM is parsed.
    #[serde(default = "default_home_settle_ms")]
    pub home_settle_ms: u64,
    /// Settle delay after the secondary page's DOM is parsed. Longer than the
    /// home delay: deep pages are where client-side rendering bites.
    #[serde(default = "default_secondary_settle_ms")]
    pub secondary_settle_ms: u64,
    /// Upper bound on anchors scanned for the secondary link.
    #[serde(default = "default_max_anchors")]
    pub max_anchors: usize,
    /// Browser user agent for all navigations.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            nav_timeout_ms: default_scrape_timeout_ms(),
            home_settle_ms: default_home_settle_ms(),
            secondary_settle_ms: default_secondary_settle_ms(),
            max_anchors: default_max_anchors(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_capture_timeout_ms() -> u64 {
    45_000
}

fn default_capture_settle_ms() -> u64 {
    2_000
}

fn default_cosmetic_settle_ms() -> u64 {
    500
}

/// Evidence screenshot settings (worker screenshot mode).
///
/// Serializable because they ride inside worker request messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Navigation timeout for the evidence page. More generous than the
    /// scrape timeout: a failed capture loses the whole row's evidence.
    #[serde(default = "default_capture_timeout_ms")]
    pub nav_timeout_ms: u64,
    /// Settle delay after navigation, before any DOM mutation.
    #[serde(default = "default_capture_settle_ms")]
    pub settle_ms: u64,
    /// Settle delay after highlighting and after stamping the banner.
    #[serde(default = "default_cosmetic_settle_ms")]
    pub cosmetic_settle_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            nav_timeout_ms: default_capture_timeout_ms(),
            settle_ms: default_capture_settle_ms(),
            cosmetic_settle_ms: default_cosmetic_settle_ms(),
        }
    }
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("evidence")
}

fn default_scrape_blob_dir() -> PathBuf {
    PathBuf::from("evidence/json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Top-level configuration handed to every component.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Directory for evidence screenshots.
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,
    /// Directory for per-company scrape JSON blobs.
    #[serde(default = "default_scrape_blob_dir")]
    pub scrape_blob_dir: PathBuf,
    /// Directory for the annotated spreadsheet and run summary.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Explicit path to the worker binary. When absent, the worker is looked
    /// up next to the current executable.
    #[serde(default)]
    pub worker_bin: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            scrape: ScrapeConfig::default(),
            capture: CaptureConfig::default(),
            evidence_dir: default_evidence_dir(),
            scrape_blob_dir: default_scrape_blob_dir(),
            output_dir: default_output_dir(),
            worker_bin: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file, falling back to
    /// defaults for everything the file does not mention.
    ///
    /// This is the single loading step at the program boundary; no other
    /// code path constructs a `Config` from external state.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&raw)?;
                info!(path = %path.display(), "Loaded configuration file");
                Ok(config)
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scrape.nav_timeout_ms, 20_000);
        assert_eq!(config.capture.nav_timeout_ms, 45_000);
        assert_eq!(config.scrape.max_anchors, 50);
        assert_eq!(config.llm.max_content_chars, 8000);
        assert!(!config.llm.models.is_empty());
        assert_eq!(config.evidence_dir, PathBuf::from("evidence"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  models: ["gemini-2.0-flash"]
scrape:
  nav_timeout_ms: 30000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.models, vec!["gemini-2.0-flash".to_string()]);
        assert_eq!(config.llm.quota_backoff_secs, 5);
        assert_eq!(config.scrape.nav_timeout_ms, 30_000);
        assert_eq!(config.scrape.home_settle_ms, 1_500);
    }

    #[test]
    fn test_load_without_file_is_default() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.worker_bin.is_none());
    }
}
