//! Utility functions for URL normalization, filenames, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - URL scheme normalization and domain slugs for evidence filenames
//! - String truncation for logging
//! - JSON error detection for handling LLM response truncation
//! - File system validation for output directories

use chrono::Local;
use itertools::Itertools;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Normalize a raw spreadsheet URL value.
///
/// Trims whitespace and prefixes `https://` when no scheme is present.
/// Returns `None` for empty values and for the `"0"` placeholder some input
/// sheets use for "no website".
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_url(" example.com "), Some("https://example.com".into()));
/// assert_eq!(normalize_url("0"), None);
/// ```
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return None;
    }
    if trimmed.starts_with("http") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{trimmed}"))
    }
}

/// Extract a filesystem-safe slug from a URL's host.
///
/// Strips a leading `www.` and replaces dots with underscores, so
/// `https://www.example.co.uk/about` becomes `example_co_uk`. Falls back to
/// `"unknown_domain"` when the URL has no parseable host.
pub fn domain_slug(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    match host {
        Some(host) if !host.is_empty() => host
            .trim_start_matches("www.")
            .replace('.', "_"),
        _ => "unknown_domain".to_string(),
    }
}

/// Build the evidence screenshot path for a URL.
///
/// The filename embeds the site's domain and a capture timestamp
/// (`<domain>_<YYYYmmdd_HHMMSS>.png`) so repeated runs against the same
/// domain never collide.
pub fn evidence_path(evidence_dir: &Path, url: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    evidence_dir.join(format!("{}_{}.png", domain_slug(url), timestamp))
}

/// Reduce a company name to a filename-safe form for scrape blobs.
///
/// Keeps alphanumerics, spaces, and underscores; everything else is dropped.
pub fn sanitize_company(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Collapse all runs of whitespace to single spaces.
///
/// Applied to the combined scrape corpus before it is handed to the LLM. The
/// raw per-page text is what the evidence locator later searches, so this
/// normalization never feeds back into highlighting.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Take at most `max` characters from the front of a string, respecting
/// UTF-8 boundaries.
pub fn char_prefix(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let prefix = char_prefix(s, max);
        format!("{}…(+{} bytes)", prefix, s.len() - prefix.len())
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON fails to parse with an EOF error. This helps identify such
/// cases for the single re-ask.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(
            normalize_url("example.com"),
            Some("https://example.com".to_string())
        );
        assert_eq!(
            normalize_url("  example.com  "),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_normalize_url_keeps_existing_scheme() {
        assert_eq!(
            normalize_url("http://example.com"),
            Some("http://example.com".to_string())
        );
    }

    #[test]
    fn test_normalize_url_rejects_placeholders() {
        assert_eq!(normalize_url(""), None);
        assert_eq!(normalize_url("   "), None);
        assert_eq!(normalize_url("0"), None);
    }

    #[test]
    fn test_domain_slug_strips_www_and_dots() {
        assert_eq!(domain_slug("https://www.example.com/about"), "example_com");
        assert_eq!(domain_slug("https://sub.example.co.uk"), "sub_example_co_uk");
    }

    #[test]
    fn test_domain_slug_unparseable_url() {
        assert_eq!(domain_slug("not a url"), "unknown_domain");
    }

    #[test]
    fn test_evidence_path_embeds_domain() {
        let path = evidence_path(Path::new("evidence"), "https://www.example.com");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("example_com_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_sanitize_company() {
        assert_eq!(sanitize_company("Acme S.L."), "Acme SL");
        assert_eq!(sanitize_company("Foo/Bar Ltd. "), "FooBar Ltd");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            collapse_whitespace("a  b\n\tc   d"),
            "a b c d"
        );
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_char_prefix_respects_utf8() {
        assert_eq!(char_prefix("añejo", 2), "añ");
        assert_eq!(char_prefix("ab", 10), "ab");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        if let Err(e) = result {
            assert!(looks_truncated(&e));
        }
    }
}
