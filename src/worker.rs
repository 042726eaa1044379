//! Process isolation boundary for browser-driving work.
//!
//! Browser automation is not safely reentrant inside a long-lived host
//! process: a renderer crash or hang must not take the benchmark loop down
//! with it. Every scrape and every screenshot therefore runs in its own
//! short-lived worker process (`tp_benchmark_worker`), with a typed
//! request/response protocol over the process's standard streams:
//!
//! - Parent writes exactly one [`WorkerRequest`] as JSON to the child's stdin
//! - Child replies with exactly one JSON object on stdout and logs to stderr
//! - Non-zero exit or unparsable stdout is a structured failure of that one
//!   request, reported to the caller as a failure result, never retried,
//!   never propagated as a panic
//!
//! The request carries the relevant tuning config so the worker needs no
//! configuration channel of its own.

use crate::config::{CaptureConfig, Config, ScrapeConfig};
use crate::models::{CaptureResult, EvidenceQuery, FetchResult};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// One unit of isolated browser work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Scrape a company website into a [`FetchResult`].
    Scrape {
        url: String,
        #[serde(default)]
        config: ScrapeConfig,
    },
    /// Capture an evidence screenshot into a [`CaptureResult`].
    Screenshot {
        #[serde(flatten)]
        query: EvidenceQuery,
        #[serde(default)]
        config: CaptureConfig,
    },
}

/// Worker-side dispatcher: parse one request line, run it, and render the
/// single response object. Never returns malformed output: a bad request
/// becomes a JSON error object on stdout.
pub async fn serve(input: &str) -> String {
    match serde_json::from_str::<WorkerRequest>(input) {
        Ok(WorkerRequest::Scrape { url, config }) => {
            let result = crate::scrape::run_scrape(&url, &config).await;
            to_response(&result)
        }
        Ok(WorkerRequest::Screenshot { query, config }) => {
            let result = crate::capture::run_capture(&query, &config).await;
            to_response(&result)
        }
        Err(e) => {
            warn!(error = %e, "Malformed worker request");
            format!(
                "{{\"success\":false,\"error\":{}}}",
                serde_json::to_string(&e.to_string()).unwrap_or_else(|_| "\"bad request\"".into())
            )
        }
    }
}

fn to_response<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "{\"success\":false,\"error\":\"serialization failed\"}".to_string())
}

/// Parent-side handle that dispatches requests to fresh worker processes.
pub struct WorkerClient {
    worker_bin: PathBuf,
    scrape_config: ScrapeConfig,
    capture_config: CaptureConfig,
}

impl WorkerClient {
    /// Resolve the worker binary (explicit config path, or the sibling of the
    /// current executable) and capture the tuning configs requests will carry.
    pub fn new(config: &Config) -> Result<Self, Box<dyn Error>> {
        let worker_bin = match &config.worker_bin {
            Some(path) => path.clone(),
            None => {
                let exe = std::env::current_exe()?;
                let dir = exe
                    .parent()
                    .ok_or("current executable has no parent directory")?;
                dir.join(format!("tp_benchmark_worker{}", std::env::consts::EXE_SUFFIX))
            }
        };
        debug!(worker_bin = %worker_bin.display(), "Worker binary resolved");
        Ok(Self {
            worker_bin,
            scrape_config: config.scrape.clone(),
            capture_config: config.capture.clone(),
        })
    }

    /// Scrape one URL in an isolated worker process.
    ///
    /// Worker failures (spawn error, crash, garbage output) fold into the
    /// standard failure shape so one bad site never disturbs the batch.
    #[instrument(level = "info", skip(self), fields(%url))]
    pub async fn scrape(&self, url: &str) -> FetchResult {
        let request = WorkerRequest::Scrape {
            url: url.to_string(),
            config: self.scrape_config.clone(),
        };
        match self.dispatch(&request).await {
            Ok(stdout) => match serde_json::from_str::<FetchResult>(&stdout) {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Invalid JSON from scrape worker");
                    FetchResult::failure(url, 500, format!("Invalid JSON from worker: {e}"))
                }
            },
            Err(reason) => FetchResult::failure(url, 500, format!("Worker failed: {reason}")),
        }
    }

    /// Capture one evidence screenshot in an isolated worker process.
    #[instrument(level = "info", skip_all, fields(url = %query.url))]
    pub async fn capture(&self, query: &EvidenceQuery) -> CaptureResult {
        let request = WorkerRequest::Screenshot {
            query: query.clone(),
            config: self.capture_config.clone(),
        };
        match self.dispatch(&request).await {
            Ok(stdout) => match serde_json::from_str::<CaptureResult>(&stdout) {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Invalid JSON from screenshot worker");
                    CaptureResult::failed()
                }
            },
            Err(reason) => {
                warn!(%reason, "Screenshot worker failed");
                CaptureResult::failed()
            }
        }
    }

    /// Run one request through one fresh worker process and return its raw
    /// stdout. No timeout here: each navigation inside the worker is already
    /// bounded, and cancellation mid-request is not supported.
    async fn dispatch(&self, request: &WorkerRequest) -> Result<String, String> {
        let payload = serde_json::to_string(request).map_err(|e| e.to_string())?;

        let mut child = Command::new(&self.worker_bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("spawn {}: {e}", self.worker_bin.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| format!("stdin write: {e}"))?;
            stdin
                .write_all(b"\n")
                .await
                .map_err(|e| format!("stdin write: {e}"))?;
            // Dropping stdin closes the pipe and lets the worker proceed.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("wait: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.chars().rev().take(300).collect::<String>().chars().rev().collect();
            return Err(format!("exit {:?}: {}", output.status.code(), tail.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err("empty worker output".to_string());
        }
        info!(bytes = stdout.len(), "Worker replied");
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_wire_shape() {
        let request = WorkerRequest::Scrape {
            url: "https://example.com".to_string(),
            config: ScrapeConfig::default(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"mode\":\"scrape\""));
        assert!(json.contains("\"url\":\"https://example.com\""));
    }

    #[test]
    fn test_screenshot_request_flattens_query() {
        let request = WorkerRequest::Screenshot {
            query: EvidenceQuery {
                url: "https://example.com".to_string(),
                text: "a team of experts".to_string(),
                path: "evidence/example_com_20250101_120000.png".to_string(),
            },
            config: CaptureConfig::default(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"mode\":\"screenshot\""));
        // Query fields sit at the top level of the message, not nested.
        assert!(json.contains("\"text\":\"a team of experts\""));
        assert!(json.contains("\"path\":\"evidence/"));
    }

    #[test]
    fn test_request_round_trip() {
        let request = WorkerRequest::Scrape {
            url: "https://example.com".to_string(),
            config: ScrapeConfig::default(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let parsed: WorkerRequest = serde_json::from_str(&json).unwrap();
        match parsed {
            WorkerRequest::Scrape { url, config } => {
                assert_eq!(url, "https://example.com");
                assert_eq!(config.nav_timeout_ms, ScrapeConfig::default().nav_timeout_ms);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_request_without_config_uses_defaults() {
        // An older parent may omit the config block entirely.
        let json = r#"{"mode":"scrape","url":"https://example.com"}"#;
        let parsed: WorkerRequest = serde_json::from_str(json).unwrap();
        match parsed {
            WorkerRequest::Scrape { config, .. } => {
                assert_eq!(config.max_anchors, 50);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn test_serve_rejects_malformed_request() {
        let response = serve("not json at all").await;
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["success"], serde_json::Value::Bool(false));
        assert!(value["error"].is_string());
    }
}
