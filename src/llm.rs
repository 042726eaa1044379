//! LLM comparability classification with a backend fallback chain.
//!
//! This module wraps the Gemini `generateContent` REST protocol behind the
//! [`Classifier`] trait. The backend list is ordered configuration data: each
//! model is tried in turn, a quota-exceeded response (HTTP 429) triggers one
//! fixed backoff before moving on, an unknown model (404) is skipped
//! immediately, and exhausting the list yields a zero-confidence fallback
//! classification instead of an error: a dead API must never abort a batch.
//!
//! # Response hygiene
//!
//! Models routinely wrap their JSON in markdown fences or stray prose, so the
//! raw response is reduced to its outermost `{ … }` slice before parsing. A
//! response that parses as *truncated* JSON (EOF) is re-asked once.

use crate::config::LlmConfig;
use crate::models::Classification;
use crate::utils::{char_prefix, looks_truncated, truncate_for_log};
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Shortest corpus worth sending to a model at all.
const MIN_CONTENT_CHARS: usize = 50;

/// Trait seam for the comparability verdict.
///
/// The benchmark loop only depends on this trait, so tests can substitute a
/// canned classifier and exercise the decision rules without a network.
pub trait Classifier {
    /// Judge one company's scraped text against the client description.
    ///
    /// Infallible by design: every failure mode degrades to a fallback
    /// [`Classification`] carrying its reason.
    async fn analyze(&self, text_content: &str, client_description: &str) -> Classification;
}

/// Failure modes of one backend attempt.
#[derive(Debug, thiserror::Error)]
enum AskError {
    #[error("quota exceeded")]
    Quota,
    #[error("model not found")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

/// Gemini-protocol classifier.
pub struct GeminiClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl GeminiClient {
    pub fn new(config: LlmConfig) -> Result<Self, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn build_prompt(&self, text_content: &str, client_description: &str) -> String {
        let bounded = char_prefix(text_content, self.config.max_content_chars);
        format!(
            r#"Role: transfer-pricing auditor.
Goal: determine whether the analyzed company is comparable to the client.

CLIENT: "{client_description}"

ANALYZED COMPANY TEXT:
"{bounded}"

INSTRUCTIONS:
Return ONLY a valid JSON object. Write nothing else.
- evidence_quote must be a short phrase copied LITERALLY from the text.
  Do NOT summarize or add punctuation that is not there; copy an exact
  fragment that justifies a rejection, or leave it empty on acceptance.

JSON SCHEMA:
{{
    "is_group": boolean, (true if the text mentions a group, holding, subsidiary, headquarters or similar)
    "is_manufacturer": boolean, (true if it mentions factories, production or industrial plants; false for services/distribution)
    "service_match": boolean, (true if the activity matches the client's; lean permissive and express doubt through confidence_score)
    "reasoning": "string", (very short summary of why, 15 words or fewer)
    "evidence_quote": "string", (short literal quote backing a rejection, 20 words or fewer; empty if accepted)
    "confidence_score": int (0-100) (your confidence in the verdict; low values flag the row for human review)
}}"#
        )
    }

    /// One attempt against one backend. Returns the model's raw text.
    #[instrument(level = "info", skip(self, prompt), fields(%model))]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AskError> {
        let endpoint = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent?key={}",
            urlencoding::encode(&self.config.api_key)
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let t0 = Instant::now();
        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AskError::Other(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AskError::Quota);
        }
        if status.as_u16() == 404 {
            return Err(AskError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AskError::Other(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&message, 200)
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AskError::Other(e.to_string()))?;
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| AskError::Other("response carried no text part".to_string()))?
            .to_string();

        info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Model replied");
        Ok(text)
    }

    async fn ask_and_parse(&self, model: &str, prompt: &str) -> Result<Classification, AskError> {
        let raw = self.generate(model, prompt).await?;
        let json = clean_json(&raw);

        match serde_json::from_str::<Classification>(json) {
            Ok(classification) => Ok(classification),
            Err(e) if looks_truncated(&e) => {
                // Token-limit truncation; one re-ask is usually enough.
                warn!(error = %e, "Truncated model JSON; re-asking once");
                let raw = self.generate(model, prompt).await?;
                serde_json::from_str::<Classification>(clean_json(&raw))
                    .map_err(|e| AskError::Other(format!("non-conforming JSON after re-ask: {e}")))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(json, 300),
                    "Model returned non-conforming JSON"
                );
                Err(AskError::Other(format!("non-conforming JSON: {e}")))
            }
        }
    }
}

impl Classifier for GeminiClient {
    #[instrument(level = "info", skip_all)]
    async fn analyze(&self, text_content: &str, client_description: &str) -> Classification {
        if text_content.chars().count() < MIN_CONTENT_CHARS {
            return Classification::fallback("Insufficient or inaccessible website content.");
        }

        let prompt = self.build_prompt(text_content, client_description);
        let backoff = Duration::from_secs(self.config.quota_backoff_secs);

        for model in &self.config.models {
            match self.ask_and_parse(model, &prompt).await {
                Ok(classification) => {
                    info!(
                        model,
                        confidence = classification.confidence_score,
                        "Classification obtained"
                    );
                    return classification;
                }
                Err(AskError::Quota) => {
                    warn!(model, backoff_secs = backoff.as_secs(), "Quota exceeded; backing off");
                    sleep(backoff).await;
                }
                Err(AskError::NotFound) => {
                    warn!(model, "Model not available; trying next backend");
                }
                Err(AskError::Other(reason)) => {
                    warn!(model, %reason, "Backend attempt failed; trying next");
                }
            }
        }

        error!("All LLM backends failed");
        Classification::fallback("LLM connection error (all backends failed).")
    }
}

/// Reduce a model response to its outermost JSON object.
///
/// Handles ```json fences and stray prose on either side by slicing from the
/// first `{` to the last `}`. Returns the input unchanged when no braces are
/// present (the parse error downstream is the diagnostic).
fn clean_json(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn test_clean_json_strips_markdown_fences() {
        let raw = "```json\n{\"is_group\": true}\n```";
        assert_eq!(clean_json(raw), "{\"is_group\": true}");
    }

    #[test]
    fn test_clean_json_strips_surrounding_prose() {
        let raw = "Here is the verdict: {\"is_group\": false} hope that helps!";
        assert_eq!(clean_json(raw), "{\"is_group\": false}");
    }

    #[test]
    fn test_clean_json_passes_through_plain_object() {
        assert_eq!(clean_json("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_no_braces_unchanged() {
        assert_eq!(clean_json("no json here"), "no json here");
    }

    #[test]
    fn test_cleaned_fenced_response_parses() {
        let raw = r#"```json
{
    "is_group": false,
    "is_manufacturer": true,
    "service_match": false,
    "reasoning": "Operates industrial production plants.",
    "evidence_quote": "our three production plants",
    "confidence_score": 90
}
```"#;
        let classification: Classification = serde_json::from_str(clean_json(raw)).unwrap();
        assert!(classification.is_manufacturer);
        assert_eq!(classification.confidence_score, 90);
    }

    #[test]
    fn test_prompt_bounds_corpus() {
        let client = GeminiClient::new(LlmConfig {
            max_content_chars: 100,
            ..LlmConfig::default()
        })
        .unwrap();
        let long_text = "word ".repeat(1000);
        let prompt = client.build_prompt(&long_text, "administrative services");
        // 100 corpus chars plus the fixed prompt scaffolding.
        assert!(prompt.len() < 2000);
        assert!(prompt.contains("administrative services"));
    }

    #[tokio::test]
    async fn test_thin_content_short_circuits_without_network() {
        let client = GeminiClient::new(LlmConfig::default()).unwrap();
        let classification = client.analyze("too short", "services client").await;
        assert_eq!(classification.confidence_score, 0);
        assert!(!classification.service_match);
        assert!(classification.reasoning.contains("Insufficient"));
    }
}
