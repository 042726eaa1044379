//! Website text scraping: home page, junk detection, one secondary link.
//!
//! The scrape flow visits a candidate company's home page, classifies
//! placeholder/parked pages, opportunistically follows a single
//! navigation-keyword link for more context, and assembles an evidence-ready
//! text corpus:
//!
//! 1. **Navigate** to the (scheme-normalized) URL and wait for the DOM
//! 2. **Junk check** against title + leading body text
//! 3. **Deep scrape**: first anchor whose visible text matches a navigation
//!    keyword, resolved against the current page URL
//! 4. **Corpus**: labeled page sections, whitespace-collapsed at the end
//!
//! The classification and link-selection rules are pure functions so they can
//! be tested without a browser; [`run_scrape`] wires them to a live session
//! inside the worker process.

use crate::browser::{self, BrowserSession, FetchError};
use crate::config::ScrapeConfig;
use crate::models::{FetchResult, NavigationTarget};
use crate::utils::{char_prefix, collapse_whitespace, normalize_url};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Phrases that mark a page as a domain-marketplace or placeholder page.
const JUNK_KEYWORDS: &[&str] = &[
    "domain for sale",
    "comprar este dominio",
    "parked free",
    "godaddy",
    "sedo",
    "hugedomains",
    "namecheap",
    "this domain is available",
    "buy this domain",
    "dominio a la venta",
    "site under construction",
    "coming soon",
    "renew now",
];

/// Navigation link text worth following for more company context.
const NAV_KEYWORDS: &[&str] = &[
    "servicios",
    "services",
    "about",
    "nosotros",
    "grupo",
    "group",
    "quienes somos",
];

/// How much leading body text the junk check scans.
const JUNK_SCAN_CHARS: usize = 1000;

/// How much body text a junk result carries as preview.
const JUNK_PREVIEW_CHARS: usize = 500;

/// A secondary page thinner than this contributes nothing to the corpus.
const MIN_SECONDARY_CHARS: usize = 100;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Classify a fetched page as junk from its title and leading body text.
///
/// Both inputs are lowercased; only the first [`JUNK_SCAN_CHARS`] characters
/// of the body are scanned, which bounds the work and avoids false positives
/// buried deep in unrelated content. Returns the matched keyword.
pub fn junk_keyword(title: &str, body: &str) -> Option<&'static str> {
    let haystack = format!(
        "{} {}",
        title.to_lowercase(),
        char_prefix(body, JUNK_SCAN_CHARS).to_lowercase()
    );
    JUNK_KEYWORDS.iter().find(|kw| haystack.contains(**kw)).copied()
}

/// Bounded preview of a junk page, kept in the result so a reviewer can see
/// what tripped the classifier.
fn junk_preview(title: &str, body: &str) -> String {
    format!("TITLE: {title}\nTEXT: {}...", char_prefix(body, JUNK_PREVIEW_CHARS))
}

/// Select the first secondary navigation link from rendered HTML.
///
/// Scans at most `max_anchors` anchors in document order and picks the first
/// whose visible text contains any navigation keyword; ties break by document
/// order, no scoring. Relative hrefs resolve against `base_url`, the page's
/// *current* URL, so redirects are handled correctly. Anchors whose text or
/// href can't be used are skipped silently.
pub fn find_secondary_link(
    html: &str,
    base_url: &str,
    max_anchors: usize,
) -> Option<NavigationTarget> {
    let base = Url::parse(base_url).ok()?;
    let document = Html::parse_document(html);

    for element in document.select(&ANCHOR_SELECTOR).take(max_anchors) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let lowered = text.to_lowercase();
        if !NAV_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        return Some(NavigationTarget {
            href: resolved.to_string(),
            anchor_text: text.trim().to_string(),
        });
    }
    None
}

/// Format one labeled corpus section.
fn page_section(label: &str, text: &str) -> String {
    format!("--- PAGE: {label} ---\n{text}\n\n")
}

/// Scrape one company website into a [`FetchResult`].
///
/// This is the worker-side entry point for scrape requests. It owns a fresh
/// browser session for the duration of the call and always returns a result;
/// every failure mode is folded into the wire shape rather than propagated.
#[instrument(level = "info", skip_all, fields(url = %raw_url))]
pub async fn run_scrape(raw_url: &str, config: &ScrapeConfig) -> FetchResult {
    let Some(url) = normalize_url(raw_url) else {
        return FetchResult::failure(raw_url, 0, "Empty URL");
    };

    let session = match BrowserSession::launch(1280, 720).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Browser launch failed");
            return FetchResult::failure(&url, 500, format!("Browser launch failed: {e}"));
        }
    };

    let result = scrape_with_session(&session, &url, config).await;
    session.close().await;
    result
}

async fn scrape_with_session(
    session: &BrowserSession,
    url: &str,
    config: &ScrapeConfig,
) -> FetchResult {
    let page = match session.new_page(Some(&config.user_agent)).await {
        Ok(page) => page,
        Err(e) => return FetchResult::failure(url, 500, format!("Page setup failed: {e}")),
    };

    // Home page
    let nav_timeout = Duration::from_millis(config.nav_timeout_ms);
    let status = match session.navigate(&page, url, nav_timeout).await {
        Ok(status) => status,
        Err(FetchError::Http(status)) => {
            return FetchResult::failure(url, status, format!("HTTP {status}"));
        }
        Err(FetchError::Connection(_)) => {
            return FetchResult::failure(url, 0, "Timeout/connection error");
        }
    };
    tokio::time::sleep(Duration::from_millis(config.home_settle_ms)).await;

    let title = browser::page_title(&page).await;
    let body = browser::body_text(&page).await;

    // Junk short-circuits deep scraping: the preview is all a reviewer needs.
    if let Some(keyword) = junk_keyword(&title, &body) {
        info!(keyword, "Junk page detected");
        // Junk is a content classification, not a transport failure: when the
        // document status went unobserved, report the load as a plain 200.
        let status = if (200..400).contains(&status) { status } else { 200 };
        return FetchResult {
            status,
            is_junk: true,
            text_content: junk_preview(&title, &body),
            error_msg: Some(format!("Junk detected: {keyword}")),
            evidence_url: url.to_string(),
        };
    }

    let mut content = page_section(&format!("HOME ({title})"), &body);
    let mut evidence_url = url.to_string();

    // Deep scrape: one navigation-keyword link, failures logged into the
    // corpus but never fatal; the home page already succeeded.
    let home_url = browser::current_url(&page, url).await;
    let html = browser::rendered_html(&page).await;
    if let Some(target) = find_secondary_link(&html, &home_url, config.max_anchors) {
        debug!(href = %target.href, anchor = %target.anchor_text, "Following secondary link");
        match session.navigate(&page, &target.href, nav_timeout).await {
            Ok(_) => {
                tokio::time::sleep(Duration::from_millis(config.secondary_settle_ms)).await;
                let secondary = browser::body_text(&page).await;
                if secondary.chars().count() > MIN_SECONDARY_CHARS {
                    content.push_str(&page_section(&format!("EXTRA ({})", target.href), &secondary));
                    evidence_url = browser::current_url(&page, &target.href).await;
                } else {
                    content.push_str("\n(secondary section visited but contained little text)");
                }
            }
            Err(e) => {
                warn!(error = %e, href = %target.href, "Secondary navigation failed");
                content.push_str(&format!("\n[secondary navigation error: {e}]"));
            }
        }
    }

    let text_content = collapse_whitespace(&content);
    info!(status, chars = text_content.chars().count(), "Scrape complete");
    FetchResult {
        status,
        is_junk: false,
        text_content,
        error_msg: None,
        evidence_url,
    }
}
