//! Evidence screenshot pipeline: highlight, audit banner, full-page capture.
//!
//! One capture request = fetch → (optional) evidence highlight → audit banner
//! stamp → settle → full-page PNG. The image is the deliverable: a fetch
//! failure aborts the request, but highlight and banner failures only degrade
//! it; their outcomes are carried in the result as booleans so callers can
//! assert on them instead of scraping logs.

use crate::browser::{self, BrowserSession};
use crate::config::CaptureConfig;
use crate::highlight;
use crate::models::{CaptureResult, EvidenceQuery};
use chromiumoxide::page::Page;
use chrono::Local;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Inject the fixed audit banner across the top of the viewport.
///
/// The banner carries the capture timestamp, sits above all page content
/// (maximum z-index), and pushes the document down by its own height so it
/// never occludes the page, in particular not a just-scrolled-to evidence
/// mark. Returns whether the banner landed.
pub async fn stamp_banner(page: &Page) -> bool {
    let timestamp = Local::now().format("%d/%m/%Y %H:%M:%S");
    let script = format!(
        r#"(() => {{
    const banner = document.createElement('div');
    banner.innerText = 'AUDITED EVIDENCE: {timestamp}';
    banner.style.position = 'fixed';
    banner.style.top = '0';
    banner.style.left = '0';
    banner.style.width = '100%';
    banner.style.zIndex = '2147483647';
    banner.style.backgroundColor = '#cc0000';
    banner.style.color = 'white';
    banner.style.textAlign = 'center';
    banner.style.fontSize = '24px';
    banner.style.fontWeight = 'bold';
    banner.style.padding = '10px 0';
    banner.style.boxShadow = '0px 4px 15px rgba(0,0,0,0.6)';
    document.body.prepend(banner);
    document.body.style.marginTop = '60px';
}})()"#
    );

    match browser::evaluate_unit(page, &script).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Audit banner injection failed");
            false
        }
    }
}

/// Run one evidence capture request end to end.
///
/// Worker-side entry point for screenshot requests. Always returns a result:
/// fetch failures yield `success = false`, cosmetic failures (highlight,
/// banner) are recorded but never abort the capture.
#[instrument(level = "info", skip_all, fields(url = %query.url, path = %query.path))]
pub async fn run_capture(query: &EvidenceQuery, config: &CaptureConfig) -> CaptureResult {
    let session = match BrowserSession::launch(1920, 1080).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Browser launch failed");
            return CaptureResult::failed();
        }
    };

    let result = capture_with_session(&session, query, config).await;
    session.close().await;
    result
}

async fn capture_with_session(
    session: &BrowserSession,
    query: &EvidenceQuery,
    config: &CaptureConfig,
) -> CaptureResult {
    let page = match session.new_page(None).await {
        Ok(page) => page,
        Err(e) => {
            warn!(error = %e, "Page setup failed");
            return CaptureResult::failed();
        }
    };

    let nav_timeout = Duration::from_millis(config.nav_timeout_ms);
    if let Err(e) = session.navigate(&page, &query.url, nav_timeout).await {
        warn!(error = %e, "Evidence page navigation failed");
        return CaptureResult::failed();
    }
    tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;

    let cosmetic_settle = Duration::from_millis(config.cosmetic_settle_ms);

    // Highlight before stamping so the scroll-to-mark happens first and the
    // banner never lands on top of the evidence.
    let highlighted = if query.text.is_empty() {
        false
    } else {
        let found = highlight::locate_and_mark(&page, &query.text).await;
        tokio::time::sleep(cosmetic_settle).await;
        found
    };

    let stamped = stamp_banner(&page).await;
    tokio::time::sleep(cosmetic_settle).await;

    if let Err(e) = browser::screenshot_full_page(&page, Path::new(&query.path)).await {
        warn!(error = %e, "Screenshot write failed");
        return CaptureResult::failed();
    }

    info!(highlighted, stamped, "Evidence captured");
    CaptureResult {
        success: true,
        path: Some(query.path.clone()),
        highlighted,
        stamped,
    }
}
