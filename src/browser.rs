//! Headless Chrome session management and page fetching.
//!
//! This module owns the browser side of the worker process: launching a
//! Chromium instance, navigating with a bounded timeout, capturing the HTTP
//! status of the document response from the CDP network stream, and reading
//! rendered page state (title, visible text, HTML, screenshots).
//!
//! One [`BrowserSession`] lives for exactly one worker request; it is never
//! reused across requests. The parent process never touches this module; all
//! browser-driving code runs behind the process isolation boundary.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventResponseReceived};
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use futures::StreamExt;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// How long to wait for the document's response event after navigation
/// completes before giving up on a status code.
const STATUS_WAIT: Duration = Duration::from_secs(3);

/// Transport-level fetch failures.
///
/// `Connection` covers DNS, timeout, and navigation errors and is surfaced to
/// the wire as status 0. `Http` carries a terminal >= 400 document status.
/// Neither is retried.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Timeout/connection error: {0}")]
    Connection(String),
    #[error("HTTP {0}")]
    Http(u16),
}

/// A single-use headless Chrome session.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a headless browser with the given window size.
    ///
    /// The CDP event handler runs on a background task for the lifetime of
    /// the session.
    #[instrument(level = "debug", skip_all)]
    pub async fn launch(width: u32, height: u32) -> Result<Self, Box<dyn Error>> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .build()
            .map_err(|e| format!("browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        debug!("Browser session launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a fresh page, optionally overriding the user agent, with network
    /// events enabled (needed for status capture).
    pub async fn new_page(&self, user_agent: Option<&str>) -> Result<Page, Box<dyn Error>> {
        let page = self.browser.new_page("about:blank").await?;
        if let Some(user_agent) = user_agent {
            page.set_user_agent(user_agent).await?;
        }
        if let Err(e) = page.execute(EnableParams::default()).await {
            warn!(error = %e, "Failed to enable network domain; status capture degraded");
        }
        Ok(page)
    }

    /// Navigate `page` to `url`, waiting until the DOM is parsed, and return
    /// the HTTP status of the document response.
    ///
    /// Returns status 0 when navigation succeeded but no document response
    /// was observed (some DNS-level redirect setups). A status >= 400 is
    /// terminal for the URL: surfaced as [`FetchError::Http`], no retry.
    #[instrument(level = "debug", skip(self, page), fields(%url))]
    pub async fn navigate(
        &self,
        page: &Page,
        url: &str,
        timeout: Duration,
    ) -> Result<u16, FetchError> {
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Err(_) => return Err(FetchError::Connection(format!("navigation timeout after {timeout:?}"))),
            Ok(Err(e)) => return Err(FetchError::Connection(e.to_string())),
            Ok(Ok(_)) => {}
        }

        let status = document_status(&mut responses).await.unwrap_or(0);
        debug!(status, "Navigation settled");

        if status >= 400 {
            return Err(FetchError::Http(status));
        }
        Ok(status)
    }

    /// Close the browser and stop the CDP handler. Best effort: the worker
    /// process exits right after, taking Chromium down with it either way.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// Pull the first text/html response off the event stream: the document
/// response for the navigation, even across redirects.
async fn document_status(
    responses: &mut (impl futures::Stream<Item = std::sync::Arc<EventResponseReceived>> + Unpin),
) -> Option<u16> {
    let deadline = tokio::time::sleep(STATUS_WAIT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = responses.next() => {
                match event {
                    Some(event) => {
                        let mime = event.response.mime_type.to_lowercase();
                        if mime.starts_with("text/html") || mime.starts_with("application/xhtml") {
                            return Some(event.response.status as u16);
                        }
                    }
                    None => return None,
                }
            }
            _ = &mut deadline => return None,
        }
    }
}

/// Read the page title, empty when absent.
pub async fn page_title(page: &Page) -> String {
    match page.get_title().await {
        Ok(Some(title)) => title,
        _ => String::new(),
    }
}

/// Read the rendered body's visible text (innerText, not markup).
pub async fn body_text(page: &Page) -> String {
    let evaluated = match page
        .evaluate("document.body ? document.body.innerText : ''")
        .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Failed to read body text");
            return String::new();
        }
    };
    match evaluated.into_value::<String>() {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Body text was not a string");
            String::new()
        }
    }
}

/// Read the page's current rendered HTML.
pub async fn rendered_html(page: &Page) -> String {
    match page.content().await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Failed to read page content");
            String::new()
        }
    }
}

/// The page's URL after navigation and redirects; falls back to `fallback`.
pub async fn current_url(page: &Page, fallback: &str) -> String {
    match page.url().await {
        Ok(Some(url)) => url,
        _ => fallback.to_string(),
    }
}

/// Evaluate a JS expression expected to produce a boolean.
pub async fn evaluate_bool(page: &Page, expr: &str) -> Result<bool, Box<dyn Error>> {
    let value: bool = page.evaluate(expr).await?.into_value()?;
    Ok(value)
}

/// Evaluate a JS expression for its side effects only.
pub async fn evaluate_unit(page: &Page, expr: &str) -> Result<(), Box<dyn Error>> {
    page.evaluate(expr).await?;
    Ok(())
}

/// Capture a full-page PNG to `path`.
#[instrument(level = "debug", skip(page), fields(path = %path.display()))]
pub async fn screenshot_full_page(page: &Page, path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    page.save_screenshot(
        ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build(),
        path,
    )
    .await?;
    Ok(())
}
