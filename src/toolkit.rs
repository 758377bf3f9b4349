//! Thin collaborator-boundary wrapper around the browser-automation
//! toolkit (`cdp_adapter::Cdp`). Everything in this file is a pass-through
//! or a small convenience; the toolkit itself is out of scope (§1).

use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{AdapterError, Cdp, PageId};
use serde_json::Value;

/// Binds a `Cdp` implementation to a single page/tab. Re-bound every
/// orchestrator iteration to the newest tab (the "zombie-page fix", §4.8).
#[derive(Clone)]
pub struct Toolkit {
    cdp: Arc<dyn Cdp + Send + Sync>,
    pub page: PageId,
}

impl Toolkit {
    pub fn new(cdp: Arc<dyn Cdp + Send + Sync>, page: PageId) -> Self {
        Self { cdp, page }
    }

    pub fn rebind(&mut self, page: PageId) {
        self.page = page;
    }

    /// Re-binds to the newest open tab, if one exists and differs from
    /// the current page. This is the "zombie-page fix" (§4.8): a click
    /// with `target=_blank` opens a new tab, and the next objective
    /// iteration must drive that tab, not the one that spawned it.
    pub async fn rebind_to_newest_tab(&mut self) -> bool {
        match self.cdp.newest_page().await {
            Some(page) if page != self.page => {
                self.page = page;
                true
            }
            _ => false,
        }
    }

    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AdapterError> {
        self.cdp.navigate(self.page, url, timeout).await
    }

    /// Runs an arbitrary JS expression in the page's main execution
    /// context. Used for the scan script, scroll geometry sampling, and
    /// the cheap visible-text extraction the decider prompts with.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        self.cdp.evaluate_script(self.page, expression).await
    }

    /// Clicks the element addressed by `selector` (normally a
    /// `[data-soulbrowser-id="..."]` attribute selector written by the
    /// scanner — never a positional or structural selector).
    pub async fn click(&self, selector: &str, timeout: Duration) -> Result<(), AdapterError> {
        self.cdp.click(self.page, selector, timeout).await
    }

    pub async fn type_text(
        &self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.cdp.type_text(self.page, selector, text, timeout).await
    }

    pub async fn wait_basic(&self, gate: &str, timeout: Duration) -> Result<(), AdapterError> {
        self.cdp
            .wait_basic(self.page, gate.to_string(), timeout)
            .await
    }

    pub async fn screenshot(&self, timeout: Duration) -> Result<Vec<u8>, AdapterError> {
        self.cdp.screenshot(self.page, timeout).await
    }

    /// Races a navigation-or-dom-ready wait with a hard 3s cap, per §5.
    pub async fn wait_stable(&self) {
        let _ = self
            .wait_basic("domcontentloaded", Duration::from_secs(3))
            .await;
    }

    /// Networkidle wait capped at 1.5s — §5 notes this is intentionally
    /// short because analytics/tracker traffic never truly idles.
    pub async fn wait_network_idle(&self, cap: Duration) {
        let capped = cap.min(Duration::from_millis(1500));
        let _ = self.wait_basic("networkidle", capped).await;
    }

    pub async fn current_url(&self) -> String {
        self.evaluate("location.href")
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub async fn current_title(&self) -> String {
        self.evaluate("document.title")
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Raw `innerText` of `document.body`, lowercased/whitespace-collapsed
    /// by the caller as needed. Excludes script/style/hidden text because
    /// `innerText` (not `textContent`) is used.
    pub async fn visible_text(&self, max_chars: usize) -> String {
        let script = format!(
            "(document.body && document.body.innerText || '').slice(0, {max_chars})"
        );
        self.evaluate(&script)
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }
}
