//! Scout preflight (§4.2): classifies whether the task names an ambiguous
//! institution-specific service whose URL must not be guessed, then (if
//! so) drives a visible auxiliary browser to verify up to three result
//! links via a public search engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cdp_adapter::{Cdp, PageId};

use crate::llm::{CompletionOptions, LlmClient};
use crate::planner::PlanningLogger;

const CAPTCHA_WAIT_CAP: Duration = Duration::from_secs(120);
const CAPTCHA_POLL_INTERVAL: Duration = Duration::from_secs(3);

const SCOUT_SYSTEM_PROMPT: &str = "You classify whether a browsing task names an ambiguous, \
institution-specific service (a university portal, a company's internal SSO, a specific \
employer's HR system) whose URL cannot be safely guessed. If so, respond with ONLY a short \
web search query that would find its real homepage. If the task's destination is unambiguous \
or well-known, respond with exactly: NONE";

const NULL_SENTINEL: &str = "NONE";

#[derive(Clone, Debug, Default)]
pub struct VerifiedUrls {
    pub query: Option<String>,
    pub links: Vec<String>,
}

pub struct Scout<'a> {
    llm: &'a dyn LlmClient,
    cdp: Arc<dyn Cdp + Send + Sync>,
    logger: &'a dyn PlanningLogger,
}

impl<'a> Scout<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        cdp: Arc<dyn Cdp + Send + Sync>,
        logger: &'a dyn PlanningLogger,
    ) -> Self {
        Self { llm, cdp, logger }
    }

    /// Classifies the task; returns a search query or `None`.
    pub async fn classify(&self, task: &str) -> Option<String> {
        let response = self
            .llm
            .complete(SCOUT_SYSTEM_PROMPT, task, CompletionOptions {
                temperature: 0.0,
                max_tokens: 64,
            })
            .await
            .ok()?;
        let trimmed = response.trim();
        if trimmed.eq_ignore_ascii_case(NULL_SENTINEL) || trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Runs the full scout preflight against the given auxiliary page
    /// (a visible tab distinct from the main session browser, opened by
    /// the caller). Never fails the caller: on any failure the plan is
    /// generated without verified URLs, per §4.2.
    pub async fn run(&self, task: &str, auxiliary_page: PageId) -> VerifiedUrls {
        let Some(query) = self.classify(task).await else {
            return VerifiedUrls::default();
        };

        self.logger
            .log(&format!("scout: verifying URL for query '{query}'"));

        match self.search_and_extract(&query, auxiliary_page).await {
            Ok(links) => VerifiedUrls {
                query: Some(query),
                links,
            },
            Err(err) => {
                self.logger
                    .log(&format!("scout: failed to verify URL ({err}); proceeding unverified"));
                VerifiedUrls {
                    query: Some(query),
                    links: Vec::new(),
                }
            }
        }
    }

    async fn search_and_extract(
        &self,
        query: &str,
        page: PageId,
    ) -> Result<Vec<String>, String> {
        let search_url = format!(
            "https://duckduckgo.com/html/?q={}",
            urlencoding_encode(query)
        );
        self.cdp
            .navigate(page, &search_url, Duration::from_secs(10))
            .await
            .map_err(|e| e.to_string())?;

        let deadline = Instant::now() + CAPTCHA_WAIT_CAP;
        loop {
            let is_captcha = self.detect_captcha(page).await;
            if !is_captcha {
                break;
            }
            if Instant::now() >= deadline {
                self.logger
                    .log("scout: CAPTCHA wait exceeded 2 minutes, proceeding without verified URLs");
                return Err("captcha timeout".to_string());
            }
            self.logger
                .log("scout: CAPTCHA detected, waiting for the user to solve it");
            tokio::time::sleep(CAPTCHA_POLL_INTERVAL).await;
        }

        self.extract_links(page).await
    }

    async fn detect_captcha(&self, page: PageId) -> bool {
        let script = r#"(function() {
            const text = (document.body && document.body.innerText || '').toLowerCase();
            if (text.includes('unusual traffic')) return true;
            if (document.querySelector('#captcha, .g-recaptcha, iframe[src*="captcha"]')) return true;
            return false;
        })()"#;
        self.cdp
            .evaluate_script(page, script)
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    async fn extract_links(&self, page: PageId) -> Result<Vec<String>, String> {
        let script = r#"(function() {
            const anchors = Array.from(document.querySelectorAll('a[href^="http"]')).slice(0, 12);
            const links = anchors.map(a => a.href).filter((href, idx, arr) => arr.indexOf(href) === idx);
            return JSON.stringify(links.slice(0, 3));
        })()"#;
        let value = self
            .cdp
            .evaluate_script(page, script)
            .await
            .map_err(|e| e.to_string())?;
        let raw = value.as_str().ok_or("scout extraction returned non-string")?;
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }
}

fn urlencoding_encode(input: &str) -> String {
    input
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoding_escapes_spaces() {
        assert_eq!(urlencoding_encode("best 4k monitor"), "best%204k%20monitor");
    }
}
