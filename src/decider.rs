//! Decider (§4.3): current observation → next [`Decision`], via an LLM
//! call with a heuristic fallback that prevents the historical
//! "premature DONE" cascade.
#![allow(dead_code)]

use regex::Regex;

use crate::action::{Action, Decision, ScrollDirection};
use crate::history::HistoryStore;
use crate::llm::{extract_first_json_object, CompletionOptions, LlmClient};
use crate::planner::Step;
use crate::scanner::Region;

const MAX_PAGE_TEXT_CHARS: usize = 4000;
const MAX_REGIONS: usize = 40;
const MAX_NOTES_CHARS: usize = 3000;

const DECIDER_SYSTEM_PROMPT: &str = "You decide the next browser action. Fill values must come \
from the task text, never invented. Never repeat the same action if stateChanged=false on the \
last outcome. Stay within the current step's objective. DONE is reserved for objective \
satisfaction, not merely landing on a search-results page. For research tasks, DONE requires \
extracted content, not just a results page. Respond with ONLY a JSON object of the shape \
{\"action\": {\"type\": ACTION_TAG, \"data\": {...}}, \"reasoning\": string, \"confidence\": \
number}. ACTION_TAG is one of VISION_CLICK, DOM_CLICK, VISION_FILL, DOM_FILL, KEY_PRESS, \
SCROLL, WAIT, ASK_USER, CONFIRM, DONE.";

/// Per-objective state carried across decider calls: the graduated
/// heuristic-fallback retry counter, reset on any successful LLM
/// decision.
#[derive(Clone, Debug, Default)]
pub struct DeciderState {
    consecutive_fallbacks: u32,
}

impl DeciderState {
    pub fn reset(&mut self) {
        self.consecutive_fallbacks = 0;
    }
}

pub struct ScrollStatus {
    pub scroll_count: u32,
    pub content_visible: bool,
    pub bottom_reached: bool,
}

pub struct DecideContext<'a> {
    pub context_prompt: &'a str,
    pub current_url: &'a str,
    pub history: &'a HistoryStore,
    pub page_text: &'a str,
    pub regions: &'a [Region],
    pub last_outcome_changed: Option<bool>,
    pub scroll_status: &'a ScrollStatus,
    pub step: &'a Step,
    pub feedback: Option<&'a str>,
}

pub struct Decider<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> Decider<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// `decide(sessionId, contextPrompt, regions, stepNumber, feedback?) → Decision`.
    pub async fn decide(
        &self,
        ctx: &DecideContext<'_>,
        state: &mut DeciderState,
    ) -> Decision {
        let prompt = self.compose_prompt(ctx);

        let llm_decision = self
            .llm
            .complete(DECIDER_SYSTEM_PROMPT, &prompt, CompletionOptions::default())
            .await
            .ok()
            .and_then(|response| extract_first_json_object(&response).map(str::to_string))
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
            .and_then(|value| Decision::from_json_patched(value).ok());

        match llm_decision {
            Some(decision) => {
                state.reset();
                decision
            }
            None => heuristic_fallback(ctx, state),
        }
    }

    fn compose_prompt(&self, ctx: &DecideContext<'_>) -> String {
        let regions_block = ctx
            .regions
            .iter()
            .take(MAX_REGIONS)
            .map(|r| {
                format!(
                    "{} [{:?}] \"{}\"{}",
                    r.id,
                    r.role,
                    r.label,
                    r.href.as_ref().map(|h| format!(" href={h}")).unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let page_text: String = ctx.page_text.chars().take(MAX_PAGE_TEXT_CHARS).collect();

        let mut prompt = format!(
            "{}\n\nCurrent URL: {}\n\nShort-term history (last 5 actions):\n{}\n\nVisible page text:\n{}\n\nRegions:\n{}\n\nlastOutcome.stateChanged: {:?}\n\nScroll status: {} scrolls so far, content_visible={}, bottom_reached={}",
            ctx.context_prompt,
            ctx.current_url,
            ctx.history.to_prompt_block(),
            page_text,
            regions_block,
            ctx.last_outcome_changed,
            ctx.scroll_status.scroll_count,
            ctx.scroll_status.content_visible,
            ctx.scroll_status.bottom_reached,
        );

        if let Some(feedback) = ctx.feedback {
            prompt.push_str(&format!("\n\nFeedback from previous attempt: {feedback}"));
        }

        prompt
    }
}

/// Graduated retry counter fallback (§4.3): first failure → SCROLL down;
/// second → WAIT 2s; third → DONE.
fn heuristic_fallback(ctx: &DecideContext<'_>, state: &mut DeciderState) -> Decision {
    if let Some(decision) = literal_click_request(ctx) {
        return decision;
    }
    if let Some(decision) = already_done_check(ctx) {
        return decision;
    }

    state.consecutive_fallbacks += 1;
    let (action, reasoning) = match state.consecutive_fallbacks {
        1 => (
            Action::Scroll {
                direction: ScrollDirection::Down,
                amount: None,
            },
            "heuristic fallback: no LLM answer, scrolling to reveal more content",
        ),
        2 => (
            Action::Wait {
                duration: Some(2000),
                until: None,
            },
            "heuristic fallback: no LLM answer, waiting for content to settle",
        ),
        _ => (
            Action::Done {
                reason: Some("heuristic fallback exhausted after repeated LLM failures".into()),
            },
            "heuristic fallback: giving up on this objective after repeated LLM failures",
        ),
    };

    Decision {
        action,
        reasoning: reasoning.to_string(),
        confidence: 0.2,
    }
}

/// "Click first link"-style literal instructions the fallback can satisfy
/// without an LLM call.
fn literal_click_request(ctx: &DecideContext<'_>) -> Option<Decision> {
    let title_lower = ctx.step.title.to_lowercase();
    if title_lower.contains("click first link") || title_lower.contains("click the first link") {
        let region = ctx.regions.iter().find(|r| r.href.is_some())?;
        return Some(Decision {
            action: Action::VisionClick {
                region_id: region.id.clone(),
                description: Some(format!("click first link: {}", region.label)),
            },
            reasoning: "heuristic fallback: literal 'click first link' instruction".to_string(),
            confidence: 0.6,
        });
    }

    if let Some(label) = title_lower.strip_prefix("click ") {
        let label = label.trim();
        if let Some(region) = ctx
            .regions
            .iter()
            .find(|r| r.label.to_lowercase().contains(label))
        {
            return Some(Decision {
                action: Action::VisionClick {
                    region_id: region.id.clone(),
                    description: Some(format!("click region labeled '{}'", region.label)),
                },
                reasoning: "heuristic fallback: step title names a region label".to_string(),
                confidence: 0.6,
            });
        }
    }

    None
}

/// Already-done check (§4.3 step 2): the step's objective mentions
/// "navigate to X" and the URL matches X's host, or says "search" and the
/// URL already shows search-results markers.
fn already_done_check(ctx: &DecideContext<'_>) -> Option<Decision> {
    let lower_desc = format!("{} {}", ctx.step.title, ctx.step.description).to_lowercase();
    let url_lower = ctx.current_url.to_lowercase();

    let navigate_re = Regex::new(r"navigate\s+to\s+([a-z0-9.\-]+\.[a-z]{2,})").ok()?;
    if let Some(captures) = navigate_re.captures(&lower_desc) {
        let host = captures.get(1)?.as_str();
        if url_lower.contains(host) {
            return Some(done_decision("already-done check: URL matches navigation target"));
        }
    }

    if lower_desc.contains("search") {
        let markers = ["search", "results", "?q=", "query="];
        if markers.iter().any(|m| url_lower.contains(m)) {
            return Some(done_decision(
                "already-done check: URL already shows search-results markers",
            ));
        }
    }

    None
}

fn done_decision(reasoning: &str) -> Decision {
    Decision {
        action: Action::Done { reason: Some(reasoning.to_string()) },
        reasoning: reasoning.to_string(),
        confidence: 0.55,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> Step {
        Step {
            id: 1,
            title: "Search for hello".into(),
            description: "Search for hello on example.com".into(),
            needs_auth: false,
            target_url: None,
        }
    }

    #[test]
    fn graduated_fallback_escalates_to_done() {
        let history = HistoryStore::new();
        let scroll = ScrollStatus { scroll_count: 0, content_visible: true, bottom_reached: false };
        let step = step();
        let ctx = DecideContext {
            context_prompt: "",
            current_url: "https://example.com",
            history: &history,
            page_text: "",
            regions: &[],
            last_outcome_changed: None,
            scroll_status: &scroll,
            step: &step,
            feedback: None,
        };
        let mut state = DeciderState::default();

        let d1 = heuristic_fallback(&ctx, &mut state);
        assert!(matches!(d1.action, Action::Scroll { .. }));
        let d2 = heuristic_fallback(&ctx, &mut state);
        assert!(matches!(d2.action, Action::Wait { .. }));
        let d3 = heuristic_fallback(&ctx, &mut state);
        assert!(matches!(d3.action, Action::Done { .. }));
    }

    #[test]
    fn already_done_detects_search_markers() {
        let history = HistoryStore::new();
        let scroll = ScrollStatus { scroll_count: 0, content_visible: true, bottom_reached: false };
        let step = step();
        let ctx = DecideContext {
            context_prompt: "",
            current_url: "https://example.com/search?q=hello",
            history: &history,
            page_text: "",
            regions: &[],
            last_outcome_changed: None,
            scroll_status: &scroll,
            step: &step,
            feedback: None,
        };
        let decision = already_done_check(&ctx).expect("already done");
        assert!(matches!(decision.action, Action::Done { .. }));
    }
}
