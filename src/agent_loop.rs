//! Agent loop (§4.7): drives a single objective to completion or pause.
//! One invocation covers URL-change detection, OBSERVE, the
//! auto-recovery gate, the auto-scroll gate, DECIDE, the guardrail
//! check, ACT, and VERIFY — strictly sequential, no intra-iteration
//! concurrency (§5).
#![allow(dead_code)]

use std::time::Duration;

use soulbrowser_policy_center::{guardrail_check, url_allowed, ActionIntent, GuardrailConfig};

use crate::action::{Action, ScrollDirection};
use crate::channel::{ClientChannel, Phase};
use crate::db::{screenshot_artifact_path, Db};
use crate::decider::{DecideContext, Decider, DeciderState, ScrollStatus};
use crate::errors::{SoulBrowserError, SoulResult};
use crate::history::{HistoryEntry, HistoryStore};
use crate::llm::LlmClient;
use crate::planner::Step;
use crate::scanner::{Region, Scanner};
use crate::toolkit::Toolkit;
use crate::verifier::{outcome_from_snapshots, StateSnapshot, Verifier};

pub const DEFAULT_STEP_CAP: usize = 50;
pub const DEFAULT_SCROLL_CAP: u32 = 5;
const SCROLL_AMOUNT_PX: i64 = 600;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseKind {
    AskUser,
    Confirm,
}

pub struct AgentLoopResult {
    pub completed: bool,
    pub reason: String,
    pub pending_action: Option<Action>,
    pub pause_kind: Option<PauseKind>,
}

/// Auto-scroll bookkeeping, reset whenever the URL changes (§4.7 step 1).
#[derive(Clone, Debug, Default)]
struct ScrollBookkeeping {
    count: u32,
    bottom_reached: bool,
    content_visible: bool,
    last_scroll_y: f64,
    last_scroll_height: f64,
}

impl ScrollBookkeeping {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn status(&self) -> ScrollStatus {
        ScrollStatus {
            scroll_count: self.count,
            content_visible: self.content_visible,
            bottom_reached: self.bottom_reached,
        }
    }
}

pub struct AgentLoopContext<'a> {
    pub toolkit: &'a Toolkit,
    pub llm: &'a dyn LlmClient,
    pub channel: &'a ClientChannel,
    pub db: &'a Db,
    pub session_id: &'a str,
    pub artifacts_dir: &'a std::path::Path,
    pub guardrail_config: &'a GuardrailConfig,
    pub step: &'a Step,
    pub context_prompt: &'a str,
    pub step_cap: usize,
    pub scroll_cap: u32,
}

#[derive(Default)]
pub struct AgentLoopState {
    pub history: HistoryStore,
    pub decider_state: DeciderState,
    scroll: ScrollBookkeeping,
    last_url: Option<String>,
    last_action_was_fill_nochange: bool,
    recovery_tries: u32,
}

impl AgentLoopState {
    pub fn reset_for_new_objective(&mut self, resuming: bool) {
        if !resuming {
            self.history = HistoryStore::new();
            self.decider_state.reset();
            self.scroll.reset();
            self.last_url = None;
            self.recovery_tries = 0;
        }
    }
}

pub struct AgentLoop;

impl AgentLoop {
    /// Runs the per-objective state machine until `DONE`, a pause, or the
    /// step cap is hit.
    pub async fn run_objective(
        ctx: &AgentLoopContext<'_>,
        state: &mut AgentLoopState,
        step_counter: &mut u64,
    ) -> AgentLoopResult {
        for _ in 0..ctx.step_cap {
            *step_counter += 1;
            ctx.channel.set_step(*step_counter);

            // 1. URL-change detection.
            let current_url = ctx.toolkit.current_url().await;
            if state.last_url.as_deref() != Some(current_url.as_str()) {
                state.scroll.reset();
                state.last_url = Some(current_url.clone());
            }

            // 2. OBSERVE.
            let scanner = Scanner::new(ctx.toolkit);
            let regions = match scanner.scan(false).await {
                Ok(regions) => regions,
                Err(err) => {
                    ctx.channel
                        .log_error(Phase::Observe, "scan failed", err.to_string())
                        .await;
                    Vec::new()
                }
            };
            let page_text = ctx.toolkit.visible_text(4000).await;
            ctx.channel
                .log(
                    Phase::Observe,
                    format!(
                        "{} regions, url={current_url}, text_len={}",
                        regions.len(),
                        page_text.len()
                    ),
                )
                .await;

            // 3. Auto-recovery gate.
            if state.history.last_was_stale_fill() {
                if let Some(result) =
                    Self::auto_recovery(ctx, state, &regions, &current_url).await
                {
                    return result;
                }
                continue;
            }

            // 4. Auto-scroll gate.
            if !state.scroll.content_visible
                && !state.scroll.bottom_reached
                && state.scroll.count < ctx.scroll_cap
            {
                let labels: Vec<String> = regions.iter().map(|r| r.label.clone()).collect();
                let visible = crate::visibility::visible(ctx.llm, ctx.step, &page_text, &labels).await;
                if visible {
                    state.scroll.content_visible = true;
                } else {
                    Self::auto_scroll_step(ctx, &mut state.scroll).await;
                    continue;
                }
            }

            // 5. DECIDE.
            let scroll_status = state.scroll.status();
            let decide_ctx = DecideContext {
                context_prompt: ctx.context_prompt,
                current_url: &current_url,
                history: &state.history,
                page_text: &page_text,
                regions: &regions,
                last_outcome_changed: state.history.last().map(|e| e.state_changed),
                scroll_status: &scroll_status,
                step: ctx.step,
                feedback: None,
            };
            let decider = Decider::new(ctx.llm);
            let decision = decider.decide(&decide_ctx, &mut state.decider_state).await;
            ctx.channel
                .log(Phase::Decide, format!("{} ({})", decision.action.describe(), decision.reasoning))
                .await;

            if let Some(result) = Self::terminal_result(&decision.action) {
                return result;
            }

            // 6. Guardrail check.
            let target_region = decision
                .action
                .region_id()
                .and_then(|id| regions.iter().find(|r| r.id == id));
            let label = target_region.map(|r| r.label.as_str());
            let intent = ActionIntent {
                target_label: label,
                fill_value: decision.action.fill_value(),
            };
            let verdict = guardrail_check(&intent, ctx.guardrail_config);
            if !verdict.allowed {
                if verdict.requires_confirmation {
                    return AgentLoopResult {
                        completed: false,
                        reason: verdict.reason.unwrap_or_default(),
                        pending_action: Some(decision.action),
                        pause_kind: Some(PauseKind::Confirm),
                    };
                }
                ctx.channel
                    .log(Phase::Decide, format!("guardrail denied: {:?}", verdict.reason))
                    .await;
                continue;
            }

            // URL-allowlist gate (§4.5): a navigation-level check
            // separate from the keyword/secret rules above, applied to
            // any link the action is about to follow.
            if let Some(href) = target_region.and_then(|r| r.href.as_deref()) {
                if !url_allowed(href, &ctx.guardrail_config.allowed_domains) {
                    return AgentLoopResult {
                        completed: false,
                        reason: format!("navigation to '{href}' is outside the allowed domains"),
                        pending_action: Some(decision.action),
                        pause_kind: Some(PauseKind::Confirm),
                    };
                }
            }

            // 7. ACT.
            let before = StateSnapshot::capture(ctx.toolkit).await;
            let act_started = std::time::Instant::now();
            let act_result = Self::act(ctx.toolkit, &scanner, &decision.action).await;
            crate::metrics::observe_execution_step(
                decision.action.tag(),
                if act_result.is_ok() { "ok" } else { "error" },
                0,
                act_started.elapsed().as_millis() as u64,
                1,
            );
            ctx.channel
                .log(Phase::Act, decision.action.describe())
                .await;

            // 8. VERIFY.
            let (outcome, error) = match act_result {
                Ok(()) => {
                    let (outcome, message) = Verifier::verify(ctx.toolkit, before.clone()).await;
                    ctx.channel.log(Phase::Verify, message).await;
                    (outcome, None)
                }
                Err(err) => {
                    let after = StateSnapshot {
                        url: before.url.clone(),
                        title: before.title.clone(),
                        text: before.text.clone(),
                    };
                    ctx.channel
                        .log_error(Phase::Verify, "action raised an error", err.to_string())
                        .await;
                    (outcome_from_snapshots(before, after), Some(err.to_string()))
                }
            };

            Self::persist_step(ctx, *step_counter, &decision.action, outcome.state_changed(), error.as_deref()).await;

            state.history.push(HistoryEntry {
                step_number: *step_counter,
                action: decision.action,
                state_changed: outcome.state_changed(),
                error,
            });

            // update scroll geometry sample for gate (9.)
            if !state.scroll.bottom_reached {
                Self::sample_scroll_geometry(ctx.toolkit, &mut state.scroll).await;
            }
        }

        AgentLoopResult {
            completed: false,
            reason: format!("step cap exceeded after {} steps", ctx.step_cap),
            pending_action: None,
            pause_kind: None,
        }
    }

    fn terminal_result(action: &Action) -> Option<AgentLoopResult> {
        match action {
            Action::Done { reason } => Some(AgentLoopResult {
                completed: true,
                reason: reason.clone().unwrap_or_else(|| "objective satisfied".to_string()),
                pending_action: None,
                pause_kind: None,
            }),
            Action::AskUser { message, .. } => Some(AgentLoopResult {
                completed: false,
                reason: message.clone(),
                pending_action: Some(action.clone()),
                pause_kind: Some(PauseKind::AskUser),
            }),
            Action::Confirm { message, .. } => Some(AgentLoopResult {
                completed: false,
                reason: message.clone(),
                pending_action: Some(action.clone()),
                pause_kind: Some(PauseKind::Confirm),
            }),
            _ => None,
        }
    }

    /// Auto-recovery gate (§4.7 step 3): Enter-key on the filled region →
    /// click a search/submit-keyword button → ASK_USER pause.
    async fn auto_recovery(
        ctx: &AgentLoopContext<'_>,
        state: &mut AgentLoopState,
        regions: &[Region],
        _current_url: &str,
    ) -> Option<AgentLoopResult> {
        state.recovery_tries += 1;
        let last_region_id = state
            .history
            .last()
            .and_then(|e| e.action.region_id())
            .map(str::to_string);

        let before = StateSnapshot::capture(ctx.toolkit).await;

        match state.recovery_tries {
            1 => {
                if let Some(region_id) = last_region_id {
                    let selector = Scanner::selector_for(&region_id);
                    let _ = ctx
                        .toolkit
                        .evaluate(&format!(
                            "(function(){{const el=document.querySelector('{selector}'); if(el){{el.dispatchEvent(new KeyboardEvent('keydown',{{key:'Enter',bubbles:true}}));el.dispatchEvent(new KeyboardEvent('keyup',{{key:'Enter',bubbles:true}}));}}}})()"
                        ))
                        .await;
                }
            }
            2 => {
                let keyword_region = regions.iter().find(|r| {
                    let lower = r.label.to_lowercase();
                    lower.contains("search") || lower.contains("submit")
                });
                if let Some(region) = keyword_region {
                    let selector = Scanner::selector_for(&region.id);
                    let _ = ctx.toolkit.click(&selector, Duration::from_secs(3)).await;
                } else {
                    let _ = ctx
                        .toolkit
                        .evaluate(
                            "document.activeElement && document.activeElement.dispatchEvent(new KeyboardEvent('keydown', {key:'Enter', bubbles:true}))",
                        )
                        .await;
                }
            }
            _ => {
                return Some(AgentLoopResult {
                    completed: false,
                    reason: "fill did not change state after recovery attempts".to_string(),
                    pending_action: Some(Action::AskUser {
                        message: "The form did not respond after submitting. Please complete this step manually.".to_string(),
                        action_id: None,
                    }),
                    pause_kind: Some(PauseKind::AskUser),
                });
            }
        }

        ctx.toolkit.wait_stable().await;
        let (outcome, message) = Verifier::verify(ctx.toolkit, before).await;
        ctx.channel.log(Phase::Verify, format!("auto-recovery: {message}")).await;
        if outcome.state_changed() {
            state.recovery_tries = 0;
        }
        None
    }

    async fn auto_scroll_step(ctx: &AgentLoopContext<'_>, scroll: &mut ScrollBookkeeping) {
        let _ = ctx
            .toolkit
            .evaluate(&format!("window.scrollBy(0, {SCROLL_AMOUNT_PX})"))
            .await;
        ctx.toolkit.wait_stable().await;
        Self::sample_scroll_geometry(ctx.toolkit, scroll).await;
        scroll.count += 1;
    }

    /// Declares bottom-reached per §4.7 step 4's two conditions.
    async fn sample_scroll_geometry(toolkit: &Toolkit, scroll: &mut ScrollBookkeeping) {
        let script = "JSON.stringify({y: window.scrollY, h: document.documentElement.scrollHeight, v: window.innerHeight})";
        let Ok(value) = toolkit.evaluate(script).await else {
            return;
        };
        let Some(raw) = value.as_str() else { return };
        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) else {
            return;
        };
        let y = parsed.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let h = parsed.get("h").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let v = parsed.get("v").and_then(|v| v.as_f64()).unwrap_or(0.0);

        let scrollable = h > v + 10.0;
        let unchanged = (y - scroll.last_scroll_y).abs() < 1.0 && (h - scroll.last_scroll_height).abs() < 1.0;
        let at_bottom = y + v >= h - 5.0;

        if (unchanged && scrollable) || at_bottom {
            scroll.bottom_reached = true;
        }

        scroll.last_scroll_y = y;
        scroll.last_scroll_height = h;
    }

    /// Records the step row and a best-effort screenshot artifact (§6).
    /// Failures here never interrupt the objective — persistence is
    /// observability, not control flow.
    async fn persist_step(
        ctx: &AgentLoopContext<'_>,
        step_number: u64,
        action: &Action,
        state_changed: bool,
        error: Option<&str>,
    ) {
        let action_type = action.describe();
        let action_json = serde_json::to_string(action).ok();
        if let Err(err) = ctx.db.record_step(
            ctx.session_id,
            step_number,
            "ACT",
            Some(action_type.as_str()),
            action_json.as_deref(),
            Some(&state_changed.to_string()),
            error,
        ) {
            ctx.channel
                .log_error(Phase::Act, "failed to persist step", err.to_string())
                .await;
        }

        if let Ok(bytes) = ctx.toolkit.screenshot(Duration::from_secs(5)).await {
            let relative = screenshot_artifact_path(ctx.session_id, step_number);
            let full_path = ctx.artifacts_dir.join(&relative);
            if let Some(parent) = full_path.parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            if tokio::fs::write(&full_path, &bytes).await.is_ok() {
                let _ = ctx.db.record_artifact(ctx.session_id, step_number, &relative, "screenshot");
                ctx.channel.screenshot(step_number, format!("/artifacts/{relative}")).await;
            }
        }
    }

    async fn act(toolkit: &Toolkit, _scanner: &Scanner<'_>, action: &Action) -> SoulResult<()> {
        let timeout = Duration::from_secs(10);
        match action {
            Action::VisionClick { region_id, .. } | Action::DomClick { region_id: Some(region_id), .. } => {
                toolkit
                    .click(&Scanner::selector_for(region_id), timeout)
                    .await
                    .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string()))
            }
            Action::DomClick { selector: Some(selector), .. } => toolkit
                .click(selector, timeout)
                .await
                .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string())),
            Action::DomClick { .. } => Err(SoulBrowserError::validation_error(
                "DOM_CLICK requires regionId or selector",
                "missing target",
            )),
            Action::VisionFill { region_id, value, .. } | Action::DomFill { region_id: Some(region_id), value, .. } => {
                toolkit
                    .type_text(&Scanner::selector_for(region_id), value, timeout)
                    .await
                    .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string()))
            }
            Action::DomFill { selector: Some(selector), value, .. } => toolkit
                .type_text(selector, value, timeout)
                .await
                .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string())),
            Action::DomFill { .. } => Err(SoulBrowserError::validation_error(
                "DOM_FILL requires regionId or selector",
                "missing target",
            )),
            Action::KeyPress { key, region_id, .. } => {
                let script = if let Some(region_id) = region_id {
                    format!(
                        "(function(){{const el=document.querySelector('{}'); if(el){{el.dispatchEvent(new KeyboardEvent('keydown',{{key:'{key}',bubbles:true}}));}}}})()",
                        Scanner::selector_for(region_id)
                    )
                } else {
                    format!(
                        "document.activeElement && document.activeElement.dispatchEvent(new KeyboardEvent('keydown', {{key:'{key}', bubbles:true}}))"
                    )
                };
                toolkit
                    .evaluate(&script)
                    .await
                    .map(|_| ())
                    .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string()))
            }
            Action::Scroll { direction, amount } => {
                let px = amount.unwrap_or(crate::action::DEFAULT_SCROLL_AMOUNT) as i64;
                let signed = if matches!(direction, ScrollDirection::Up) { -px } else { px };
                toolkit
                    .evaluate(&format!("window.scrollBy(0, {signed})"))
                    .await
                    .map(|_| ())
                    .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string()))
            }
            Action::Wait { duration, until } => {
                if let Some(until) = until {
                    let gate = match until {
                        crate::action::WaitUntil::Load => "load",
                        crate::action::WaitUntil::DomContentLoaded => "domcontentloaded",
                        crate::action::WaitUntil::NetworkIdle => "networkidle",
                    };
                    toolkit
                        .wait_basic(gate, Duration::from_millis(duration.unwrap_or(3000)))
                        .await
                        .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string()))
                } else {
                    tokio::time::sleep(Duration::from_millis(duration.unwrap_or(1000))).await;
                    Ok(())
                }
            }
            Action::AskUser { .. } | Action::Confirm { .. } | Action::Done { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_result_maps_done() {
        let result = AgentLoop::terminal_result(&Action::Done { reason: Some("ok".into()) })
            .expect("terminal");
        assert!(result.completed);
    }

    #[test]
    fn terminal_result_maps_ask_user_as_pause() {
        let result = AgentLoop::terminal_result(&Action::AskUser {
            message: "need login".into(),
            action_id: None,
        })
        .expect("terminal");
        assert!(!result.completed);
        assert_eq!(result.pause_kind, Some(PauseKind::AskUser));
    }

    #[test]
    fn non_terminal_action_returns_none() {
        assert!(AgentLoop::terminal_result(&Action::Scroll {
            direction: ScrollDirection::Down,
            amount: None
        })
        .is_none());
    }
}
