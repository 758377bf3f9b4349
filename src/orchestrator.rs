//! Session orchestrator (§2 component 10 / §4.8): owns the full session
//! life cycle, plan traversal, fast-forward, pause/resume, and the
//! synthesis trigger. The "global mutable state" the design notes call
//! out (§9) is exactly the two fields below: the active-session map and
//! the database handle.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use cdp_adapter::{Cdp, CdpAdapter, CdpConfig, PageId};
use soulbrowser_policy_center::{url_allowed, GuardrailConfig};

use crate::action::Action;
use crate::agent_loop::{AgentLoop, AgentLoopContext, PauseKind as LoopPauseKind};
use crate::channel::{ChannelPlanningLogger, ClientChannel, Phase, SessionStatus};
use crate::config::RuntimeConfig;
use crate::db::Db;
use crate::errors::{SoulBrowserError, SoulResult};
use crate::llm::LlmClient;
use crate::planner::scout::Scout;
use crate::planner::{Planner, Step};
use crate::session::{PauseKind, Session};
use crate::synthesizer::{should_synthesize, ResearchNote, Synthesizer};
use crate::toolkit::Toolkit;

/// One running session: its data-model state plus the browser binding
/// that drives it. Re-bound to the newest tab at the top of every
/// traversal iteration (§4.8's "zombie-page fix").
struct SessionRuntime {
    session: Session,
    toolkit: Toolkit,
}

pub struct SessionOrchestrator {
    db: Arc<Db>,
    config: Arc<RuntimeConfig>,
    llm: Arc<dyn LlmClient>,
    active: DashMap<String, Arc<Mutex<SessionRuntime>>>,
}

impl SessionOrchestrator {
    pub fn new(db: Arc<Db>, config: Arc<RuntimeConfig>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            db,
            config,
            llm,
            active: DashMap::new(),
        }
    }

    /// `{ type:"task", data:{ task, sessionId? } }`: starts a new session,
    /// or (when `session_id` names a paused session) is treated as a
    /// no-op resume hint — resumption proper goes through
    /// [`Self::handle_confirmation`].
    pub async fn handle_task(
        &self,
        task: String,
        session_id: Option<String>,
        channel: Option<ClientChannel>,
    ) -> SoulResult<String> {
        if let Some(id) = session_id {
            if self.active.contains_key(&id) {
                return Ok(id);
            }
        }

        let channel = channel.unwrap_or_else(|| ClientChannel::new(uuid::Uuid::new_v4().to_string()));
        let id = channel.session_id().to_string();
        channel.status(SessionStatus::Started, None).await;

        let logger = ChannelPlanningLogger::new(&channel);

        // Scout preflight (§4.2) runs against its own visible auxiliary
        // browser, never the main session's — a fresh `CdpAdapter`
        // instance with its own profile, dropped once the scout is done.
        // Running it before the main browser launches also means it can
        // never be mistaken for the "newest page" the zombie-tab rebind
        // (§4.8) looks for on the main session.
        let verified = {
            let scout_cdp = launch_aux_browser().await?;
            let scout_page = scout_cdp.create_page("about:blank").await.map_err(|e| {
                SoulBrowserError::internal(format!("scout browser launch failed: {e}"))
            })?;
            let scout_cdp: Arc<dyn Cdp + Send + Sync> = scout_cdp;
            let scout = Scout::new(self.llm.as_ref(), scout_cdp.clone(), &logger);
            scout.run(&task, scout_page).await
        };

        let (cdp, page) = launch_browser(&self.config).await?;
        let toolkit = Toolkit::new(cdp.clone(), page);

        let planner = Planner::new(self.llm.as_ref(), &logger);
        let plan = planner.plan(&task, &verified).await;
        channel.log(Phase::Planning, plan.summary()).await;

        self.db.create_session(&id, &task, &self.config.start_url)?;

        let mut session = Session::new(id.clone(), task, Some(channel));
        session.needs_synthesis = plan.needs_synthesis;
        session.plan = Some(plan);

        let runtime = Arc::new(Mutex::new(SessionRuntime { session, toolkit }));
        self.active.insert(id.clone(), runtime.clone());

        self.run_traversal(&id, runtime, false).await;
        Ok(id)
    }

    /// `{ type:"stop", data:{ sessionId } }` (P6): removed from the active
    /// set within this call, closing the browser; no further events for
    /// this session are emitted afterward.
    pub async fn handle_stop(&self, session_id: &str) -> SoulResult<()> {
        if let Some((_, runtime)) = self.active.remove(session_id) {
            let runtime = runtime.lock().await;
            self.db.set_session_status(session_id, "stopped")?;
            if let Some(channel) = &runtime.session.channel {
                channel.status(SessionStatus::Stopped, None).await;
            }
        }
        Ok(())
    }

    /// `{ type:"confirmation", data:{ sessionId, approved, actionId? } }`.
    /// Rejection closes the browser and marks the session stopped (§7.6).
    /// Approval with a pending action executes it once, then resumes the
    /// agent loop with counters preserved; approval with no pending
    /// action is the human-owned-objective completion path (§4.8).
    pub async fn handle_confirmation(
        &self,
        session_id: &str,
        approved: bool,
        _action_id: Option<String>,
    ) -> SoulResult<()> {
        let Some(runtime) = self.active.get(session_id).map(|r| r.clone()) else {
            return Err(SoulBrowserError::not_found(format!("session {session_id}")));
        };

        if !approved {
            return self.handle_stop(session_id).await;
        }

        let (pending_action, human_step) = {
            let mut guard = runtime.lock().await;
            let pending_action = guard.session.pending_action.clone();
            let human_step = guard.session.paused_for_human_objective.clone();
            guard.session.clear_pause();
            (pending_action, human_step)
        };

        if let Some(action) = pending_action {
            let mut guard = runtime.lock().await;
            let _ = execute_confirmed_action(&guard.toolkit, &action).await;
            drop(guard);
        } else if human_step.is_some() {
            let mut guard = runtime.lock().await;
            let title = guard.session.current_step().map(|s| s.title.clone()).unwrap_or_default();
            guard.session.advance_plan(title);
            drop(guard);
        }

        self.run_traversal(session_id, runtime, true).await;
        Ok(())
    }

    /// The objective traversal loop (§4.8).
    async fn run_traversal(&self, session_id: &str, runtime: Arc<Mutex<SessionRuntime>>, mut resuming: bool) {
        loop {
            let mut guard = runtime.lock().await;

            if guard.session.is_finished() {
                drop(guard);
                self.finish_session(session_id, &runtime).await;
                return;
            }

            // Zombie-tab fix: re-bind to the newest tab before this
            // iteration's work begins.
            guard.toolkit.rebind_to_newest_tab().await;

            let step = match guard.session.current_step().cloned() {
                Some(step) => step,
                None => {
                    drop(guard);
                    self.finish_session(session_id, &runtime).await;
                    return;
                }
            };

            if step.needs_auth {
                guard.session.mark_paused(PauseKind::AskUser, None, Some(step.clone()));
                let _ = self.db.set_session_status(session_id, "paused");
                if let Some(channel) = guard.session.channel.clone() {
                    drop(guard);
                    channel
                        .paused(
                            crate::channel::PauseKind::AskUser,
                            Some(format!("{}: {}", step.title, step.description)),
                            None,
                        )
                        .await;
                }
                return;
            }

            if let Some(target_url) = step.target_url.clone() {
                if url_allowed(&target_url, &self.config.allowed_domains) {
                    let _ = guard.toolkit.navigate(&target_url, Duration::from_secs(10)).await;
                    guard.toolkit.wait_stable().await;
                } else if let Some(channel) = guard.session.channel.clone() {
                    channel
                        .log(
                            Phase::Decide,
                            format!("skipped navigation to '{target_url}': outside allowed domains"),
                        )
                        .await;
                }
            }

            let context_prompt = build_objective_prompt(&guard.session, &step);
            let guardrail_config = GuardrailConfig {
                allowed_domains: self.config.allowed_domains.clone(),
                sensitive_keywords: self.config.require_confirmation_keywords.clone(),
                ..GuardrailConfig::default()
            };

            guard.session.agent_state.reset_for_new_objective(resuming);
            resuming = false;

            let channel = guard
                .session
                .channel
                .clone()
                .unwrap_or_else(|| ClientChannel::new(session_id.to_string()));
            let mut step_counter = guard.session.step_counter;

            let result = {
                let ctx = AgentLoopContext {
                    toolkit: &guard.toolkit,
                    llm: self.llm.as_ref(),
                    channel: &channel,
                    db: self.db.as_ref(),
                    session_id,
                    artifacts_dir: &self.config.artifacts_dir,
                    guardrail_config: &guardrail_config,
                    step: &step,
                    context_prompt: &context_prompt,
                    step_cap: crate::agent_loop::DEFAULT_STEP_CAP,
                    scroll_cap: crate::agent_loop::DEFAULT_SCROLL_CAP,
                };
                AgentLoop::run_objective(&ctx, &mut guard.session.agent_state, &mut step_counter).await
            };
            guard.session.step_counter = step_counter;

            if result.completed {
                let page_text = guard.toolkit.visible_text(2000).await;
                if page_text.len() > 50 {
                    guard
                        .session
                        .research_notes
                        .push(ResearchNote::new(step.title.clone(), page_text));
                }
                guard.session.advance_plan(step.title.clone());
                channel.log(Phase::Navigate, format!("objective completed: {}", result.reason)).await;

                self.fast_forward(&mut guard).await;
                let _ = self.db.set_session_status(session_id, "running");
                drop(guard);
                continue;
            }

            match result.pause_kind {
                Some(LoopPauseKind::AskUser) => {
                    guard.session.mark_paused(PauseKind::AskUser, result.pending_action.clone(), None);
                    let _ = self.db.set_session_status(session_id, "paused");
                    drop(guard);
                    channel
                        .paused(crate::channel::PauseKind::AskUser, Some(result.reason), None)
                        .await;
                    return;
                }
                Some(LoopPauseKind::Confirm) => {
                    guard.session.mark_paused(PauseKind::Confirm, result.pending_action.clone(), None);
                    let _ = self.db.set_session_status(session_id, "paused");
                    let pending_json = result
                        .pending_action
                        .as_ref()
                        .and_then(|a| serde_json::to_value(a).ok());
                    drop(guard);
                    channel
                        .paused(crate::channel::PauseKind::Confirm, Some(result.reason), pending_json)
                        .await;
                    return;
                }
                None => {
                    // Step cap exceeded or another non-pause failure (§7.8).
                    let _ = self.db.set_session_status(session_id, "error");
                    drop(guard);
                    channel.error(result.reason).await;
                    channel.status(SessionStatus::Error, None).await;
                    return;
                }
            }
        }
    }

    /// Fast-forward (§4.8, P4): idempotent skip of steps the agent
    /// accomplished out of order, judged from the current URL.
    async fn fast_forward(&self, runtime: &mut SessionRuntime) {
        loop {
            let Some(next) = runtime.session.current_step().cloned() else {
                return;
            };
            let url = runtime.toolkit.current_url().await;
            if !step_likely_done(&next, &url) {
                return;
            }
            runtime.session.advance_plan(next.title.clone());
        }
    }

    async fn finish_session(&self, session_id: &str, runtime: &Arc<Mutex<SessionRuntime>>) {
        let mut guard = runtime.lock().await;
        let channel = guard.session.channel.clone();

        if should_synthesize(guard.session.needs_synthesis, &guard.session.research_notes) {
            if let Some(channel) = &channel {
                channel.log(Phase::Synthesis, "synthesizing research findings".to_string()).await;
            }
            let synthesizer = Synthesizer::new(self.llm.as_ref());
            let findings = synthesizer.synthesize(&guard.session.research_notes).await;
            if let Some(channel) = &channel {
                channel.log(Phase::Synthesis, findings).await;
            }
        }

        let _ = self.db.set_session_status(session_id, "completed");
        drop(guard);
        if let Some(channel) = channel {
            channel.status(SessionStatus::Completed, None).await;
        }
    }
}

async fn launch_browser(config: &RuntimeConfig) -> SoulResult<(Arc<dyn Cdp + Send + Sync>, PageId)> {
    let cfg = CdpConfig {
        headless: config.headless,
        ..CdpConfig::default()
    };
    let (bus, _rx) = cdp_adapter::event_bus(256);
    let adapter = Arc::new(CdpAdapter::new(cfg, bus));
    adapter
        .clone()
        .start()
        .await
        .map_err(|e| SoulBrowserError::internal(format!("browser launch failed: {e}")))?;
    let page = adapter
        .create_page(&config.start_url)
        .await
        .map_err(|e| SoulBrowserError::internal(format!("browser launch failed: {e}")))?;
    Ok((adapter as Arc<dyn Cdp + Send + Sync>, page))
}

/// The scout's auxiliary browser (§4.2): always visible (non-headless),
/// independent of the main session's adapter/profile regardless of the
/// `headless` config — the point is that a human can see and solve a
/// CAPTCHA on it.
async fn launch_aux_browser() -> SoulResult<Arc<CdpAdapter>> {
    let cfg = CdpConfig {
        headless: false,
        ..CdpConfig::default()
    };
    let (bus, _rx) = cdp_adapter::event_bus(256);
    let adapter = Arc::new(CdpAdapter::new(cfg, bus));
    adapter
        .clone()
        .start()
        .await
        .map_err(|e| SoulBrowserError::internal(format!("scout browser launch failed: {e}")))?;
    Ok(adapter)
}

async fn execute_confirmed_action(toolkit: &Toolkit, action: &Action) -> SoulResult<()> {
    let timeout = Duration::from_secs(10);
    match action {
        Action::VisionClick { region_id, .. } | Action::DomClick { region_id: Some(region_id), .. } => toolkit
            .click(&crate::scanner::Scanner::selector_for(region_id), timeout)
            .await
            .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string())),
        Action::VisionFill { region_id, value, .. } | Action::DomFill { region_id: Some(region_id), value, .. } => toolkit
            .type_text(&crate::scanner::Scanner::selector_for(region_id), value, timeout)
            .await
            .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string())),
        _ => Ok(()),
    }
}

/// Objective prompt (§4.8): original task, strategy, current step's
/// title/description/targetUrl, full-plan listing, last 3000 chars of
/// accumulated research notes.
fn build_objective_prompt(session: &Session, step: &Step) -> String {
    let plan_summary = session
        .plan
        .as_ref()
        .map(|p| p.summary())
        .unwrap_or_default();
    let notes = session
        .research_notes
        .iter()
        .map(|n| format!("[{}] {}", n.source_step_title, n.text_snippet))
        .collect::<Vec<_>>()
        .join("\n");
    let notes_tail: String = notes.chars().rev().take(3000).collect::<Vec<_>>().into_iter().rev().collect();

    format!(
        "Original task: {}\n\nPlan:\n{plan_summary}\n\nCurrent step: {} - {}{}\n\nAccumulated research notes:\n{notes_tail}",
        session.task,
        step.title,
        step.description,
        step.target_url
            .as_ref()
            .map(|u| format!(" (target: {u})"))
            .unwrap_or_default(),
    )
}

/// "Step likely done" rules (§4.8): navigate→host match; search/type/
/// initiate→URL shows search/results markers; click-detail→URL shows
/// deep-page markers.
fn step_likely_done(step: &Step, current_url: &str) -> bool {
    let title = step.title.to_lowercase();
    let url = current_url.to_lowercase();

    if title.contains("navigate") || title.contains("go to") || title.contains("visit") {
        if let Some(target) = &step.target_url {
            if let (Ok(target_url), Ok(current)) = (url::Url::parse(target), url::Url::parse(current_url)) {
                return target_url.host_str() == current.host_str();
            }
        }
    }

    if title.contains("search") || title.contains("type") || title.contains("initiate") {
        return url.contains("search") || url.contains("results") || url.contains("?q=") || url.contains("query=");
    }

    if title.contains("click") || title.contains("detail") || title.contains("open") {
        const DEEP_PAGE_MARKERS: &[&str] = &["watch?v=", "/in/", "/video/"];
        return DEEP_PAGE_MARKERS.iter().any(|m| url.contains(m));
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Step;

    fn step(title: &str) -> Step {
        Step {
            id: 1,
            title: title.to_string(),
            description: String::new(),
            needs_auth: false,
            target_url: None,
        }
    }

    #[test]
    fn search_step_done_when_results_markers_present() {
        assert!(step_likely_done(&step("Search for monitors"), "https://example.com/search?q=monitors"));
        assert!(!step_likely_done(&step("Search for monitors"), "https://example.com/"));
    }

    #[test]
    fn click_detail_step_done_on_deep_page_marker() {
        assert!(step_likely_done(&step("Click the first video result"), "https://youtube.com/watch?v=abc"));
    }

    #[test]
    fn fast_forward_is_idempotent_given_same_url() {
        // (P4) re-checking the same finished step never advances further
        // than a single pass: once it's no longer the "current" step,
        // `step_likely_done` is never consulted again for it.
        let s = step("Search for monitors");
        let url = "https://example.com/search?q=monitors";
        assert!(step_likely_done(&s, url));
        assert!(step_likely_done(&s, url));
    }
}
