//! Session data model (§3): one per task, created when a task arrives and
//! destroyed only on an explicit `stop` — never on completion, so the user
//! can inspect the browser afterwards.
#![allow(dead_code)]

use crate::action::Action;
use crate::agent_loop::AgentLoopState;
use crate::channel::ClientChannel;
use crate::planner::{Plan, Step};
use crate::synthesizer::ResearchNote;

/// Whether a paused session awaits manual user action or approval of a
/// proposed action (§3, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseKind {
    AskUser,
    Confirm,
}

/// One per task. The original task text is read-only after creation (I5).
pub struct Session {
    pub id: String,
    /// Preserved verbatim so multilingual prompts survive (§3).
    pub task: String,
    pub plan: Option<Plan>,
    pub plan_index: usize,
    pub completed_objectives: Vec<String>,
    pub research_notes: Vec<ResearchNote>,
    pub paused: bool,
    pub pending_action: Option<Action>,
    pub pause_kind: Option<PauseKind>,
    /// Set when the current step is human-owned (`needsAuth=true`); holds
    /// the step the user must complete manually.
    pub paused_for_human_objective: Option<Step>,
    pub needs_synthesis: bool,
    pub step_counter: u64,
    pub channel: Option<ClientChannel>,
    /// Per-objective agent-loop bookkeeping, preserved across a pause so
    /// resume can continue the graduated retry counter and scroll state.
    pub agent_state: AgentLoopState,
}

impl Session {
    pub fn new(id: impl Into<String>, task: impl Into<String>, channel: Option<ClientChannel>) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            plan: None,
            plan_index: 0,
            completed_objectives: Vec::new(),
            research_notes: Vec::new(),
            paused: false,
            pending_action: None,
            pause_kind: None,
            paused_for_human_objective: None,
            needs_synthesis: false,
            step_counter: 0,
            channel,
            agent_state: AgentLoopState::default(),
        }
    }

    /// (I2) `planIndex <= len(plan)`.
    pub fn plan_index_in_bounds(&self) -> bool {
        match &self.plan {
            Some(plan) => self.plan_index <= plan.steps.len(),
            None => self.plan_index == 0,
        }
    }

    /// (I3) a session in `paused` state always has either a pending action
    /// or a paused-for-human-objective marker.
    pub fn pause_invariant_holds(&self) -> bool {
        !self.paused || self.pending_action.is_some() || self.paused_for_human_objective.is_some()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.plan.as_ref().and_then(|p| p.steps.get(self.plan_index))
    }

    pub fn plan_len(&self) -> usize {
        self.plan.as_ref().map(|p| p.steps.len()).unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.plan.is_some() && self.plan_index >= self.plan_len()
    }

    pub fn mark_paused(&mut self, kind: PauseKind, pending: Option<Action>, human_step: Option<Step>) {
        self.paused = true;
        self.pause_kind = Some(kind);
        self.pending_action = pending;
        self.paused_for_human_objective = human_step;
    }

    pub fn clear_pause(&mut self) {
        self.paused = false;
        self.pause_kind = None;
        self.pending_action = None;
        self.paused_for_human_objective = None;
    }

    pub fn advance_plan(&mut self, objective_title: impl Into<String>) {
        self.completed_objectives.push(objective_title.into());
        self.plan_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_satisfies_invariants() {
        let session = Session::new("s1", "do the thing", None);
        assert!(session.plan_index_in_bounds());
        assert!(session.pause_invariant_holds());
        assert!(!session.is_finished());
    }

    #[test]
    fn paused_without_pending_or_human_step_violates_invariant() {
        let mut session = Session::new("s1", "task", None);
        session.paused = true;
        assert!(!session.pause_invariant_holds());
        session.mark_paused(PauseKind::AskUser, None, None);
        // mark_paused with both None still violates; a real pause always
        // supplies one of the two.
        assert!(!session.pause_invariant_holds());
        session.pending_action = Some(Action::Done { reason: None });
        assert!(session.pause_invariant_holds());
    }

    #[test]
    fn advance_plan_records_title_and_increments_index() {
        let mut session = Session::new("s1", "task", None);
        session.advance_plan("step one");
        assert_eq!(session.plan_index, 1);
        assert_eq!(session.completed_objectives, vec!["step one".to_string()]);
    }
}
