//! Short-term history store (§2 component 5 / §3): the last N actions for
//! the current session, injected into decision prompts. Backed by the
//! `steps` table (§6); the in-memory ring mirrors the bounded query
//! `SELECT ... FROM steps WHERE sessionId=? ORDER BY stepNumber DESC LIMIT 5`
//! so the agent loop doesn't round-trip the database every iteration.
#![allow(dead_code)]

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::action::Action;

pub const HISTORY_WINDOW: usize = 5;

/// `{ stepNumber, actionType, actionData, error? }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step_number: u64,
    pub action: Action,
    pub state_changed: bool,
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn action_type(&self) -> &'static str {
        self.action.tag()
    }

    /// One line per entry, formatted for the decider's prompt.
    pub fn to_prompt_line(&self) -> String {
        let outcome = if let Some(err) = &self.error {
            format!("error: {err}")
        } else if self.state_changed {
            "state changed".to_string()
        } else {
            "no-op".to_string()
        };
        format!(
            "#{} {} {} -> {}",
            self.step_number,
            self.action_type(),
            self.action.describe(),
            outcome
        )
    }
}

/// Bounded ring of the last [`HISTORY_WINDOW`] actions for a session.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > HISTORY_WINDOW {
            self.entries.pop_front();
        }
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn recent(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_prompt_block(&self) -> String {
        if self.entries.is_empty() {
            return "(no prior actions this session)".to_string();
        }
        self.entries
            .iter()
            .map(HistoryEntry::to_prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if the last action was a fill whose outcome did not change
    /// observable state — the trigger condition for the auto-recovery
    /// gate (§4.7 step 3).
    pub fn last_was_stale_fill(&self) -> bool {
        matches!(
            self.last(),
            Some(entry) if entry.action.is_fill() && !entry.state_changed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64, changed: bool) -> HistoryEntry {
        HistoryEntry {
            step_number: n,
            action: Action::Wait { duration: Some(100), until: None },
            state_changed: changed,
            error: None,
        }
    }

    #[test]
    fn bounded_to_window() {
        let mut store = HistoryStore::new();
        for i in 0..10 {
            store.push(entry(i, true));
        }
        assert_eq!(store.recent().count(), HISTORY_WINDOW);
        assert_eq!(store.last().unwrap().step_number, 9);
    }

    #[test]
    fn detects_stale_fill() {
        let mut store = HistoryStore::new();
        store.push(HistoryEntry {
            step_number: 1,
            action: Action::DomFill {
                region_id: Some("element-1".into()),
                role: None,
                name: None,
                selector: None,
                value: "hello".into(),
                description: None,
            },
            state_changed: false,
            error: None,
        });
        assert!(store.last_was_stale_fill());
    }
}
