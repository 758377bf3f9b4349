//! Verifier (§4.6): a post-action sanity check that produces a
//! human-readable description of what changed. Does not gate
//! continuation — [`Outcome::state_changed`] captured by the agent loop
//! is the true signal downstream components act on.

use serde::{Deserialize, Serialize};

use crate::toolkit::Toolkit;

const TEXT_SNAPSHOT_CHARS: usize = 400;

/// Collapse whitespace runs into single spaces, matching spec.md §3's
/// "normalized textBefore/After (lowercased, whitespace-collapsed)".
fn normalize_whitespace(input: &str) -> String {
    input
        .split_whitespace()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Captured before and after each action. `state_changed` is derived, not
/// stored independently, so it can never drift from its three inputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outcome {
    pub url_before: String,
    pub url_after: String,
    pub title_before: String,
    pub title_after: String,
    pub text_before: String,
    pub text_after: String,
}

impl Outcome {
    pub fn state_changed(&self) -> bool {
        self.url_before != self.url_after
            || self.title_before != self.title_after
            || self.text_before != self.text_after
    }
}

/// Snapshot of the three fields `Outcome` compares, taken once before and
/// once after an action.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    pub url: String,
    pub title: String,
    pub text: String,
}

impl StateSnapshot {
    pub async fn capture(toolkit: &Toolkit) -> Self {
        let url = toolkit.current_url().await;
        let title = toolkit.current_title().await;
        let text = normalize_snapshot_text(&toolkit.visible_text(TEXT_SNAPSHOT_CHARS).await);
        Self { url, title, text }
    }
}

fn normalize_snapshot_text(raw: &str) -> String {
    let collapsed = normalize_whitespace(raw).to_lowercase();
    collapsed.chars().take(TEXT_SNAPSHOT_CHARS).collect()
}

pub fn outcome_from_snapshots(before: StateSnapshot, after: StateSnapshot) -> Outcome {
    Outcome {
        url_before: before.url,
        url_after: after.url,
        title_before: before.title,
        title_after: after.title,
        text_before: before.text,
        text_after: after.text,
    }
}

pub struct Verifier;

impl Verifier {
    /// Captures the post-action snapshot and describes what happened in
    /// plain language. Wrapped by the caller in a try/catch-equivalent:
    /// navigation triggered by the action just executed may have
    /// destroyed the execution context mid-read, which is treated as
    /// "proceed, next OBSERVE will re-read state" rather than an error.
    pub async fn verify(toolkit: &Toolkit, before: StateSnapshot) -> (Outcome, String) {
        let after = StateSnapshot::capture(toolkit).await;
        let outcome = outcome_from_snapshots(before, after);
        let message = Self::describe(&outcome);
        (outcome, message)
    }

    fn describe(outcome: &Outcome) -> String {
        if outcome.url_before != outcome.url_after {
            format!(
                "navigated from {} to {}",
                outcome.url_before, outcome.url_after
            )
        } else if outcome.title_before != outcome.title_after {
            format!(
                "title changed from \"{}\" to \"{}\"",
                outcome.title_before, outcome.title_after
            )
        } else if outcome.text_before != outcome.text_after {
            "visible page text changed".to_string()
        } else {
            "no observable change".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changed_true_on_url_diff() {
        let outcome = Outcome {
            url_before: "https://example.com/".into(),
            url_after: "https://example.com/a".into(),
            title_before: "Home".into(),
            title_after: "Home".into(),
            text_before: "hello".into(),
            text_after: "hello".into(),
        };
        assert!(outcome.state_changed());
    }

    #[test]
    fn state_unchanged_when_all_equal() {
        let outcome = Outcome {
            url_before: "https://example.com/".into(),
            url_after: "https://example.com/".into(),
            title_before: "Home".into(),
            title_after: "Home".into(),
            text_before: "hello".into(),
            text_after: "hello".into(),
        };
        assert!(!outcome.state_changed());
    }

    #[test]
    fn describe_prefers_navigation() {
        let outcome = Outcome {
            url_before: "https://example.com/".into(),
            url_after: "https://example.com/a".into(),
            title_before: "Home".into(),
            title_after: "A".into(),
            text_before: "x".into(),
            text_after: "y".into(),
        };
        assert!(Verifier::describe(&outcome).starts_with("navigated"));
    }
}
