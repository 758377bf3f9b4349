//! Action schema: the tagged union of agent actions, plus the `Decision`
//! envelope the decider returns around one.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// A single proposed action. Dispatch is by tag; no runtime reflection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Action {
    #[serde(rename = "VISION_CLICK")]
    VisionClick {
        region_id: String,
        description: Option<String>,
    },
    #[serde(rename = "DOM_CLICK")]
    DomClick {
        #[serde(default)]
        region_id: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        selector: Option<String>,
        description: Option<String>,
    },
    #[serde(rename = "VISION_FILL")]
    VisionFill {
        region_id: String,
        value: String,
        description: Option<String>,
    },
    #[serde(rename = "DOM_FILL")]
    DomFill {
        #[serde(default)]
        region_id: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        selector: Option<String>,
        value: String,
        description: Option<String>,
    },
    #[serde(rename = "KEY_PRESS")]
    KeyPress {
        key: String,
        #[serde(default)]
        region_id: Option<String>,
        description: Option<String>,
    },
    #[serde(rename = "SCROLL")]
    Scroll {
        direction: ScrollDirection,
        #[serde(default)]
        amount: Option<u32>,
    },
    #[serde(rename = "WAIT")]
    Wait {
        #[serde(default)]
        duration: Option<u64>,
        #[serde(default)]
        until: Option<WaitUntil>,
    },
    #[serde(rename = "ASK_USER")]
    AskUser {
        message: String,
        #[serde(default)]
        action_id: Option<String>,
    },
    #[serde(rename = "CONFIRM")]
    Confirm {
        message: String,
        #[serde(default)]
        action_id: Option<String>,
    },
    #[serde(rename = "DONE")]
    Done {
        #[serde(default)]
        reason: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

pub const DEFAULT_SCROLL_AMOUNT: u32 = 600;

impl Action {
    /// True for the three actions the agent loop treats as terminal:
    /// they exit the per-objective loop with a pause kind or completion.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Done { .. } | Action::AskUser { .. } | Action::Confirm { .. })
    }

    /// The region this action targets, if any (used by the guardrail gate
    /// to look up the region's label).
    pub fn region_id(&self) -> Option<&str> {
        match self {
            Action::VisionClick { region_id, .. } => Some(region_id),
            Action::DomClick { region_id, .. } => region_id.as_deref(),
            Action::VisionFill { region_id, .. } => Some(region_id),
            Action::DomFill { region_id, .. } => region_id.as_deref(),
            Action::KeyPress { region_id, .. } => region_id.as_deref(),
            _ => None,
        }
    }

    /// The literal value this action would type, if any (used by the
    /// guardrail gate's secret-marker check).
    pub fn fill_value(&self) -> Option<&str> {
        match self {
            Action::VisionFill { value, .. } | Action::DomFill { value, .. } => Some(value),
            _ => None,
        }
    }

    /// True if this is a fill action (used by the auto-recovery gate to
    /// decide whether a no-op outcome should trigger Enter-key injection).
    pub fn is_fill(&self) -> bool {
        matches!(self, Action::VisionFill { .. } | Action::DomFill { .. })
    }

    /// The wire-format tag for this action, e.g. `"VISION_CLICK"`.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::VisionClick { .. } => "VISION_CLICK",
            Action::DomClick { .. } => "DOM_CLICK",
            Action::VisionFill { .. } => "VISION_FILL",
            Action::DomFill { .. } => "DOM_FILL",
            Action::KeyPress { .. } => "KEY_PRESS",
            Action::Scroll { .. } => "SCROLL",
            Action::Wait { .. } => "WAIT",
            Action::AskUser { .. } => "ASK_USER",
            Action::Confirm { .. } => "CONFIRM",
            Action::Done { .. } => "DONE",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Action::VisionClick { description, region_id } => description
                .clone()
                .unwrap_or_else(|| format!("click {region_id}")),
            Action::DomClick { description, region_id, selector, .. } => description
                .clone()
                .or_else(|| region_id.clone())
                .or_else(|| selector.clone())
                .unwrap_or_else(|| "dom click".to_string()),
            Action::VisionFill { description, region_id, .. } => description
                .clone()
                .unwrap_or_else(|| format!("fill {region_id}")),
            Action::DomFill { description, region_id, .. } => description
                .clone()
                .or_else(|| region_id.clone())
                .unwrap_or_else(|| "dom fill".to_string()),
            Action::KeyPress { key, .. } => format!("press {key}"),
            Action::Scroll { direction, .. } => format!("scroll {direction:?}"),
            Action::Wait { .. } => "wait".to_string(),
            Action::AskUser { message, .. } => format!("ask user: {message}"),
            Action::Confirm { message, .. } => format!("confirm: {message}"),
            Action::Done { reason } => reason.clone().unwrap_or_else(|| "done".to_string()),
        }
    }
}

/// `{ action, reasoning, confidence }` — what the decider returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    #[serde(default = "default_reasoning")]
    pub reasoning: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_reasoning() -> String {
    "no reasoning provided".to_string()
}

fn default_confidence() -> f32 {
    0.5
}

impl Decision {
    /// Parses a decision from a raw LLM response, auto-patching the two
    /// known-optional fields (`confidence`, `reasoning`) per spec.
    pub fn from_json_patched(mut value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if let Some(obj) = value.as_object_mut() {
            obj.entry("confidence").or_insert_with(|| serde_json::json!(0.5));
            obj.entry("reasoning")
                .or_insert_with(|| serde_json::json!("no reasoning provided"));
        }
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_actions() {
        assert!(Action::Done { reason: None }.is_terminal());
        assert!(Action::AskUser { message: "x".into(), action_id: None }.is_terminal());
        assert!(!Action::Scroll { direction: ScrollDirection::Down, amount: None }.is_terminal());
    }

    #[test]
    fn decision_patches_missing_optional_fields() {
        let raw = serde_json::json!({
            "action": { "type": "DONE", "data": {} }
        });
        let decision = Decision::from_json_patched(raw).expect("patched decision parses");
        assert_eq!(decision.confidence, 0.5);
        assert_eq!(decision.reasoning, "no reasoning provided");
    }

    #[test]
    fn fill_value_extracted_for_guardrail() {
        let action = Action::DomFill {
            region_id: Some("element-abc12345".into()),
            role: None,
            name: None,
            selector: None,
            value: "SECRET.token".into(),
            description: None,
        };
        assert_eq!(action.fill_value(), Some("SECRET.token"));
        assert!(action.is_fill());
    }
}
