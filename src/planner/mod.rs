//! Planner (§4.2): turns a task into an ordered plan of objectives,
//! optionally preceded by the scout's live URL-verification search.
#![allow(dead_code)]

pub mod scout;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::{extract_first_json_object, CompletionOptions, LlmClient};
use scout::VerifiedUrls;

pub const MAX_STEPS: usize = 15;

/// Cap on the heuristic fallback's naive split (§4.2: "up to 10
/// objectives") — tighter than [`MAX_STEPS`], which bounds a real plan.
const HEURISTIC_MAX_STEPS: usize = 10;

/// Emits planning-phase log lines to the client channel. Implemented by
/// the session orchestrator's channel adapter; a no-op implementation is
/// used in tests.
pub trait PlanningLogger: Send + Sync {
    fn log(&self, message: &str);
}

pub struct NullLogger;

impl PlanningLogger for NullLogger {
    fn log(&self, _message: &str) {}
}

/// A stable integer id, title, detailed description, auth requirement,
/// and optional scout-verified target URL. At most [`MAX_STEPS`] steps
/// per plan.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: u32,
    pub title: String,
    pub description: String,
    #[serde(default, rename = "needsAuth")]
    pub needs_auth: bool,
    #[serde(default, rename = "targetUrl")]
    pub target_url: Option<String>,
}

/// A high-level strategy string plus an ordered sequence of [`Step`]s.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub strategy: String,
    #[serde(rename = "needsSynthesis")]
    pub needs_synthesis: bool,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Strategy: {}", self.strategy)];
        for step in &self.steps {
            lines.push(format!(
                "{}. {} ({}){}",
                step.id,
                step.title,
                step.description,
                if step.needs_auth { " [needs human]" } else { "" }
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    strategy: String,
    #[serde(default, rename = "needsSynthesis")]
    needs_synthesis: bool,
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "needsAuth")]
    needs_auth: bool,
    #[serde(default, rename = "targetUrl")]
    target_url: Option<String>,
}

const PLANNER_SYSTEM_PROMPT: &str = "You are a browser-automation task planner. Classify the \
task as simple-action, deep-research, or transactional. Produce at most 15 granular, atomic \
steps. A search-results page is never the final answer for research tasks. Set needsAuth=true \
only for steps that require human login/MFA. Set targetUrl ONLY from the verified URL context \
provided below — never invent one. Respond with ONLY a JSON object of the shape \
{\"strategy\": string, \"needsSynthesis\": bool, \"steps\": [{\"title\": string, \
\"description\": string, \"needsAuth\": bool, \"targetUrl\": string|null}]}.";

const LOGIN_KEYWORDS: &[&str] = &["login", "log in", "sign in", "mfa", "authenticate", "password"];

pub struct Planner<'a> {
    llm: &'a dyn LlmClient,
    logger: &'a dyn PlanningLogger,
}

impl<'a> Planner<'a> {
    pub fn new(llm: &'a dyn LlmClient, logger: &'a dyn PlanningLogger) -> Self {
        Self { llm, logger }
    }

    /// `plan(task) → { strategy, needsSynthesis, steps[] }`.
    pub async fn plan(&self, task: &str, verified: &VerifiedUrls) -> Plan {
        self.logger.log("planning: requesting plan from LLM");

        let context = if verified.links.is_empty() {
            "No verified URLs available; do not set targetUrl.".to_string()
        } else {
            format!(
                "Verified URL candidates (query: {}): {}",
                verified.query.clone().unwrap_or_default(),
                verified.links.join(", ")
            )
        };

        let user_prompt = format!("Task: {task}\n\n{context}");

        match self
            .llm
            .complete(PLANNER_SYSTEM_PROMPT, &user_prompt, CompletionOptions::default())
            .await
        {
            Ok(response) => match parse_plan_response(&response) {
                Some(plan) => plan,
                None => {
                    self.logger
                        .log("planning: LLM response failed schema validation, using heuristic fallback");
                    heuristic_plan(task)
                }
            },
            Err(err) => {
                self.logger
                    .log(&format!("planning: LLM call failed ({err}), using heuristic fallback"));
                heuristic_plan(task)
            }
        }
    }
}

fn parse_plan_response(response: &str) -> Option<Plan> {
    let json_span = extract_first_json_object(response)?;
    let raw: RawPlan = serde_json::from_str(json_span).ok()?;
    if raw.steps.is_empty() {
        return None;
    }
    Some(build_plan(raw.strategy, raw.needs_synthesis, raw.steps.into_iter()))
}

fn build_plan(
    strategy: String,
    needs_synthesis: bool,
    steps: impl Iterator<Item = RawStep>,
) -> Plan {
    let steps: Vec<Step> = steps
        .take(MAX_STEPS)
        .enumerate()
        .map(|(idx, raw)| Step {
            id: idx as u32 + 1,
            title: raw.title,
            description: raw.description,
            needs_auth: raw.needs_auth,
            target_url: raw.target_url,
        })
        .collect();
    Plan {
        strategy,
        needs_synthesis,
        steps,
    }
}

/// Heuristic fallback (§4.2): splits on `"then" | "," | "."` into up to
/// [`HEURISTIC_MAX_STEPS`] objectives, `needsAuth` set by a simple
/// login-keyword regex, `needsSynthesis` false.
fn heuristic_plan(task: &str) -> Plan {
    let splitter = Regex::new(r"(?i)\bthen\b|,|\.").expect("static regex compiles");
    let steps: Vec<Step> = splitter
        .split(task)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(HEURISTIC_MAX_STEPS)
        .enumerate()
        .map(|(idx, title)| {
            let lower = title.to_lowercase();
            Step {
                id: idx as u32 + 1,
                title: title.to_string(),
                description: title.to_string(),
                needs_auth: LOGIN_KEYWORDS.iter().any(|kw| lower.contains(kw)),
                target_url: None,
            }
        })
        .collect();

    let steps = if steps.is_empty() {
        vec![Step {
            id: 1,
            title: task.trim().to_string(),
            description: task.trim().to_string(),
            needs_auth: false,
            target_url: None,
        }]
    } else {
        steps
    };

    Plan {
        strategy: format!("Heuristic decomposition of: {task}"),
        needs_synthesis: false,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_splits_on_then_and_punctuation() {
        let plan = heuristic_plan("Search for hello, then click the first result.");
        assert!(plan.steps.len() >= 2);
        assert!(!plan.needs_synthesis);
    }

    #[test]
    fn heuristic_flags_login_steps() {
        let plan = heuristic_plan("Log in to the portal then check grades");
        assert!(plan.steps[0].needs_auth);
    }

    #[test]
    fn heuristic_caps_at_max_steps() {
        let many = (0..30).map(|i| format!("step{i}")).collect::<Vec<_>>().join(", ");
        let plan = heuristic_plan(&many);
        assert!(plan.steps.len() <= MAX_STEPS);
    }

    #[test]
    fn parses_fenced_plan_response() {
        let response = "```json\n{\"strategy\":\"s\",\"needsSynthesis\":true,\"steps\":[{\"title\":\"t\",\"description\":\"d\",\"needsAuth\":false,\"targetUrl\":null}]}\n```";
        let plan = parse_plan_response(response).expect("plan parses");
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.needs_synthesis);
    }
}
