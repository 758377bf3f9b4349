//! Semantic visibility check (§4.4): a dedicated, cheaper LLM gate asked
//! only whether the current page already shows content relevant to the
//! step's objective.
#![allow(dead_code)]

use crate::llm::{CompletionOptions, LlmClient};
use crate::planner::Step;

const VISIBILITY_SYSTEM_PROMPT: &str = "Does the current page already show content, navigation, \
or links semantically relevant to the objective below? Accept synonyms (Dining <-> Food, \
Catalog <-> Classes) and treat navigation leading toward the target as relevant. Answer with \
exactly one word: YES or NO.";

/// `visible(taskStep, visibleText, elementLabels) → bool`. On any
/// failure, returns `true` (i.e. don't auto-scroll; let the decider
/// handle it).
pub async fn visible(llm: &dyn LlmClient, step: &Step, visible_text: &str, element_labels: &[String]) -> bool {
    let prompt = format!(
        "Objective: {} - {}\n\nVisible text:\n{}\n\nElement labels:\n{}",
        step.title,
        step.description,
        visible_text,
        element_labels.join(", ")
    );

    match llm
        .complete(VISIBILITY_SYSTEM_PROMPT, &prompt, CompletionOptions::cheap_gate())
        .await
    {
        Ok(response) => response.trim().to_uppercase().starts_with("YES"),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn step() -> Step {
        Step {
            id: 1,
            title: "Find dining hours".into(),
            description: "Locate the dining hall hours page".into(),
            needs_auth: false,
            target_url: None,
        }
    }

    #[tokio::test]
    async fn returns_true_when_llm_says_yes() {
        let llm = MockLlmClient::new(vec!["YES"]);
        assert!(visible(&llm, &step(), "Food court hours: 9-5", &[]).await);
    }

    #[tokio::test]
    async fn returns_false_when_llm_says_no() {
        let llm = MockLlmClient::new(vec!["NO"]);
        assert!(!visible(&llm, &step(), "Unrelated content", &[]).await);
    }

    #[tokio::test]
    async fn fails_open_to_true_on_llm_error() {
        let llm = MockLlmClient::new(Vec::<String>::new());
        assert!(visible(&llm, &step(), "anything", &[]).await);
    }
}
