//! Synthesizer (§2 component 12 / §4.8): accumulated research notes →
//! final textual answer, emitted as a SYNTHESIS-phase log prefixed
//! `RESEARCH FINDINGS:`.
#![allow(dead_code)]

use crate::llm::{CompletionOptions, LlmClient};

pub const SYNTHESIS_NOTE_CHARS: usize = 6000;
pub const MIN_NOTE_LEN_TO_TRIGGER: usize = 100;
pub const FINDINGS_PREFIX: &str = "RESEARCH FINDINGS:";

const SYNTHESIS_SYSTEM_PROMPT: &str = "Condense the research notes below into a concise, \
well-organized answer. Include concrete facts, names, and URLs where present, and note any \
remaining gaps in the research.";

/// `{ sourceStepTitle, textSnippet <= 2000 chars }`, accumulated in order.
#[derive(Clone, Debug)]
pub struct ResearchNote {
    pub source_step_title: String,
    pub text_snippet: String,
}

impl ResearchNote {
    pub fn new(source_step_title: impl Into<String>, text_snippet: impl Into<String>) -> Self {
        let mut text_snippet = text_snippet.into();
        text_snippet.truncate(2000);
        Self {
            source_step_title: source_step_title.into(),
            text_snippet,
        }
    }
}

/// `(P7)` The synthesis step runs iff `needsSynthesis` is true AND at
/// least one accumulated note exceeds 100 chars.
pub fn should_synthesize(needs_synthesis: bool, notes: &[ResearchNote]) -> bool {
    needs_synthesis && notes.iter().any(|n| n.text_snippet.len() > MIN_NOTE_LEN_TO_TRIGGER)
}

pub struct Synthesizer<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> Synthesizer<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Concatenates the last [`SYNTHESIS_NOTE_CHARS`] of notes and asks
    /// the LLM for a final answer. Never returns an error to the caller —
    /// on LLM failure it emits an explanatory message instead (§7.3).
    pub async fn synthesize(&self, notes: &[ResearchNote]) -> String {
        let concatenated = notes
            .iter()
            .map(|n| format!("[{}]\n{}", n.source_step_title, n.text_snippet))
            .collect::<Vec<_>>()
            .join("\n\n");

        let tail: String = concatenated
            .chars()
            .rev()
            .take(SYNTHESIS_NOTE_CHARS)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        match self
            .llm
            .complete(SYNTHESIS_SYSTEM_PROMPT, &tail, CompletionOptions::default())
            .await
        {
            Ok(answer) => format!("{FINDINGS_PREFIX} {answer}"),
            Err(err) => format!(
                "{FINDINGS_PREFIX} synthesis unavailable ({err}); raw notes follow:\n{tail}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn requires_needs_synthesis_and_a_substantial_note() {
        let short = vec![ResearchNote::new("step", "short")];
        assert!(!should_synthesize(true, &short));
        assert!(!should_synthesize(false, &[ResearchNote::new("s", "x".repeat(200))]));

        let long = vec![ResearchNote::new("step", "x".repeat(200))];
        assert!(should_synthesize(true, &long));
    }

    #[tokio::test]
    async fn prefixes_findings() {
        let llm = MockLlmClient::new(vec!["4K monitors under $500 include..."]);
        let synth = Synthesizer::new(&llm);
        let notes = vec![ResearchNote::new("search", "some findings")];
        let result = synth.synthesize(&notes).await;
        assert!(result.starts_with(FINDINGS_PREFIX));
    }
}
