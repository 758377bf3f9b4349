//! LLM HTTP client. A single low-level `complete` call backs every
//! higher-level prompt in this crate (scout classification, planning,
//! deciding, visibility checks, synthesis) — each caller supplies its own
//! system/user prompt and sampling parameters; this module only owns the
//! transport.
#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{SoulBrowserError, SoulResult};

#[derive(Clone, Copy, Debug)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

impl CompletionOptions {
    /// Used by the semantic visibility check (§4.4): temperature 0, max 8
    /// output tokens, just enough for a single YES/NO token.
    pub fn cheap_gate() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 8,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> SoulResult<String>;
}

/// Anthropic Messages API client.
pub struct AnthropicLlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicLlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, "claude-3-5-sonnet-latest")
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds"),
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmClient for AnthropicLlmClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> SoulResult<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
        });

        let response = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| SoulBrowserError::LlmProvider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SoulBrowserError::LlmProvider(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| SoulBrowserError::LlmProvider(e.to_string()))?;

        Ok(parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

/// Deterministic client for tests: returns a queued response per call, or
/// an error once the queue is exhausted (to surface accidental extra
/// calls instead of silently returning empty strings).
pub struct MockLlmClient {
    responses: parking_lot::Mutex<std::collections::VecDeque<String>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _options: CompletionOptions,
    ) -> SoulResult<String> {
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| SoulBrowserError::LlmProvider("mock llm queue exhausted".to_string()))
    }
}

/// Extracts the first balanced `{...}` span from a response that may be
/// raw JSON or JSON wrapped in a fenced code block (§4.2 output parsing).
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match *byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_fenced_block() {
        let text = "Here is the plan:\n```json\n{\"a\": 1, \"b\": {\"c\": 2}}\n```\nThanks.";
        let obj = extract_first_json_object(text).expect("found object");
        assert_eq!(obj, "{\"a\": 1, \"b\": {\"c\": 2}}");
    }

    #[test]
    fn extracts_raw_json() {
        let text = "{\"x\":true}";
        assert_eq!(extract_first_json_object(text), Some(text));
    }

    #[test]
    fn returns_none_when_no_object_present() {
        assert_eq!(extract_first_json_object("no json here"), None);
    }

    #[tokio::test]
    async fn mock_client_returns_queued_responses_in_order() {
        let client = MockLlmClient::new(vec!["first", "second"]);
        assert_eq!(
            client.complete("sys", "usr", CompletionOptions::default()).await.unwrap(),
            "first"
        );
        assert_eq!(
            client.complete("sys", "usr", CompletionOptions::default()).await.unwrap(),
            "second"
        );
        assert!(client.complete("sys", "usr", CompletionOptions::default()).await.is_err());
    }
}
