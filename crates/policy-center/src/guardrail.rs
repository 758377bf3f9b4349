//! Guardrail gate: vets a proposed action's target label and fill value
//! before it is handed to the toolkit, and gates navigation against the
//! domain allowlist.

use serde::{Deserialize, Serialize};

/// Keywords that, found case-insensitively in a target region's label,
/// force human confirmation before the action executes.
pub const DEFAULT_SENSITIVE_KEYWORDS: &[&str] =
    &["submit", "enroll", "pay", "send", "delete", "remove"];

/// Literal markers that, found in a fill value, deny the action outright.
/// These never reach the LLM or a confirmation prompt.
pub const SECRET_MARKERS: &[&str] = &["SECRET.", "PASSWORD", "API_KEY"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub sensitive_keywords: Vec<String>,
    pub secret_markers: Vec<String>,
    pub allowed_domains: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            sensitive_keywords: DEFAULT_SENSITIVE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            secret_markers: SECRET_MARKERS.iter().map(|s| s.to_string()).collect(),
            allowed_domains: Vec::new(),
        }
    }
}

/// Minimal view of a proposed action the gate needs: the label of the
/// region it targets (if any) and the value it would type (if any).
#[derive(Clone, Debug, Default)]
pub struct ActionIntent<'a> {
    pub target_label: Option<&'a str>,
    pub fill_value: Option<&'a str>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardrailVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
    pub requires_confirmation: bool,
}

impl GuardrailVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_confirmation: false,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            requires_confirmation: false,
        }
    }

    fn needs_confirmation(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            requires_confirmation: true,
        }
    }
}

/// `check(action, regions) → { allowed, reason?, requiresConfirmation }`.
///
/// Secret markers are checked first and deny outright — they must never be
/// sent to the LLM or surfaced as a confirmation prompt. Sensitive-keyword
/// labels pause for human confirmation instead of denying outright.
pub fn check(intent: &ActionIntent<'_>, config: &GuardrailConfig) -> GuardrailVerdict {
    if let Some(value) = intent.fill_value {
        let upper = value.to_ascii_uppercase();
        if config
            .secret_markers
            .iter()
            .any(|marker| upper.contains(&marker.to_ascii_uppercase()))
        {
            return GuardrailVerdict::deny("fill value contains a secret marker");
        }
    }

    if let Some(label) = intent.target_label {
        let lower = label.to_ascii_lowercase();
        if let Some(keyword) = config
            .sensitive_keywords
            .iter()
            .find(|kw| lower.contains(kw.as_str()))
        {
            return GuardrailVerdict::needs_confirmation(format!(
                "target label '{label}' matches sensitive keyword '{keyword}'"
            ));
        }
    }

    GuardrailVerdict::allow()
}

/// True if `host` equals `allowed` or is a subdomain of it
/// (`sub.example.com` matches `example.com`; bare substring containment
/// does not — `notexample.com` must not match `example.com`).
pub fn host_allowed(host: &str, allowed: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let allowed = allowed.trim_end_matches('.').to_ascii_lowercase();
    host == allowed || host.ends_with(&format!(".{allowed}"))
}

/// URL-allowlist helper gating navigation-level checks.
pub fn url_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }
    let host = match url::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) => h.to_string(),
            None => return false,
        },
        Err(_) => return false,
    };
    allowed_domains.iter().any(|domain| host_allowed(&host, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_keyword_requires_confirmation() {
        let verdict = check(
            &ActionIntent {
                target_label: Some("Delete account"),
                fill_value: None,
            },
            &GuardrailConfig::default(),
        );
        assert!(!verdict.allowed);
        assert!(verdict.requires_confirmation);
    }

    #[test]
    fn secret_marker_denies_outright() {
        let verdict = check(
            &ActionIntent {
                target_label: Some("Password field"),
                fill_value: Some("SECRET.token-value"),
            },
            &GuardrailConfig::default(),
        );
        assert!(!verdict.allowed);
        assert!(!verdict.requires_confirmation);
    }

    #[test]
    fn benign_action_allowed() {
        let verdict = check(
            &ActionIntent {
                target_label: Some("Next page"),
                fill_value: Some("hello world"),
            },
            &GuardrailConfig::default(),
        );
        assert!(verdict.allowed);
    }

    #[test]
    fn host_allowlist_matches_subdomains_only() {
        assert!(host_allowed("www.example.com", "example.com"));
        assert!(host_allowed("example.com", "example.com"));
        assert!(!host_allowed("notexample.com", "example.com"));
    }

    #[test]
    fn url_allowed_empty_list_permits_everything() {
        assert!(url_allowed("https://anything.test/path", &[]));
    }
}
