//! Unified error type for the SoulBrowser agent binary.
#![allow(dead_code)]

use thiserror::Error;

/// Top-level error type returned across session orchestration, the agent
/// loop, and the client channel.
#[derive(Debug, Error)]
pub enum SoulBrowserError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("validation failed: {message} ({details})")]
    Validation { message: String, details: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("guardrail blocked action: {0}")]
    GuardrailBlocked(String),

    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("browser tool error: {0}")]
    Tool(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Element went stale mid-click, or the toolkit call timed out.
    #[error("transient toolkit error: {0}")]
    TransientToolkit(String),

    /// A click's expected side effect was navigation; the execution context
    /// was torn down before the result could be read back.
    #[error("navigation destroyed the execution context: {0}")]
    NavigationContextDestroyed(String),

    #[error("step cap exceeded after {0} steps")]
    StepCapExceeded(usize),
}

impl SoulBrowserError {
    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation_error(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn guardrail_blocked(reason: impl Into<String>) -> Self {
        Self::GuardrailBlocked(reason.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn transient_toolkit(message: impl Into<String>) -> Self {
        Self::TransientToolkit(message.into())
    }

    pub fn navigation_context_destroyed(message: impl Into<String>) -> Self {
        Self::NavigationContextDestroyed(message.into())
    }

    /// Whether a caller can reasonably retry the underlying operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::LlmProvider(_) | Self::Tool(_) | Self::TransientToolkit(_)
        )
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Auth(_) => 401,
            Self::Forbidden(_) | Self::GuardrailBlocked(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 422,
            Self::Timeout { .. } => 504,
            Self::LlmProvider(_)
            | Self::Tool(_)
            | Self::Storage(_)
            | Self::Internal(_)
            | Self::TransientToolkit(_)
            | Self::NavigationContextDestroyed(_)
            | Self::StepCapExceeded(_) => 500,
        }
    }
}

impl From<std::io::Error> for SoulBrowserError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for SoulBrowserError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation_error("invalid JSON", err.to_string())
    }
}

impl From<rusqlite::Error> for SoulBrowserError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for SoulBrowserError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

pub type SoulResult<T> = Result<T, SoulBrowserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SoulBrowserError::auth_error("invalid credentials");
        assert_eq!(err.http_status(), 401);
        assert_eq!(err.to_string(), "authentication failed: invalid credentials");
    }

    #[test]
    fn test_guardrail_blocked() {
        let err = SoulBrowserError::guardrail_blocked("secret marker detected");
        assert_eq!(err.http_status(), 403);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = SoulBrowserError::timeout("llm_decide", 8000);
        assert!(err.is_retryable());
    }
}
