//! Shared axum state: the orchestrator, runtime config, and the rate
//! limiter guarding the inbound `task` message (§6).
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::orchestrator::SessionOrchestrator;

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct ServeState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub config: Arc<RuntimeConfig>,
    pub rate_limiter: Arc<RateLimiter>,
}
