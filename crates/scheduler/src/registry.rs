//! Session/page/frame routing directory that the scheduler dispatches against.
//!
//! This used to live in a standalone crate; the trait is small enough, and
//! specific enough to how the orchestrator calls it, that it now lives next
//! to its only consumer.

use async_trait::async_trait;
use soulbrowser_core_types::{ExecRoute, FrameId, PageId, RoutingHint, SessionId, SoulError};

#[derive(Debug, Clone)]
pub struct SessionCtx {
    pub session: SessionId,
    pub profile: String,
    pub pages: Vec<PageId>,
}

#[async_trait]
pub trait Registry {
    async fn session_create(&self, profile: &str) -> Result<SessionId, SoulError>;
    async fn page_open(&self, session: SessionId) -> Result<PageId, SoulError>;
    async fn page_close(&self, page: PageId) -> Result<(), SoulError>;
    async fn page_focus(&self, page: PageId) -> Result<(), SoulError>;
    async fn frame_focus(&self, page: PageId, frame: FrameId) -> Result<(), SoulError>;
    async fn route_resolve(&self, hint: Option<RoutingHint>) -> Result<ExecRoute, SoulError>;
    async fn session_list(&self) -> Vec<SessionCtx>;
}
