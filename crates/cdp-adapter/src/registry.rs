//! Adapter registry keeping track of active pages/sessions/targets.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::{PageId, SessionId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetContext {
    pub session_id: SessionId,
    pub target_id: Option<String>,
    pub cdp_session: Option<String>,
    pub recent_url: Option<String>,
    /// Monotonic insertion order, used to find the most recently opened
    /// tab when a click spawns a new one (the "zombie tab" fix).
    pub opened_at: u64,
}

/// Concurrent registry for pages and sessions.
pub struct Registry {
    pages: DashMap<PageId, TargetContext>,
    next_opened_at: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
            next_opened_at: AtomicU64::new(0),
        }
    }

    pub fn insert_page(
        &self,
        page: PageId,
        session: SessionId,
        target_id: Option<String>,
        cdp_session: Option<String>,
    ) {
        let ctx = TargetContext {
            session_id: session,
            target_id,
            cdp_session,
            recent_url: None,
            opened_at: self.next_opened_at.fetch_add(1, Ordering::SeqCst),
        };
        self.pages.insert(page, ctx);
    }

    /// The most recently opened page still registered, if any.
    pub fn newest_page(&self) -> Option<PageId> {
        self.pages
            .iter()
            .max_by_key(|kv| kv.value().opened_at)
            .map(|kv| *kv.key())
    }

    pub fn remove_page(&self, page: &PageId) {
        self.pages.remove(page);
    }

    pub fn get(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.get(page).map(|entry| entry.value().clone())
    }

    pub fn iter(&self) -> Vec<(PageId, TargetContext)> {
        self.pages
            .iter()
            .map(|kv| (*kv.key(), kv.value().clone()))
            .collect()
    }

    pub fn set_recent_url(&self, page: &PageId, url: String) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.recent_url = Some(url);
        }
    }

    pub fn set_cdp_session(&self, page: &PageId, session: String) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.cdp_session = Some(session);
        }
    }

    pub fn get_cdp_session(&self, page: &PageId) -> Option<String> {
        self.pages
            .get(page)
            .and_then(|entry| entry.cdp_session.clone())
    }
}
