//! Host browser capability.
//!
//! The engine never owns tab lifetimes: the browser does. Everything the
//! engine knows about tabs comes from [`TabHost::query`], re-issued every
//! cycle because the user can open, close or navigate tabs at any time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::error::TabError;

/// Opaque, browser-scoped handle to a tab.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One tab as reported by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTab {
    pub id: TabId,
    pub url: String,
    /// Browser-reported last access time, when the browser exposes one.
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub audible: bool,
}

/// Tab-management operations the engine consumes.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Open a background tab at `url`.
    async fn open(&self, url: &str) -> Result<TabId, TabError>;

    /// Close a tab. Implementations map "already gone" to
    /// [`TabError::NotFound`], which callers treat as success.
    async fn close(&self, id: &TabId) -> Result<(), TabError>;

    /// List every open tab. Site filtering is the inventory's job.
    async fn query(&self) -> Result<Vec<HostTab>, TabError>;

    /// Stream of tab-removed notifications, if the browser offers one.
    fn removed_events(&self) -> Option<broadcast::Receiver<TabId>> {
        None
    }
}

#[derive(Default)]
struct MemoryState {
    tabs: Vec<HostTab>,
    next_id: u64,
    opened: Vec<String>,
    closed: Vec<TabId>,
    failing_urls: HashSet<String>,
    failing_closes: HashSet<TabId>,
    fail_query: bool,
}

/// In-process browser. Backs dry runs of the daemon and the test suites:
/// records every open/close, can inject failures and emits removal events.
pub struct MemoryHost {
    state: Mutex<MemoryState>,
    removed_tx: broadcast::Sender<TabId>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let (removed_tx, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                ..Default::default()
            }),
            removed_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_tab(state: &mut MemoryState, url: &str) -> TabId {
        let id = TabId(state.next_id.to_string());
        state.next_id += 1;
        state.tabs.push(HostTab {
            id: id.clone(),
            url: url.to_string(),
            last_accessed: Some(Utc::now()),
            audible: false,
        });
        id
    }

    /// Simulate the user opening a tab.
    pub fn insert_tab(&self, url: &str) -> TabId {
        Self::push_tab(&mut self.lock(), url)
    }

    /// Simulate the user navigating an existing tab.
    pub fn navigate(&self, id: &TabId, url: &str) {
        if let Some(tab) = self.lock().tabs.iter_mut().find(|t| &t.id == id) {
            tab.url = url.to_string();
        }
    }

    /// Simulate the user closing a tab.
    pub fn remove_tab(&self, id: &TabId) {
        let removed = {
            let mut state = self.lock();
            if state.failing_closes.contains(id) {
                return Err(TabError::rejected("close", format!("refusing {id}")));
            }
            let before = state.tabs.len();
            state.tabs.retain(|t| &t.id != id);
            state.tabs.len() != before
        };
        if removed {
            let _ = self.removed_tx.send(id.clone());
        }
    }

    pub fn set_audible(&self, id: &TabId, audible: bool) {
        if let Some(tab) = self.lock().tabs.iter_mut().find(|t| &t.id == id) {
            tab.audible = audible;
        }
    }

    pub fn set_last_accessed(&self, id: &TabId, at: DateTime<Utc>) {
        if let Some(tab) = self.lock().tabs.iter_mut().find(|t| &t.id == id) {
            tab.last_accessed = Some(at);
        }
    }

    /// Make every subsequent `open` of exactly `url` fail.
    pub fn fail_opens_of(&self, url: &str) {
        self.lock().failing_urls.insert(url.to_string());
    }

    /// Make every subsequent `close` of `id` fail, leaving the tab open.
    pub fn fail_closes_of(&self, id: &TabId) {
        self.lock().failing_closes.insert(id.clone());
    }

    pub fn set_query_failure(&self, fail: bool) {
        self.lock().fail_query = fail;
    }

    pub fn tabs(&self) -> Vec<HostTab> {
        self.lock().tabs.clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.lock().tabs.iter().map(|t| t.url.clone()).collect()
    }

    /// URLs opened through [`TabHost::open`], in order.
    pub fn opened(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    /// Tabs closed through [`TabHost::close`], in order.
    pub fn closed(&self) -> Vec<TabId> {
        self.lock().closed.clone()
    }
}

#[async_trait]
impl TabHost for MemoryHost {
    async fn open(&self, url: &str) -> Result<TabId, TabError> {
        let mut state = self.lock();
        if state.failing_urls.contains(url) {
            return Err(TabError::rejected("open", format!("refusing {url}")));
        }
        state.opened.push(url.to_string());
        Ok(Self::push_tab(&mut state, url))
    }

    async fn close(&self, id: &TabId) -> Result<(), TabError> {
        {
            let mut state = self.lock();
            let before = state.tabs.len();
            state.tabs.retain(|t| &t.id != id);
            if state.tabs.len() == before {
                return Err(TabError::NotFound(id.clone()));
            }
            state.closed.push(id.clone());
        }
        let _ = self.removed_tx.send(id.clone());
        Ok(())
    }

    async fn query(&self) -> Result<Vec<HostTab>, TabError> {
        let state = self.lock();
        if state.fail_query {
            return Err(TabError::Unavailable("query disabled".to_string()));
        }
        Ok(state.tabs.clone())
    }

    fn removed_events(&self) -> Option<broadcast::Receiver<TabId>> {
        Some(self.removed_tx.subscribe())
    }
}
