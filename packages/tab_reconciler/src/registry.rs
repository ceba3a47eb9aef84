//! Record of the tabs the engine opened itself.
//!
//! Only these tabs may be closed without a grace period. The registry is
//! single-writer (the engine) but the browser can invalidate any entry at any
//! time, so [`ManagedTabRegistry::rehydrate`] must run before every decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{RegistryError, StoreError};
use crate::host::TabId;
use crate::inventory::TabSnapshot;
use crate::login::Login;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEntry {
    pub tab_id: TabId,
    pub opened_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

pub type RegistryEntries = BTreeMap<Login, ManagedEntry>;

/// Persistence seam for the registry. Saved on every mutation.
pub trait RegistryStore: Send {
    fn load(&mut self) -> Result<RegistryEntries, StoreError>;
    fn save(&mut self, entries: &RegistryEntries) -> Result<(), StoreError>;
}

/// Keeps the registry in memory only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl RegistryStore for NoopStore {
    fn load(&mut self) -> Result<RegistryEntries, StoreError> {
        Ok(RegistryEntries::new())
    }

    fn save(&mut self, _entries: &RegistryEntries) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Why rehydration dropped an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    TabGone,
    /// The user navigated the tab somewhere else.
    Navigated { now: Option<Login> },
}

pub struct ManagedTabRegistry {
    entries: RegistryEntries,
    store: Box<dyn RegistryStore>,
}

impl Default for ManagedTabRegistry {
    fn default() -> Self {
        Self::new(Box::new(NoopStore))
    }
}

impl ManagedTabRegistry {
    /// Load persisted entries. A store that fails to load starts empty; the
    /// next rehydration pass would discard stale entries anyway.
    pub fn new(mut store: Box<dyn RegistryStore>) -> Self {
        let entries = store.load().unwrap_or_else(|e| {
            warn!("Failed to load managed tab registry, starting empty: {}", e);
            RegistryEntries::new()
        });
        Self { entries, store }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.entries) {
            warn!("Failed to persist managed tab registry: {}", e);
        }
    }

    /// Drop every entry whose tab is gone or no longer classifies to the
    /// registered login.
    pub fn rehydrate(&mut self, snapshot: &TabSnapshot) -> Vec<(Login, StaleReason)> {
        let mut dropped = Vec::new();
        for (login, entry) in &self.entries {
            match snapshot.get(&entry.tab_id) {
                None => dropped.push((login.clone(), StaleReason::TabGone)),
                Some(tab) if tab.login() != Some(login) => dropped.push((
                    login.clone(),
                    StaleReason::Navigated {
                        now: tab.login().cloned(),
                    },
                )),
                Some(_) => {}
            }
        }

        if !dropped.is_empty() {
            for (login, reason) in &dropped {
                debug!("Dropping stale registry entry {}: {:?}", login, reason);
                self.entries.remove(login);
            }
            self.persist();
        }
        dropped
    }

    pub fn mark_opened(
        &mut self,
        login: Login,
        tab_id: TabId,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(&login) {
            return Err(RegistryError::AlreadyManaged(login));
        }
        self.entries.insert(
            login,
            ManagedEntry {
                tab_id,
                opened_at: now,
                touched_at: now,
            },
        );
        self.persist();
        Ok(())
    }

    /// Remove an entry. No-op when absent.
    pub fn mark_closed(&mut self, login: &Login) -> Option<ManagedEntry> {
        let removed = self.entries.remove(login);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    /// Refresh the timestamps of the entries the engine decided to keep.
    /// The batch is saved once.
    pub fn touch_all<'a>(&mut self, logins: impl IntoIterator<Item = &'a Login>, now: DateTime<Utc>) {
        let mut touched = false;
        for login in logins {
            if let Some(entry) = self.entries.get_mut(login) {
                entry.touched_at = now;
                touched = true;
            }
        }
        if touched {
            self.persist();
        }
    }

    /// Purge the entry backed by `tab_id`, if any. Wired to host removal
    /// events.
    pub fn forget_tab(&mut self, tab_id: &TabId) -> Option<Login> {
        let login = self
            .entries
            .iter()
            .find(|(_, entry)| &entry.tab_id == tab_id)
            .map(|(login, _)| login.clone())?;
        self.mark_closed(&login);
        Some(login)
    }

    pub fn has(&self, login: &Login) -> bool {
        self.entries.contains_key(login)
    }

    pub fn get(&self, login: &Login) -> Option<&TabId> {
        self.entries.get(login).map(|entry| &entry.tab_id)
    }

    pub fn entry(&self, login: &Login) -> Option<&ManagedEntry> {
        self.entries.get(login)
    }

    pub fn is_managed_tab(&self, tab_id: &TabId) -> bool {
        self.entries.values().any(|entry| &entry.tab_id == tab_id)
    }

    pub fn logins(&self) -> impl Iterator<Item = &Login> {
        self.entries.keys()
    }

    pub fn entries(&self) -> &RegistryEntries {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
