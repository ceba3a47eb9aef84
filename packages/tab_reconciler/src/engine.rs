//! Reconciliation engine.
//!
//! Each cycle runs three strictly sequential phases:
//!
//! 1. **Rehydrate**: snapshot the browser and purge registry entries that no
//!    longer point at a correctly-classified tab.
//! 2. **Decide**: compute a [`ReconcilePlan`] from desired live channels,
//!    priority, capacity and the snapshot. Pure, no I/O.
//! 3. **Execute**: closes first (issued concurrently), then opens, each
//!    best-effort. A failing tab never aborts the rest of the cycle.
//!
//! Two independent sweeps follow: the unfollowed-tab sweep (grace period) and
//! the global tab limit.

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, TabError};
use crate::host::{TabHost, TabId};
use crate::inventory::{TabInventory, TabSnapshot};
use crate::login::Login;
use crate::registry::ManagedTabRegistry;

/// Why the engine closed a tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Managed channel is no longer live (or was unfollowed).
    Offline,
    /// Evicted to admit a priority channel.
    Preempted,
    /// A user tab already shows the same channel.
    Duplicate,
    /// Capacity was lowered below the number of managed tabs.
    OverCapacity,
    /// User-opened tab for a channel outside the follow list, past its grace.
    Unfollowed,
    /// Global tab limit, least recently accessed first.
    TabLimit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedClose {
    pub login: Login,
    pub tab_id: TabId,
    pub reason: CloseReason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedOpen {
    pub login: Login,
    /// Managed channel evicted to make room for this one.
    pub replaces: Option<Login>,
}

/// Decisions for one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub close: Vec<PlannedClose>,
    pub open: Vec<PlannedOpen>,
    /// Managed tabs kept because their channel is still desired.
    pub keep: Vec<Login>,
    /// Desired channels already shown by a tab the user opened.
    pub equivalent: Vec<(Login, TabId)>,
    /// Desired channels with no slot this cycle.
    pub dropped: Vec<Login>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClosedTab {
    pub login: Login,
    pub tab_id: TabId,
    pub reason: CloseReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TabFailure {
    pub login: Login,
    pub operation: &'static str,
    pub error: String,
}

/// Outcome of [`ReconciliationEngine::reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub opened: Vec<Login>,
    pub closed: Vec<ClosedTab>,
    pub touched: Vec<Login>,
    pub dropped: Vec<Login>,
    pub failures: Vec<TabFailure>,
    /// Managed tabs open after the cycle.
    pub open_count: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }

    pub fn closed_logins(&self) -> Vec<&Login> {
        self.closed.iter().map(|c| &c.login).collect()
    }
}

/// Outcome of the unfollowed sweep or the tab limit sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub closed: Vec<ClosedTab>,
    pub failures: Vec<TabFailure>,
}

impl SweepReport {
    fn from_closes((closed, failures): (Vec<ClosedTab>, Vec<TabFailure>)) -> Self {
        Self { closed, failures }
    }
}

/// Outcome of a full cycle: reconciliation plus both sweeps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub reconcile: ReconcileReport,
    pub unfollowed: SweepReport,
    pub trimmed: SweepReport,
}

impl CycleReport {
    /// Tabs closed by reconciliation and both sweeps.
    pub fn closed_count(&self) -> usize {
        self.reconcile.closed.len() + self.unfollowed.closed.len() + self.trimmed.closed.len()
    }

    /// Every failed host call of the cycle.
    pub fn failures(&self) -> impl Iterator<Item = &TabFailure> {
        self.reconcile
            .failures
            .iter()
            .chain(&self.unfollowed.failures)
            .chain(&self.trimmed.failures)
    }
}

/// Inputs for one cycle, snapshotted by the caller.
#[derive(Clone, Debug)]
pub struct CycleInput<'a> {
    pub live: &'a [Login],
    pub priority: &'a HashSet<Login>,
    pub followed: &'a HashSet<Login>,
    pub max_tabs: usize,
    pub tab_limit: usize,
    pub unfollowed_grace: Duration,
}

/// An open tab as diagnostics report it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OpenTabRecord {
    pub tab_id: TabId,
    pub channel_login: Option<Login>,
    pub created_by_manager: bool,
    pub first_observed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
struct Observation {
    first_observed_at: DateTime<Utc>,
    last_touched_at: Option<DateTime<Utc>>,
}

/// Deduplicate the live set and move priority members to the front, keeping
/// first-seen order within each group.
pub fn rank_desired(live: &[Login], priority: &HashSet<Login>) -> Vec<Login> {
    let mut seen = HashSet::new();
    let deduped: Vec<&Login> = live.iter().filter(|l| seen.insert(*l)).collect();
    let (mut ranked, rest): (Vec<&Login>, Vec<&Login>) =
        deduped.into_iter().partition(|l| priority.contains(*l));
    ranked.extend(rest);
    ranked.into_iter().cloned().collect()
}

/// Decide which tabs to open, keep and close. `desired` must already be
/// ranked (see [`rank_desired`]) and the registry already rehydrated.
pub fn plan(
    desired: &[Login],
    priority: &HashSet<Login>,
    max_tabs: usize,
    registry: &ManagedTabRegistry,
    snapshot: &TabSnapshot,
) -> ReconcilePlan {
    let mut out = ReconcilePlan::default();
    let by_login = snapshot.by_login();
    let desired_set: HashSet<&Login> = desired.iter().collect();

    // Managed tabs shadowed by a user tab for the same channel.
    let mut shadowed: HashSet<&Login> = HashSet::new();
    for (login, entry) in registry.entries() {
        let user_tab_exists = by_login
            .get(login)
            .map(|tabs| tabs.iter().any(|t| t.id != entry.tab_id))
            .unwrap_or(false);
        if user_tab_exists {
            shadowed.insert(login);
            out.close.push(PlannedClose {
                login: login.clone(),
                tab_id: entry.tab_id.clone(),
                reason: CloseReason::Duplicate,
            });
        } else if !desired_set.contains(login) {
            out.close.push(PlannedClose {
                login: login.clone(),
                tab_id: entry.tab_id.clone(),
                reason: CloseReason::Offline,
            });
        }
    }

    let mut kept: Vec<Login> = desired
        .iter()
        .filter(|l| registry.has(l) && !shadowed.contains(l))
        .cloned()
        .collect();

    while kept.len() > max_tabs {
        let idx = kept
            .iter()
            .rposition(|l| !priority.contains(l))
            .unwrap_or(kept.len() - 1);
        let login = kept.remove(idx);
        if let Some(tab_id) = registry.get(&login) {
            out.close.push(PlannedClose {
                tab_id: tab_id.clone(),
                login,
                reason: CloseReason::OverCapacity,
            });
        }
    }

    let mut remaining = max_tabs.saturating_sub(kept.len());
    let mut evictable = kept.clone();

    for login in desired {
        if kept.contains(login) {
            continue;
        }
        // Managed but not kept: trimmed or evicted above, already closing.
        if registry.has(login) && !shadowed.contains(login) {
            continue;
        }
        let user_tab = by_login
            .get(login)
            .and_then(|tabs| tabs.iter().find(|t| !registry.is_managed_tab(&t.id)));
        if let Some(tab) = user_tab {
            out.equivalent.push((login.clone(), tab.id.clone()));
            continue;
        }

        if remaining > 0 {
            remaining -= 1;
            out.open.push(PlannedOpen {
                login: login.clone(),
                replaces: None,
            });
            continue;
        }

        if priority.contains(login) {
            if let Some(idx) = evictable.iter().rposition(|l| !priority.contains(l)) {
                // Evicted logins come later in rank order and are skipped by
                // the managed-but-not-kept check when reached.
                let victim = evictable.remove(idx);
                if let Some(tab_id) = registry.get(&victim) {
                    out.close.push(PlannedClose {
                        login: victim.clone(),
                        tab_id: tab_id.clone(),
                        reason: CloseReason::Preempted,
                    });
                }
                kept.retain(|l| l != &victim);
                out.open.push(PlannedOpen {
                    login: login.clone(),
                    replaces: Some(victim),
                });
                continue;
            }
        }

        out.dropped.push(login.clone());
    }

    out.keep = kept;
    out
}

pub struct ReconciliationEngine {
    host: Arc<dyn TabHost>,
    inventory: TabInventory,
    registry: ManagedTabRegistry,
    observed: HashMap<TabId, Observation>,
    unfollowed_since: HashMap<TabId, (Login, DateTime<Utc>)>,
    last_records: Vec<OpenTabRecord>,
}

impl ReconciliationEngine {
    pub fn new(host: Arc<dyn TabHost>, inventory: TabInventory, registry: ManagedTabRegistry) -> Self {
        Self {
            host,
            inventory,
            registry,
            observed: HashMap::new(),
            unfollowed_since: HashMap::new(),
            last_records: Vec::new(),
        }
    }

    pub fn host(&self) -> &Arc<dyn TabHost> {
        &self.host
    }

    pub fn registry(&self) -> &ManagedTabRegistry {
        &self.registry
    }

    pub fn inventory(&self) -> &TabInventory {
        &self.inventory
    }

    /// Open tabs as of the last snapshot, with ownership and first sighting.
    pub fn open_tabs(&self) -> &[OpenTabRecord] {
        &self.last_records
    }

    /// Last time the engine reused an existing tab for `tab_id`.
    pub fn last_touched(&self, tab_id: &TabId) -> Option<DateTime<Utc>> {
        self.observed.get(tab_id).and_then(|o| o.last_touched_at)
    }

    async fn snapshot(&mut self, now: DateTime<Utc>) -> Result<TabSnapshot, EngineError> {
        let snapshot = self
            .inventory
            .snapshot(self.host.as_ref())
            .await
            .map_err(EngineError::Snapshot)?;

        self.observed
            .retain(|id, _| snapshot.get(id).is_some());
        for tab in &snapshot.tabs {
            self.observed.entry(tab.id.clone()).or_insert(Observation {
                first_observed_at: now,
                last_touched_at: None,
            });
        }
        Ok(snapshot)
    }

    fn refresh_records(&mut self, snapshot: &TabSnapshot) {
        self.last_records = snapshot
            .tabs
            .iter()
            .map(|tab| OpenTabRecord {
                tab_id: tab.id.clone(),
                channel_login: tab.login().cloned(),
                created_by_manager: self.registry.is_managed_tab(&tab.id),
                first_observed_at: self
                    .observed
                    .get(&tab.id)
                    .map(|o| o.first_observed_at)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            })
            .collect();
    }

    /// Purge all state for a tab the browser reported as removed.
    pub fn forget_tab(&mut self, tab_id: &TabId) -> Option<Login> {
        self.observed.remove(tab_id);
        self.unfollowed_since.remove(tab_id);
        let login = self.registry.forget_tab(tab_id);
        if let Some(login) = &login {
            debug!("Tab {} for {} closed by the browser", tab_id, login);
        }
        login
    }

    /// Close a batch of tabs concurrently. Returns the tabs actually gone and
    /// failures; managed entries are released for every closed tab.
    async fn close_all(
        &mut self,
        closes: Vec<PlannedClose>,
    ) -> (Vec<ClosedTab>, Vec<TabFailure>) {
        let host = Arc::clone(&self.host);
        let results = join_all(closes.into_iter().map(|planned| {
            let host = &host;
            async move {
                let result = host.close(&planned.tab_id).await;
                (planned, result)
            }
        }))
        .await;

        let mut closed = Vec::new();
        let mut failures = Vec::new();
        for (planned, result) in results {
            match result {
                Ok(()) | Err(TabError::NotFound(_)) => {
                    if self.registry.get(&planned.login) == Some(&planned.tab_id) {
                        self.registry.mark_closed(&planned.login);
                    }
                    self.observed.remove(&planned.tab_id);
                    self.unfollowed_since.remove(&planned.tab_id);
                    info!(
                        "Closed tab {} for {} ({:?})",
                        planned.tab_id, planned.login, planned.reason
                    );
                    closed.push(ClosedTab {
                        login: planned.login,
                        tab_id: planned.tab_id,
                        reason: planned.reason,
                    });
                }
                Err(e) => {
                    warn!("Failed to close tab {} for {}: {}", planned.tab_id, planned.login, e);
                    failures.push(TabFailure {
                        login: planned.login,
                        operation: "close",
                        error: e.to_string(),
                    });
                }
            }
        }
        (closed, failures)
    }

    /// Bring managed tabs in line with the live set.
    pub async fn reconcile(
        &mut self,
        live: &[Login],
        priority: &HashSet<Login>,
        max_tabs: usize,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport, EngineError> {
        let snapshot = self.snapshot(now).await?;
        for (login, reason) in self.registry.rehydrate(&snapshot) {
            debug!("Registry entry for {} invalidated: {:?}", login, reason);
        }

        let desired = rank_desired(live, priority);
        let plan = plan(&desired, priority, max_tabs, &self.registry, &snapshot);
        debug!(
            "Plan: open={} close={} keep={} equivalent={} dropped={}",
            plan.open.len(),
            plan.close.len(),
            plan.keep.len(),
            plan.equivalent.len(),
            plan.dropped.len()
        );

        let mut report = ReconcileReport {
            dropped: plan.dropped.clone(),
            ..Default::default()
        };

        self.registry.touch_all(&plan.keep, now);
        report.touched.extend(plan.keep.iter().cloned());
        for (login, tab_id) in &plan.equivalent {
            if let Some(observation) = self.observed.get_mut(tab_id) {
                observation.last_touched_at = Some(now);
            }
            debug!("{} already open in user tab {}", login, tab_id);
            report.touched.push(login.clone());
        }

        let (closed, failures) = self.close_all(plan.close).await;
        report.closed = closed;
        report.failures = failures;

        for planned in plan.open {
            // Gate on the registry, not the plan: a failed close keeps its slot.
            if self.registry.len() >= max_tabs {
                debug!("No slot left for {}, retrying next cycle", planned.login);
                report.dropped.push(planned.login);
                continue;
            }
            let url = self.inventory.site().channel_url(&planned.login);
            match self.host.open(&url).await {
                Ok(tab_id) => {
                    self.observed.insert(
                        tab_id.clone(),
                        Observation {
                            first_observed_at: now,
                            last_touched_at: Some(now),
                        },
                    );
                    if let Err(e) = self.registry.mark_opened(planned.login.clone(), tab_id.clone(), now) {
                        warn!("Opened {} but could not register it: {}", planned.login, e);
                    }
                    match &planned.replaces {
                        Some(victim) => info!(
                            "Opened tab {} for priority channel {} (replacing {})",
                            tab_id, planned.login, victim
                        ),
                        None => info!("Opened tab {} for {}", tab_id, planned.login),
                    }
                    report.opened.push(planned.login);
                }
                Err(e) => {
                    warn!("Failed to open tab for {}: {}", planned.login, e);
                    report.failures.push(TabFailure {
                        login: planned.login,
                        operation: "open",
                        error: e.to_string(),
                    });
                }
            }
        }

        report.open_count = self.registry.len();
        Ok(report)
    }

    /// Close user-opened tabs for channels outside `followed` once they have
    /// been seen continuously for `grace`. Managed and audible tabs are
    /// never touched.
    pub async fn sweep_unfollowed(
        &mut self,
        followed: &HashSet<Login>,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, EngineError> {
        let snapshot = self.snapshot(now).await?;
        let grace = TimeDelta::from_std(grace).unwrap_or(TimeDelta::MAX);

        self.unfollowed_since
            .retain(|id, _| snapshot.get(id).is_some());

        let mut expired = Vec::new();
        for tab in snapshot.channel_tabs() {
            let Some(login) = tab.login() else { continue };
            if self.registry.is_managed_tab(&tab.id) || followed.contains(login) || tab.audible {
                self.unfollowed_since.remove(&tab.id);
                continue;
            }
            let since = match self.unfollowed_since.get(&tab.id) {
                Some((seen_login, since)) if seen_login == login => *since,
                _ => {
                    self.unfollowed_since
                        .insert(tab.id.clone(), (login.clone(), now));
                    now
                }
            };
            if now - since >= grace {
                expired.push(PlannedClose {
                    login: login.clone(),
                    tab_id: tab.id.clone(),
                    reason: CloseReason::Unfollowed,
                });
            }
        }

        Ok(SweepReport::from_closes(self.close_all(expired).await))
    }

    /// Global safety valve: keep at most `limit` channel tabs open, managed or
    /// not, closing the least recently accessed first. Site pages without a
    /// channel (home, search, ignored paths) are neither counted nor closed.
    pub async fn enforce_tab_limit(
        &mut self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, EngineError> {
        let snapshot = self.snapshot(now).await?;
        let mut tabs: Vec<_> = snapshot.channel_tabs().collect();
        if tabs.len() <= limit {
            self.refresh_records(&snapshot);
            return Ok(SweepReport::default());
        }

        tabs.sort_by_key(|tab| {
            tab.last_accessed
                .or_else(|| self.observed.get(&tab.id).map(|o| o.first_observed_at))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        let excess = tabs.len() - limit;
        let victims: Vec<PlannedClose> = tabs
            .into_iter()
            .take(excess)
            .filter_map(|tab| {
                tab.login().map(|login| PlannedClose {
                    login: login.clone(),
                    tab_id: tab.id.clone(),
                    reason: CloseReason::TabLimit,
                })
            })
            .collect();

        let report = SweepReport::from_closes(self.close_all(victims).await);
        if let Ok(after) = self.snapshot(now).await {
            self.refresh_records(&after);
        }
        Ok(report)
    }

    /// Reconcile, then sweep unfollowed tabs, then enforce the tab limit.
    /// Sweep failures are logged; only a failed reconcile snapshot aborts.
    pub async fn cycle(
        &mut self,
        input: CycleInput<'_>,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, EngineError> {
        let reconcile = self
            .reconcile(input.live, input.priority, input.max_tabs, now)
            .await?;

        let unfollowed = self
            .sweep_unfollowed(input.followed, input.unfollowed_grace, now)
            .await
            .unwrap_or_else(|e| {
                warn!("Unfollowed sweep skipped: {}", e);
                SweepReport::default()
            });

        let trimmed = self
            .enforce_tab_limit(input.tab_limit, now)
            .await
            .unwrap_or_else(|e| {
                warn!("Tab limit sweep skipped: {}", e);
                SweepReport::default()
            });

        Ok(CycleReport {
            reconcile,
            unfollowed,
            trimmed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::UrlClass;
    use crate::inventory::SiteTab;

    fn login(s: &str) -> Login {
        Login::parse(s).unwrap()
    }

    fn logins(names: &[&str]) -> Vec<Login> {
        names.iter().map(|s| login(s)).collect()
    }

    fn set(names: &[&str]) -> HashSet<Login> {
        logins(names).into_iter().collect()
    }

    fn channel_tab(id: &str, name: &str) -> SiteTab {
        SiteTab {
            id: TabId::new(id),
            url: format!("https://www.twitch.tv/{name}"),
            class: UrlClass::Channel(login(name)),
            last_accessed: None,
            audible: false,
        }
    }

    fn registry_with(entries: &[(&str, &str)]) -> ManagedTabRegistry {
        let mut registry = ManagedTabRegistry::default();
        for (name, id) in entries {
            registry
                .mark_opened(login(name), TabId::new(*id), Utc::now())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_rank_desired_priority_first_and_dedup() {
        let ranked = rank_desired(&logins(&["a", "b", "c", "b", "d"]), &set(&["c", "d"]));
        assert_eq!(ranked, logins(&["c", "d", "a", "b"]));
    }

    #[test]
    fn test_plan_fills_capacity_in_rank_order() {
        let desired = rank_desired(&logins(&["a", "b", "c"]), &set(&["b"]));
        let plan = plan(
            &desired,
            &set(&["b"]),
            2,
            &ManagedTabRegistry::default(),
            &TabSnapshot::default(),
        );
        let opened: Vec<&str> = plan.open.iter().map(|o| o.login.as_str()).collect();
        assert_eq!(opened, vec!["b", "a"]);
        assert_eq!(plan.dropped, logins(&["c"]));
        assert!(plan.close.is_empty());
    }

    #[test]
    fn test_plan_preempts_one_non_priority_per_candidate() {
        let registry = registry_with(&[("a", "1"), ("b", "2")]);
        let snapshot = TabSnapshot {
            tabs: vec![channel_tab("1", "a"), channel_tab("2", "b")],
        };
        let priority = set(&["p", "q", "r"]);
        let desired = rank_desired(&logins(&["a", "b", "p", "q", "r"]), &priority);
        let plan = plan(&desired, &priority, 2, &registry, &snapshot);

        let preempted: Vec<&str> = plan
            .close
            .iter()
            .filter(|c| c.reason == CloseReason::Preempted)
            .map(|c| c.login.as_str())
            .collect();
        assert_eq!(preempted, vec!["b", "a"]);
        assert_eq!(plan.open.len(), 2);
        assert_eq!(plan.open[0].replaces, Some(login("b")));
        assert_eq!(plan.open[1].replaces, Some(login("a")));
        assert_eq!(plan.dropped, logins(&["r"]));
    }

    #[test]
    fn test_plan_never_evicts_priority_for_priority() {
        let registry = registry_with(&[("p", "1")]);
        let snapshot = TabSnapshot {
            tabs: vec![channel_tab("1", "p")],
        };
        let priority = set(&["p", "q"]);
        let desired = rank_desired(&logins(&["p", "q"]), &priority);
        let plan = plan(&desired, &priority, 1, &registry, &snapshot);
        assert!(plan.close.is_empty());
        assert_eq!(plan.dropped, logins(&["q"]));
    }

    #[test]
    fn test_plan_offline_managed_tabs_free_their_slot() {
        let registry = registry_with(&[("x", "1")]);
        let snapshot = TabSnapshot {
            tabs: vec![channel_tab("1", "x")],
        };
        let plan = plan(&logins(&["y"]), &HashSet::new(), 1, &registry, &snapshot);
        assert_eq!(
            plan.close,
            vec![PlannedClose {
                login: login("x"),
                tab_id: TabId::new("1"),
                reason: CloseReason::Offline,
            }]
        );
        assert_eq!(plan.open.len(), 1);
        assert_eq!(plan.open[0].login, login("y"));
    }

    #[test]
    fn test_plan_trims_excess_after_capacity_drop() {
        let registry = registry_with(&[("a", "1"), ("b", "2"), ("p", "3")]);
        let snapshot = TabSnapshot {
            tabs: vec![
                channel_tab("1", "a"),
                channel_tab("2", "b"),
                channel_tab("3", "p"),
            ],
        };
        let priority = set(&["p"]);
        let desired = rank_desired(&logins(&["a", "b", "p"]), &priority);
        let plan = plan(&desired, &priority, 1, &registry, &snapshot);
        let trimmed: Vec<&str> = plan.close.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(trimmed, vec!["b", "a"]);
        assert_eq!(plan.keep, logins(&["p"]));
    }

    #[test]
    fn test_plan_uses_equivalent_user_tab() {
        let snapshot = TabSnapshot {
            tabs: vec![SiteTab {
                id: TabId::new("9"),
                url: "https://www.twitch.tv/moderator/alice".to_string(),
                class: UrlClass::Channel(login("alice")),
                last_accessed: None,
                audible: false,
            }],
        };
        let plan = plan(
            &logins(&["alice"]),
            &HashSet::new(),
            4,
            &ManagedTabRegistry::default(),
            &snapshot,
        );
        assert!(plan.open.is_empty());
        assert_eq!(plan.equivalent, vec![(login("alice"), TabId::new("9"))]);
    }

    #[test]
    fn test_plan_closes_managed_duplicate_of_user_tab() {
        let registry = registry_with(&[("alice", "1")]);
        let snapshot = TabSnapshot {
            tabs: vec![channel_tab("1", "alice"), channel_tab("2", "alice")],
        };
        let plan = plan(&logins(&["alice"]), &HashSet::new(), 4, &registry, &snapshot);
        assert_eq!(plan.close.len(), 1);
        assert_eq!(plan.close[0].reason, CloseReason::Duplicate);
        assert_eq!(plan.close[0].tab_id, TabId::new("1"));
        assert_eq!(plan.equivalent, vec![(login("alice"), TabId::new("2"))]);
        assert!(plan.open.is_empty());
    }
}
