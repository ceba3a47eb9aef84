//! Poll scheduler: the `Idle -> Polling -> Idle` state machine around the
//! engine.
//!
//! Reconciliation never runs concurrently with itself. Timer triggers that
//! arrive mid-cycle are skipped; forced triggers wait (bounded) for the busy
//! flag and give up with [`PollOutcome::StillBusy`] rather than queueing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diagnostics::{
    ActivityEntry, ActivityLog, MetricsSnapshot, PollMetrics, RECENT_ACTIVITY,
};
use crate::engine::{CycleInput, CycleReport, OpenTabRecord, ReconciliationEngine};
use crate::host::{TabHost, TabId};
use crate::login::Login;
use crate::resolver::{LiveRequest, LiveResolver};

pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(15);
pub const MIN_FORCE_WAIT: Duration = Duration::from_secs(1);
pub const MIN_TICK: Duration = Duration::from_secs(1);

/// How often a forced trigger re-checks the busy flag.
pub const BUSY_POLL_STEP: Duration = Duration::from_millis(250);

/// Scheduler inputs, swapped wholesale on reload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub enabled: bool,
    /// Minimum spacing between timer-driven cycles.
    pub check_interval: Duration,
    /// How often the timer fires; cycles still honor `check_interval`.
    pub tick: Duration,
    pub force_wait: Duration,
    pub max_tabs: usize,
    /// Global cap on channel tabs, managed or not.
    pub tab_limit: usize,
    pub unfollowed_grace: Duration,
    pub follows: Vec<Login>,
    pub priority: Vec<Login>,
    pub blocklist: Vec<Login>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(60),
            tick: Duration::from_secs(15),
            force_wait: Duration::from_secs(30),
            max_tabs: 4,
            tab_limit: 4,
            unfollowed_grace: Duration::from_secs(60),
            follows: Vec::new(),
            priority: Vec::new(),
            blocklist: Vec::new(),
        }
    }
}

impl PollSettings {
    /// Clamp out-of-range values to the nearest safe one.
    pub fn clamped(mut self) -> Self {
        self.max_tabs = self.max_tabs.max(1);
        self.tab_limit = self.tab_limit.max(self.max_tabs);
        self.check_interval = self.check_interval.max(MIN_CHECK_INTERVAL);
        self.force_wait = self.force_wait.max(MIN_FORCE_WAIT);
        self.tick = self.tick.max(MIN_TICK);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Timer,
    Forced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    Ran {
        live: usize,
        opened: usize,
        closed: usize,
        open_count: usize,
        source: Option<String>,
    },
    /// The tab query failed; nothing was changed.
    Failed { error: String },
    SkippedBusy,
    SkippedInterval,
    /// A forced trigger waited out its bound without the cycle finishing.
    StillBusy,
    Disabled,
}

impl PollOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, PollOutcome::Ran { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Ran { .. } => "ran",
            PollOutcome::Failed { .. } => "failed",
            PollOutcome::SkippedBusy => "busy",
            PollOutcome::SkippedInterval => "interval",
            PollOutcome::StillBusy => "still_busy",
            PollOutcome::Disabled => "disabled",
        }
    }
}

/// Caches refreshed after every cycle.
#[derive(Default)]
struct PollState {
    last_run: Option<Instant>,
    last_cycle_at: Option<DateTime<Utc>>,
    last_live: Vec<Login>,
    last_source: Option<String>,
    last_open: Vec<Login>,
    last_tabs: Vec<OpenTabRecord>,
    last_report: Option<CycleReport>,
}

/// Read-only view for the command surface.
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticsSnapshot {
    pub enabled: bool,
    pub busy: bool,
    pub max_tabs: usize,
    pub tab_limit: usize,
    pub check_interval_sec: u64,
    pub live_count: usize,
    pub open_count: usize,
    /// Slots left for new managed tabs.
    pub capacity: usize,
    pub live: Vec<Login>,
    pub open: Vec<Login>,
    pub source: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub tabs: Vec<OpenTabRecord>,
    pub last_report: Option<CycleReport>,
    pub metrics: MetricsSnapshot,
    pub recent: Vec<ActivityEntry>,
}

/// Releases the busy flag when dropped, so a panicking cycle cannot wedge the
/// scheduler.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollScheduler {
    engine: tokio::sync::Mutex<ReconciliationEngine>,
    host: Arc<dyn TabHost>,
    resolver: Arc<dyn LiveResolver>,
    settings: RwLock<PollSettings>,
    busy: AtomicBool,
    state: Mutex<PollState>,
    activity: ActivityLog,
    metrics: PollMetrics,
}

impl PollScheduler {
    pub fn new(
        engine: ReconciliationEngine,
        resolver: Arc<dyn LiveResolver>,
        settings: PollSettings,
    ) -> Self {
        let host = Arc::clone(engine.host());
        Self {
            engine: tokio::sync::Mutex::new(engine),
            host,
            resolver,
            settings: RwLock::new(settings.clamped()),
            busy: AtomicBool::new(false),
            state: Mutex::new(PollState::default()),
            activity: ActivityLog::default(),
            metrics: PollMetrics::new(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PollState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap in new settings. Takes effect from the next cycle.
    pub fn update_settings(&self, settings: PollSettings) {
        let settings = settings.clamped();
        self.activity.push(
            "reload",
            format!(
                "follows={} priority={} max_tabs={} interval={}s",
                settings.follows.len(),
                settings.priority.len(),
                settings.max_tabs,
                settings.check_interval.as_secs()
            ),
        );
        *self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }

    pub fn is_enabled(&self) -> bool {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .enabled = enabled;
        info!("Polling {}", if enabled { "enabled" } else { "disabled" });
        self.activity
            .push("toggle", if enabled { "enabled" } else { "disabled" });
    }

    /// Flip the enabled flag, returning the new value.
    pub fn toggle(&self) -> bool {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled);
        enabled
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn metrics(&self) -> &PollMetrics {
        &self.metrics
    }

    fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    fn interval_elapsed(&self, interval: Duration) -> bool {
        match self.state().last_run {
            Some(last) => last.elapsed() >= interval,
            None => true,
        }
    }

    /// Run one poll cycle if the state machine allows it.
    pub async fn trigger(&self, trigger: Trigger) -> PollOutcome {
        let settings = self.settings();
        if !settings.enabled {
            debug!("Poll skipped: disabled");
            return PollOutcome::Disabled;
        }

        let guard = match trigger {
            Trigger::Timer => {
                if self.is_busy() {
                    debug!("Poll skipped: busy");
                    self.metrics.skipped_busy();
                    return PollOutcome::SkippedBusy;
                }
                if !self.interval_elapsed(settings.check_interval) {
                    self.metrics.skipped_interval();
                    return PollOutcome::SkippedInterval;
                }
                match self.try_acquire() {
                    Some(guard) => guard,
                    None => {
                        debug!("Poll skipped: busy");
                        self.metrics.skipped_busy();
                        return PollOutcome::SkippedBusy;
                    }
                }
            }
            Trigger::Forced => match self.wait_for_idle(settings.force_wait).await {
                Some(guard) => guard,
                None => {
                    warn!(
                        "Forced poll gave up after {}s: a cycle is still running",
                        settings.force_wait.as_secs()
                    );
                    self.metrics.forced_timeout();
                    self.activity.push("force", "still busy");
                    return PollOutcome::StillBusy;
                }
            },
        };

        let outcome = self.run_cycle(&settings, trigger).await;
        drop(guard);
        outcome
    }

    /// [`trigger`](Self::trigger) on its own task. Dropping the returned
    /// future (a caller that disconnects) leaves the cycle running to the end.
    pub async fn trigger_detached(self: &Arc<Self>, trigger: Trigger) -> PollOutcome {
        let scheduler = Arc::clone(self);
        match tokio::spawn(async move { scheduler.trigger(trigger).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Poll task ended abnormally: {}", e);
                self.metrics.cycle_failed();
                PollOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn wait_for_idle(&self, bound: Duration) -> Option<BusyGuard<'_>> {
        let deadline = Instant::now() + bound;
        loop {
            if let Some(guard) = self.try_acquire() {
                return Some(guard);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(BUSY_POLL_STEP).await;
        }
    }

    async fn run_cycle(&self, settings: &PollSettings, trigger: Trigger) -> PollOutcome {
        // A forced cycle clears the stamp, so the next tick polls again.
        self.state().last_run = match trigger {
            Trigger::Timer => Some(Instant::now()),
            Trigger::Forced => None,
        };

        let request = LiveRequest {
            follows: settings.follows.clone(),
            priority: settings.priority.clone(),
            capacity_hint: settings.max_tabs,
        };
        let resolution = self.resolver.resolve(&request).await;
        if resolution.logins.is_empty() {
            self.metrics.resolution_empty();
        }

        let blocked: HashSet<&Login> = settings.blocklist.iter().collect();
        let live: Vec<Login> = resolution
            .logins
            .into_iter()
            .filter(|login| !blocked.contains(login))
            .collect();
        let priority: HashSet<Login> = settings.priority.iter().cloned().collect();
        let followed: HashSet<Login> = settings
            .follows
            .iter()
            .chain(settings.priority.iter())
            .chain(live.iter())
            .cloned()
            .collect();

        let now = Utc::now();
        let mut engine = self.engine.lock().await;
        let result = engine
            .cycle(
                CycleInput {
                    live: &live,
                    priority: &priority,
                    followed: &followed,
                    max_tabs: settings.max_tabs,
                    tab_limit: settings.tab_limit,
                    unfollowed_grace: settings.unfollowed_grace,
                },
                now,
            )
            .await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!("Poll cycle failed: {}", e);
                self.metrics.cycle_failed();
                self.activity.push("error", e.to_string());
                return PollOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let open: Vec<Login> = engine.registry().logins().cloned().collect();
        let tabs = engine.open_tabs().to_vec();
        drop(engine);

        let reconcile = &report.reconcile;
        let closed = report.closed_count();
        let (open_failures, close_failures) = report
            .failures()
            .fold((0, 0), |(o, c), f| if f.operation == "open" { (o + 1, c) } else { (o, c + 1) });
        self.metrics.cycle_ran();
        self.metrics
            .record_tabs(reconcile.opened.len(), closed, open_failures, close_failures);

        let outcome = PollOutcome::Ran {
            live: live.len(),
            opened: reconcile.opened.len(),
            closed,
            open_count: reconcile.open_count,
            source: resolution.source.clone(),
        };

        if !reconcile.is_noop() || closed > reconcile.closed.len() {
            info!(
                "Poll ({:?}): live={} opened={} closed={} open={}",
                trigger,
                live.len(),
                reconcile.opened.len(),
                closed,
                reconcile.open_count
            );
        } else {
            debug!("Poll ({:?}): live={} nothing to do", trigger, live.len());
        }
        self.activity.push(
            "poll",
            format!(
                "{:?} live={} opened={} closed={} open={} source={}",
                trigger,
                live.len(),
                reconcile.opened.len(),
                closed,
                reconcile.open_count,
                resolution.source.as_deref().unwrap_or("none")
            ),
        );

        let mut state = self.state();
        state.last_cycle_at = Some(now);
        state.last_live = live;
        state.last_source = resolution.source;
        state.last_open = open;
        state.last_tabs = tabs;
        state.last_report = Some(report);
        outcome
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        let settings = self.settings();
        let state = self.state();
        DiagnosticsSnapshot {
            enabled: settings.enabled,
            busy: self.is_busy(),
            max_tabs: settings.max_tabs,
            tab_limit: settings.tab_limit,
            check_interval_sec: settings.check_interval.as_secs(),
            live_count: state.last_live.len(),
            open_count: state.last_open.len(),
            capacity: settings.max_tabs.saturating_sub(state.last_open.len()),
            live: state.last_live.clone(),
            open: state.last_open.clone(),
            source: state.last_source.clone(),
            last_cycle_at: state.last_cycle_at,
            tabs: state.last_tabs.clone(),
            last_report: state.last_report.clone(),
            metrics: self.metrics.snapshot(),
            recent: self.activity.recent(RECENT_ACTIVITY),
        }
    }

    /// Forward host tab-removed events to the engine until cancelled.
    /// Returns `None` when the host has no removal stream.
    pub fn spawn_removal_listener(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let rx = self.host.removed_events()?;
        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            scheduler.listen_removals(rx, cancel).await;
        }))
    }

    async fn listen_removals(&self, mut rx: broadcast::Receiver<TabId>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(tab_id) => {
                        let forgotten = self.engine.lock().await.forget_tab(&tab_id);
                        if let Some(login) = forgotten {
                            self.activity.push("removed", format!("{login} ({tab_id})"));
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Missed {} tab removal events; rehydration will catch up", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    /// Timer loop. Fires every `tick`; each firing is a [`Trigger::Timer`].
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let listener = self.spawn_removal_listener(cancel.clone());

        let mut tick = self.settings().tick;
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Poll scheduler started (tick {}s)", tick.as_secs());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.trigger(Trigger::Timer).await;
                    debug!("Timer poll: {}", outcome.label());

                    let current = self.settings().tick;
                    if current != tick {
                        tick = current;
                        ticker = tokio::time::interval_at(Instant::now() + tick, tick);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
            }
        }

        if let Some(listener) = listener {
            let _ = listener.await;
        }
        info!("Poll scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::inventory::TabInventory;
    use crate::login::parse_logins;
    use crate::registry::ManagedTabRegistry;
    use crate::resolver::Resolution;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct StaticResolver(Vec<Login>);

    #[async_trait]
    impl LiveResolver for StaticResolver {
        async fn resolve(&self, _request: &LiveRequest) -> Resolution {
            Resolution {
                logins: self.0.clone(),
                source: Some("static".to_string()),
            }
        }
    }

    /// Blocks inside resolution until released.
    struct GateResolver {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl LiveResolver for GateResolver {
        async fn resolve(&self, _request: &LiveRequest) -> Resolution {
            self.started.notify_one();
            self.release.notified().await;
            Resolution::empty()
        }
    }

    fn scheduler_with(
        host: Arc<MemoryHost>,
        resolver: Arc<dyn LiveResolver>,
        settings: PollSettings,
    ) -> Arc<PollScheduler> {
        let engine = ReconciliationEngine::new(
            host,
            TabInventory::default(),
            ManagedTabRegistry::default(),
        );
        Arc::new(PollScheduler::new(engine, resolver, settings))
    }

    fn settings(follows: &[&str]) -> PollSettings {
        PollSettings {
            follows: parse_logins(follows),
            ..Default::default()
        }
    }

    // ── Settings ────────────────────────────────────────────────────────

    #[test]
    fn test_settings_are_clamped() {
        let settings = PollSettings {
            max_tabs: 0,
            tab_limit: 0,
            check_interval: Duration::from_secs(1),
            force_wait: Duration::ZERO,
            tick: Duration::ZERO,
            ..Default::default()
        }
        .clamped();
        assert_eq!(settings.max_tabs, 1);
        assert_eq!(settings.tab_limit, 1);
        assert_eq!(settings.check_interval, MIN_CHECK_INTERVAL);
        assert_eq!(settings.force_wait, MIN_FORCE_WAIT);
        assert_eq!(settings.tick, MIN_TICK);
    }

    // ── Triggers ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_interval_guard_skips_timer_but_not_forced() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice"])));
        let scheduler = scheduler_with(host.clone(), resolver, settings(&["alice"]));

        assert!(scheduler.trigger(Trigger::Timer).await.ran());
        assert_eq!(host.opened(), vec!["https://www.twitch.tv/alice".to_string()]);
        assert_eq!(
            scheduler.trigger(Trigger::Timer).await,
            PollOutcome::SkippedInterval
        );
        assert!(scheduler.trigger(Trigger::Forced).await.ran());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(scheduler.trigger(Trigger::Timer).await.ran());
        assert_eq!(host.opened().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_cycle_does_not_delay_timer() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice"])));
        let scheduler = scheduler_with(host, resolver, settings(&["alice"]));

        assert!(scheduler.trigger(Trigger::Timer).await.ran());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(scheduler.trigger(Trigger::Forced).await.ran());
        assert!(scheduler.trigger(Trigger::Timer).await.ran());
        assert_eq!(
            scheduler.trigger(Trigger::Timer).await,
            PollOutcome::SkippedInterval
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_cycle_survives_dropped_caller() {
        let host = Arc::new(MemoryHost::new());
        let gate = Arc::new(GateResolver {
            started: Notify::new(),
            release: Notify::new(),
        });
        let scheduler = scheduler_with(host, gate.clone(), PollSettings::default());

        let caller = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.trigger_detached(Trigger::Forced).await })
        };
        gate.started.notified().await;
        caller.abort();
        let _ = caller.await;
        assert!(scheduler.is_busy());

        gate.release.notify_one();
        for _ in 0..50 {
            if !scheduler.is_busy() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!scheduler.is_busy());
        assert_eq!(scheduler.metrics().snapshot().cycles.run, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_flag_deflects_reentrant_triggers() {
        let host = Arc::new(MemoryHost::new());
        let gate = Arc::new(GateResolver {
            started: Notify::new(),
            release: Notify::new(),
        });
        let scheduler = scheduler_with(host, gate.clone(), PollSettings::default());

        let running = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.trigger(Trigger::Forced).await })
        };
        gate.started.notified().await;
        assert!(scheduler.is_busy());

        assert_eq!(scheduler.trigger(Trigger::Timer).await, PollOutcome::SkippedBusy);
        assert_eq!(scheduler.trigger(Trigger::Forced).await, PollOutcome::StillBusy);

        gate.release.notify_one();
        assert!(running.await.unwrap().ran());
        assert!(!scheduler.is_busy());

        let metrics = scheduler.metrics().snapshot();
        assert_eq!(metrics.cycles.run, 1);
        assert_eq!(metrics.cycles.skipped_busy, 1);
        assert_eq!(metrics.cycles.forced_timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_trigger_waits_for_running_cycle() {
        let host = Arc::new(MemoryHost::new());
        let gate = Arc::new(GateResolver {
            started: Notify::new(),
            release: Notify::new(),
        });
        let scheduler = scheduler_with(host, gate.clone(), PollSettings::default());

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.trigger(Trigger::Forced).await })
        };
        gate.started.notified().await;

        let second = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.trigger(Trigger::Forced).await })
        };
        tokio::time::sleep(Duration::from_secs(2)).await;
        gate.release.notify_one();
        assert!(first.await.unwrap().ran());

        // The second cycle blocks on the gate too once it acquires the flag.
        gate.started.notified().await;
        gate.release.notify_one();
        assert!(second.await.unwrap().ran());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_nothing() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice"])));
        let scheduler = scheduler_with(host.clone(), resolver, settings(&["alice"]));

        assert!(!scheduler.toggle());
        assert_eq!(scheduler.trigger(Trigger::Forced).await, PollOutcome::Disabled);
        assert!(host.opened().is_empty());

        scheduler.set_enabled(true);
        assert!(scheduler.trigger(Trigger::Forced).await.ran());
    }

    // ── Cycle contents ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_blocklisted_channels_are_not_opened() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice", "bob"])));
        let scheduler = scheduler_with(
            host.clone(),
            resolver,
            PollSettings {
                blocklist: parse_logins(["bob"]),
                ..settings(&["alice", "bob"])
            },
        );

        scheduler.trigger(Trigger::Forced).await;
        assert_eq!(host.opened(), vec!["https://www.twitch.tv/alice".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_close_failures_reach_metrics() {
        let host = Arc::new(MemoryHost::new());
        let stuck = host.insert_tab("https://www.twitch.tv/alice");
        host.insert_tab("https://www.twitch.tv/bob");
        host.set_last_accessed(&stuck, Utc::now() - chrono::TimeDelta::seconds(300));
        host.fail_closes_of(&stuck);
        let resolver = Arc::new(StaticResolver(Vec::new()));
        let scheduler = scheduler_with(
            host.clone(),
            resolver,
            PollSettings {
                max_tabs: 1,
                tab_limit: 1,
                ..settings(&["alice", "bob"])
            },
        );

        let outcome = scheduler.trigger(Trigger::Forced).await;
        assert!(matches!(outcome, PollOutcome::Ran { closed: 0, .. }));
        let tabs = scheduler.metrics().snapshot().tabs;
        assert_eq!(tabs.close_failures, 1);
        assert_eq!(tabs.closed, 0);
        assert_eq!(host.tabs().len(), 2);
    }

    #[tokio::test]
    async fn test_diagnostics_reflect_last_cycle() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice", "bob"])));
        let scheduler = scheduler_with(
            host,
            resolver,
            PollSettings {
                max_tabs: 3,
                ..settings(&["alice", "bob"])
            },
        );

        scheduler.trigger(Trigger::Forced).await;
        let diag = scheduler.diagnostics();
        assert!(diag.enabled);
        assert_eq!(diag.live_count, 2);
        assert_eq!(diag.open_count, 2);
        assert_eq!(diag.capacity, 1);
        assert_eq!(diag.source.as_deref(), Some("static"));
        assert_eq!(diag.tabs.len(), 2);
        assert!(diag.tabs.iter().all(|t| t.created_by_manager));
        assert_eq!(diag.recent.last().map(|e| e.kind.as_str()), Some("poll"));
    }

    #[tokio::test]
    async fn test_reload_swaps_settings() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice", "bob"])));
        let scheduler = scheduler_with(host.clone(), resolver, settings(&["alice", "bob"]));

        scheduler.trigger(Trigger::Forced).await;
        assert_eq!(host.tabs().len(), 2);

        scheduler.update_settings(PollSettings {
            max_tabs: 1,
            ..settings(&["alice", "bob"])
        });
        scheduler.trigger(Trigger::Forced).await;
        assert_eq!(host.tabs().len(), 1);
        assert_eq!(scheduler.diagnostics().open_count, 1);
    }

    #[tokio::test]
    async fn test_removal_events_purge_registry() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Arc::new(StaticResolver(parse_logins(["alice"])));
        let scheduler = scheduler_with(host.clone(), resolver, settings(&["alice"]));
        let cancel = CancellationToken::new();
        let listener = scheduler
            .spawn_removal_listener(cancel.clone())
            .expect("memory host emits removals");

        scheduler.trigger(Trigger::Forced).await;
        let tab = host.tabs()[0].id.clone();
        host.remove_tab(&tab);

        let mut purged = false;
        for _ in 0..50 {
            if scheduler.engine.lock().await.registry().is_empty() {
                purged = true;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(purged);

        cancel.cancel();
        listener.await.unwrap();
    }
}
