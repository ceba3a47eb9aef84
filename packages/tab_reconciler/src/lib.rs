//! Tab Reconciler - keeps browser tabs in step with live followed channels
//!
//! This crate decides which channel tabs to open, keep and close given a
//! live-channel set, a priority list, a capacity and the real state of the
//! browser. It has no HTTP dependencies: the browser is reached through the
//! [`TabHost`] trait and live detection through [`LiveResolver`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tab_reconciler::{
//!     ManagedTabRegistry, MemoryHost, PollScheduler, PollSettings, ReconciliationEngine,
//!     ResolverChain, TabInventory, Trigger, parse_logins,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = Arc::new(MemoryHost::new());
//!     let engine = ReconciliationEngine::new(
//!         host,
//!         TabInventory::default(),
//!         ManagedTabRegistry::default(),
//!     );
//!     let settings = PollSettings {
//!         follows: parse_logins(["alice", "bob"]),
//!         ..Default::default()
//!     };
//!     let scheduler = PollScheduler::new(engine, Arc::new(ResolverChain::default()), settings);
//!
//!     let outcome = scheduler.trigger(Trigger::Forced).await;
//!     println!("{:?}", outcome);
//! }
//! ```

pub mod classify;
pub mod diagnostics;
pub mod engine;
mod error;
pub mod host;
pub mod inventory;
mod login;
pub mod registry;
pub mod resolver;
pub mod scheduler;

pub use classify::{SitePattern, UrlClass};
pub use diagnostics::{ActivityEntry, ActivityLog, MetricsSnapshot, PollMetrics};
pub use engine::{
    CloseReason, CycleInput, CycleReport, OpenTabRecord, ReconcilePlan, ReconcileReport,
    ReconciliationEngine, SweepReport,
};
pub use error::{EngineError, RegistryError, StoreError, TabError};
pub use host::{HostTab, MemoryHost, TabHost, TabId};
pub use inventory::{SiteTab, TabInventory, TabSnapshot};
pub use login::{Login, parse_logins};
pub use registry::{ManagedEntry, ManagedTabRegistry, RegistryEntries, RegistryStore};
pub use resolver::{LiveRequest, LiveResolver, LiveSource, Resolution, ResolverChain};
pub use scheduler::{DiagnosticsSnapshot, PollOutcome, PollScheduler, PollSettings, Trigger};
