//! Live-channel resolution.
//!
//! A [`LiveResolver`] never fails: total failure resolves to an empty set so
//! the engine treats "unknown" as "nothing live". [`ResolverChain`] tries
//! ordered [`LiveSource`]s and falls back on error or an empty answer.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::login::{Login, parse_logins};

/// What a resolver is asked each cycle.
#[derive(Clone, Debug, Default)]
pub struct LiveRequest {
    pub follows: Vec<Login>,
    pub priority: Vec<Login>,
    /// How many live hits are worth finding (the tab capacity).
    pub capacity_hint: usize,
}

impl LiveRequest {
    /// Priority first, then the rest of the follow list, deduplicated.
    pub fn ordered_candidates(&self) -> Vec<Login> {
        parse_logins(
            self.priority
                .iter()
                .chain(self.follows.iter())
                .map(Login::as_str),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub logins: Vec<Login>,
    /// Label of the source that answered, `None` when every source came up
    /// empty.
    pub source: Option<String>,
}

impl Resolution {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One strategy for finding live channels. Errors are expected and cheap.
#[async_trait]
pub trait LiveSource: Send + Sync {
    fn label(&self) -> &str;

    async fn live_logins(&self, request: &LiveRequest) -> anyhow::Result<Vec<Login>>;
}

#[async_trait]
pub trait LiveResolver: Send + Sync {
    async fn resolve(&self, request: &LiveRequest) -> Resolution;
}

/// Ordered fallback over several sources.
#[derive(Default)]
pub struct ResolverChain {
    sources: Vec<Box<dyn LiveSource>>,
}

impl ResolverChain {
    pub fn new(sources: Vec<Box<dyn LiveSource>>) -> Self {
        Self { sources }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.label()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl LiveResolver for ResolverChain {
    async fn resolve(&self, request: &LiveRequest) -> Resolution {
        for source in &self.sources {
            match source.live_logins(request).await {
                Ok(logins) if !logins.is_empty() => {
                    let logins = parse_logins(logins.iter().map(Login::as_str));
                    debug!("{} reported {} live channels", source.label(), logins.len());
                    return Resolution {
                        logins,
                        source: Some(source.label().to_string()),
                    };
                }
                Ok(_) => debug!("{} reported nothing live, falling back", source.label()),
                Err(e) => warn!("Live source {} failed: {:#}", source.label(), e),
            }
        }
        Resolution::empty()
    }
}
