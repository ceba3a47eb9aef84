use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::classify::{SitePattern, UrlClass};
use crate::error::TabError;
use crate::host::{TabHost, TabId};
use crate::login::Login;

/// A site-matching open tab with its classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteTab {
    pub id: TabId,
    pub url: String,
    pub class: UrlClass,
    pub last_accessed: Option<DateTime<Utc>>,
    pub audible: bool,
}

impl SiteTab {
    pub fn login(&self) -> Option<&Login> {
        self.class.login()
    }
}

/// Point-in-time view of the site's open tabs.
#[derive(Clone, Debug, Default)]
pub struct TabSnapshot {
    pub tabs: Vec<SiteTab>,
}

impl TabSnapshot {
    pub fn get(&self, id: &TabId) -> Option<&SiteTab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    /// Tabs that resolve to a channel login (ignored paths excluded).
    pub fn channel_tabs(&self) -> impl Iterator<Item = &SiteTab> {
        self.tabs.iter().filter(|t| t.login().is_some())
    }

    /// Channel tabs grouped by login, in browser order.
    pub fn by_login(&self) -> HashMap<&Login, Vec<&SiteTab>> {
        let mut grouped: HashMap<&Login, Vec<&SiteTab>> = HashMap::new();
        for tab in self.tabs.iter() {
            if let Some(login) = tab.login() {
                grouped.entry(login).or_default().push(tab);
            }
        }
        grouped
    }

    pub fn channel_count(&self) -> usize {
        self.channel_tabs().count()
    }
}

/// Reads the browser's tab list and classifies it against the site.
///
/// Never cached: every call re-queries the host.
#[derive(Clone, Debug, Default)]
pub struct TabInventory {
    site: SitePattern,
}

impl TabInventory {
    pub fn new(site: SitePattern) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &SitePattern {
        &self.site
    }

    pub async fn snapshot(&self, host: &dyn TabHost) -> Result<TabSnapshot, TabError> {
        let tabs = host
            .query()
            .await?
            .into_iter()
            .filter_map(|tab| {
                let class = self.site.classify(&tab.url);
                class.is_site().then(|| SiteTab {
                    id: tab.id,
                    url: tab.url,
                    class,
                    last_accessed: tab.last_accessed,
                    audible: tab.audible,
                })
            })
            .collect();
        Ok(TabSnapshot { tabs })
    }
}
