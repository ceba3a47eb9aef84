use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use tab_reconciler::{Login, PollSettings, SitePattern, parse_logins};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [poll]
//                    max_tabs = 6
//
//   env var:         LIVETABS_POLL__MAX_TABS=6   (double underscore = nesting)
//
//   (single underscore stays within field names: LIVETABS_LIVE__WEB_TOKEN)

const REDACTED: &str = "***";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub poll: PollFileConfig,
    #[serde(default)]
    pub channels: ChannelsFileConfig,
    #[serde(default)]
    pub live: LiveFileConfig,
    #[serde(default)]
    pub browser: BrowserFileConfig,
    #[serde(default)]
    pub control: ControlFileConfig,
}

/// Poll loop tunables (lives under `[poll]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollFileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_interval_sec")]
    pub check_interval_sec: u64,
    #[serde(default = "default_tick_sec")]
    pub tick_sec: u64,
    #[serde(default = "default_force_wait_sec")]
    pub force_wait_sec: u64,
    /// Signed so that a negative value clamps instead of failing the load.
    #[serde(default = "default_max_tabs")]
    pub max_tabs: i64,
    /// Cap on all channel tabs, managed or not. Defaults to `max_tabs`.
    #[serde(default)]
    pub total_tab_limit: Option<i64>,
    #[serde(default = "default_unfollowed_grace_sec")]
    pub unfollowed_grace_sec: u64,
}

impl Default for PollFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_sec: default_check_interval_sec(),
            tick_sec: default_tick_sec(),
            force_wait_sec: default_force_wait_sec(),
            max_tabs: default_max_tabs(),
            total_tab_limit: None,
            unfollowed_grace_sec: default_unfollowed_grace_sec(),
        }
    }
}

/// Channel lists (lives under `[channels]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelsFileConfig {
    #[serde(default)]
    pub follows: Vec<String>,
    /// Extra follows, one login per line. Relative paths resolve against the
    /// data directory.
    #[serde(default)]
    pub follows_file: Option<PathBuf>,
    #[serde(default)]
    pub priority: Vec<String>,
    /// Live channels that are never opened.
    #[serde(default)]
    pub blocklist: Vec<String>,
}

/// Live detection (lives under `[live]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiveFileConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Helix app or user token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Web session OAuth token used by the GQL source.
    #[serde(default)]
    pub web_token: Option<String>,
    /// Cookie header for the following-directory scrape.
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    #[serde(default = "default_probe_limit")]
    pub probe_limit: usize,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

impl Default for LiveFileConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            client_id: None,
            access_token: None,
            web_token: None,
            cookie: None,
            probe_concurrency: default_probe_concurrency(),
            probe_limit: default_probe_limit(),
            request_timeout_sec: default_request_timeout_sec(),
        }
    }
}

/// Browser connection (lives under `[browser]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowserFileConfig {
    #[serde(default = "default_devtools_url")]
    pub devtools_url: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Open tabs without bringing them to the front.
    #[serde(default = "default_true")]
    pub background: bool,
}

impl Default for BrowserFileConfig {
    fn default() -> Self {
        Self {
            devtools_url: default_devtools_url(),
            site_url: default_site_url(),
            background: true,
        }
    }
}

/// Control server (lives under `[control]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlFileConfig {
    #[serde(default = "default_control_host")]
    pub host: String,
    #[serde(default = "default_control_port")]
    pub port: u16,
}

impl Default for ControlFileConfig {
    fn default() -> Self {
        Self {
            host: default_control_host(),
            port: default_control_port(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_check_interval_sec() -> u64 {
    60
}
fn default_tick_sec() -> u64 {
    15
}
fn default_force_wait_sec() -> u64 {
    30
}
fn default_max_tabs() -> i64 {
    4
}
fn default_unfollowed_grace_sec() -> u64 {
    60
}
fn default_sources() -> Vec<String> {
    ["gql", "helix", "page_probe", "following_html"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_probe_concurrency() -> usize {
    8
}
fn default_probe_limit() -> usize {
    60
}
fn default_request_timeout_sec() -> u64 {
    10
}
fn default_devtools_url() -> String {
    "http://127.0.0.1:9222".to_string()
}
fn default_site_url() -> String {
    "https://www.twitch.tv/".to_string()
}
fn default_control_host() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port() -> u16 {
    7878
}

impl FileConfig {
    /// Copy with every secret replaced, safe to echo back to clients.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [
            &mut copy.live.client_id,
            &mut copy.live.access_token,
            &mut copy.live.web_token,
            &mut copy.live.cookie,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

/// Build a figment that layers: defaults → config.toml → LIVETABS_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `LIVETABS_POLL__MAX_TABS=6`  →  `poll.max_tabs = 6`
///   `LIVETABS_BROWSER__DEVTOOLS_URL=http://127.0.0.1:9333`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("LIVETABS_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the daemon)
// =============================================================================

/// Live source kinds, in the order the chain should try them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Helix,
    Gql,
    PageProbe,
    FollowingHtml,
}

impl SourceKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "helix" => Some(Self::Helix),
            "gql" => Some(Self::Gql),
            "page_probe" | "probe" => Some(Self::PageProbe),
            "following_html" | "html" => Some(Self::FollowingHtml),
            _ => None,
        }
    }
}

/// Live detection configuration (runtime view).
#[derive(Clone, Debug)]
pub struct LiveConfig {
    pub sources: Vec<SourceKind>,
    pub client_id: Option<String>,
    pub access_token: Option<String>,
    pub web_token: Option<String>,
    pub cookie: Option<String>,
    pub probe_concurrency: usize,
    pub probe_limit: usize,
    pub request_timeout: Duration,
}

impl LiveConfig {
    pub fn from_file(fc: &LiveFileConfig) -> Self {
        let mut sources = Vec::new();
        for raw in &fc.sources {
            match SourceKind::parse(raw) {
                Some(kind) if !sources.contains(&kind) => sources.push(kind),
                Some(_) => {}
                None => warn!("Ignoring unknown live source {:?}", raw),
            }
        }
        if sources.is_empty() {
            sources = default_sources()
                .iter()
                .filter_map(|s| SourceKind::parse(s))
                .collect();
        }

        let non_empty = |value: &Option<String>| value.clone().filter(|s| !s.trim().is_empty());
        Self {
            sources,
            client_id: non_empty(&fc.client_id),
            access_token: non_empty(&fc.access_token),
            web_token: non_empty(&fc.web_token),
            cookie: non_empty(&fc.cookie),
            probe_concurrency: fc.probe_concurrency.max(1),
            probe_limit: fc.probe_limit.max(1),
            request_timeout: Duration::from_secs(fc.request_timeout_sec.max(1)),
        }
    }
}

/// Browser configuration (runtime view).
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub devtools_url: Url,
    pub site: SitePattern,
    pub background: bool,
}

impl BrowserConfig {
    pub fn from_file(fc: &BrowserFileConfig) -> Result<Self> {
        let devtools_url = Url::parse(&fc.devtools_url)
            .with_context(|| format!("Invalid browser.devtools_url: {:?}", fc.devtools_url))?;
        let site = SitePattern::new(&fc.site_url)
            .with_context(|| format!("Invalid browser.site_url: {:?}", fc.site_url))?;
        Ok(Self {
            devtools_url,
            site,
            background: fc.background,
        })
    }
}

/// Control server address (runtime view).
#[derive(Clone, Debug)]
pub struct ControlConfig {
    pub host: String,
    pub port: u16,
}

impl ControlConfig {
    pub fn from_file(fc: &ControlFileConfig) -> Self {
        Self {
            host: fc.host.clone(),
            port: fc.port,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Read a follows file: one login per line, `#` starts a comment, commas and
/// whitespace also separate entries.
pub fn read_follows_file(path: &Path) -> Result<Vec<Login>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read follows file: {:?}", path))?;
    let raw = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|s| !s.is_empty());
    Ok(parse_logins(raw))
}

/// Derive scheduler settings, applying clamps and merging the follows file.
/// A missing or unreadable follows file is logged and skipped.
pub fn poll_settings_from_file(fc: &FileConfig, data_dir: &Path) -> PollSettings {
    let poll = &fc.poll;
    let max_tabs = poll.max_tabs.max(1) as usize;
    let tab_limit = poll
        .total_tab_limit
        .map(|limit| limit.max(1) as usize)
        .unwrap_or(max_tabs);

    let mut follows: Vec<String> = fc.channels.follows.clone();
    if let Some(path) = &fc.channels.follows_file {
        let path = if path.is_relative() {
            data_dir.join(path)
        } else {
            path.clone()
        };
        match read_follows_file(&path) {
            Ok(extra) => follows.extend(extra.into_iter().map(String::from)),
            Err(e) => warn!("{:#}", e),
        }
    }

    PollSettings {
        enabled: poll.enabled,
        check_interval: Duration::from_secs(poll.check_interval_sec),
        tick: Duration::from_secs(poll.tick_sec),
        force_wait: Duration::from_secs(poll.force_wait_sec),
        max_tabs,
        tab_limit,
        unfollowed_grace: Duration::from_secs(poll.unfollowed_grace_sec),
        follows: parse_logins(&follows),
        priority: parse_logins(&fc.channels.priority),
        blocklist: parse_logins(&fc.channels.blocklist),
    }
    .clamped()
}

/// Everything the daemon needs, resolved from one figment pass.
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub file: FileConfig,
    pub poll: PollSettings,
    pub live: LiveConfig,
    pub browser: BrowserConfig,
    pub control: ControlConfig,
}

impl ResolvedConfig {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let file: FileConfig = load_config(data_dir)
            .extract()
            .context("Failed to load configuration")?;
        Self::from_file(file, data_dir)
    }

    pub fn from_file(file: FileConfig, data_dir: &Path) -> Result<Self> {
        Ok(Self {
            poll: poll_settings_from_file(&file, data_dir),
            live: LiveConfig::from_file(&file.live),
            browser: BrowserConfig::from_file(&file.browser)?,
            control: ControlConfig::from_file(&file.control),
            file,
        })
    }
}

// =============================================================================
// Directory layout config (not tunable via figment, derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct LiveTabsConfig {
    pub data_dir: PathBuf,
}

impl LiveTabsConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".livetabs"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let state_dir = data_dir.join("state");
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create state directory: {:?}", state_dir))?;

        debug!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir })
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir().join("registry.json")
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn load(&self) -> Result<ResolvedConfig> {
        ResolvedConfig::load(&self.data_dir)
    }
}
