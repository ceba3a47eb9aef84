//! HTTP live-channel sources.
//!
//! Each source implements [`LiveSource`] and is chained by
//! [`build_resolver`] in the configured order. Sources report failures as
//! errors; the chain turns those into a fallback to the next source.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, info, warn};

use tab_reconciler::{
    LiveRequest, LiveResolver, LiveSource, Login, Resolution, ResolverChain, SitePattern,
    parse_logins,
};

use crate::config::{LiveConfig, SourceKind};

pub const HELIX_STREAMS_URL: &str = "https://api.twitch.tv/helix/streams";
pub const GQL_URL: &str = "https://gql.twitch.tv/gql";

/// Public client id the web player uses for GQL.
const GQL_WEB_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";
const GQL_FOLLOWING_LIVE_HASH: &str =
    "9b7b2bb4a8c2d0b70e6d1c4a7dfd2ef9f6ca2b1fb6dcd2c8b9392a9a9a9a9a9a";
const HELIX_BATCH: usize = 100;
const FOLLOWING_LIVE_PATH: &str = "directory/following/live";
const USER_AGENT: &str = concat!("livetabs/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Response parsing
// =============================================================================

fn live_flag_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#""isLiveBroadcast"\s*:\s*true"#,
            r#""isLive"\s*:\s*true"#,
            r#"(?i)"stream"\s*:\s*\{[^}]*"type"\s*:\s*"live""#,
            r#"(?i)"videoPlayerState"\s*:\s*\{[^}]*"isLive"\s*:\s*true"#,
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn following_login_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)"broadcaster[_-]?login"\s*:\s*"([^"]+)""#,
            r#"(?i)data-channel-login="([^"]+)""#,
            r#"(?i)"login"\s*:\s*"([^"]+)"\s*,\s*"isLiveBroadcast"\s*:\s*true"#,
            r#"(?i)"user[_-]?login"\s*:\s*"([^"]+)""#,
            r#"(?i)<a[^>]+href="/([a-z0-9_]+)"[^>]+data-test-selector="ChannelLink"[^>]*>"#,
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

/// Whether a channel page's markup carries any live marker.
pub fn page_is_live(html: &str) -> bool {
    live_flag_patterns().iter().any(|re| re.is_match(html))
}

/// Logins found on the following-live directory page, in first-seen order.
/// Captures that land on site-owned paths are dropped.
pub fn extract_following_logins(html: &str, site: &SitePattern) -> Vec<Login> {
    let mut raw = Vec::new();
    for re in following_login_patterns() {
        for caps in re.captures_iter(html) {
            if let Some(m) = caps.get(1) {
                raw.push(m.as_str().to_string());
            }
        }
    }
    parse_logins(raw)
        .into_iter()
        .filter(|login| site.classify(&site.channel_url(login)).login() == Some(login))
        .collect()
}

#[derive(Debug, Deserialize)]
struct HelixStreams {
    #[serde(default)]
    data: Vec<HelixStream>,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    #[serde(default)]
    user_login: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
}

/// Logins in a Helix `streams` response. `user_name` stands in when
/// `user_login` is missing.
pub fn parse_helix_streams(body: &Value) -> Result<Vec<Login>> {
    let streams: HelixStreams =
        serde_json::from_value(body.clone()).context("Unexpected Helix streams payload")?;
    Ok(parse_logins(
        streams
            .data
            .into_iter()
            .filter_map(|s| s.user_login.or(s.user_name)),
    ))
}

/// Logins in a `FollowingLive` GQL response. The API answers batched queries
/// with an array; only the first result matters.
pub fn parse_gql_following(body: &Value) -> Result<Vec<Login>> {
    let first = match body {
        Value::Array(items) => items.first().context("Empty GQL response")?,
        other => other,
    };
    match first.get("errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => {
            bail!("GQL returned errors: {}", Value::Array(errors.clone()))
        }
        _ => {}
    }

    let data = first.get("data").context("GQL response has no data")?;
    let edges = data
        .pointer("/followedLiveUsers/edges")
        .or_else(|| data.pointer("/user/following/live/edges"))
        .and_then(Value::as_array)
        .context("GQL response has no live edges")?;

    Ok(parse_logins(edges.iter().filter_map(|edge| {
        let node = edge.get("node")?;
        ["login", "displayName", "id"]
            .into_iter()
            .find_map(|key| node.get(key).and_then(Value::as_str))
    })))
}

// =============================================================================
// Sources
// =============================================================================

/// Helix `streams` lookup for the candidate list, 100 logins per request.
pub struct HelixSource {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    access_token: String,
}

impl HelixSource {
    pub fn new(client: reqwest::Client, client_id: String, access_token: String) -> Self {
        Self {
            client,
            endpoint: HELIX_STREAMS_URL.to_string(),
            client_id,
            access_token,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch_batch(&self, batch: &[Login]) -> Result<Vec<Login>> {
        let query: Vec<(&str, &str)> = batch.iter().map(|l| ("user_login", l.as_str())).collect();
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Helix request failed")?
            .error_for_status()
            .context("Helix request rejected")?;
        let body: Value = resp.json().await.context("Helix response is not JSON")?;
        parse_helix_streams(&body)
    }
}

#[async_trait]
impl LiveSource for HelixSource {
    fn label(&self) -> &str {
        "helix"
    }

    async fn live_logins(&self, request: &LiveRequest) -> Result<Vec<Login>> {
        let candidates = request.ordered_candidates();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut live = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;
        for batch in candidates.chunks(HELIX_BATCH) {
            match self.fetch_batch(batch).await {
                Ok(found) => {
                    succeeded += 1;
                    live.extend(found);
                }
                Err(e) => {
                    warn!("Helix batch of {} failed: {:#}", batch.len(), e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(live),
        }
    }
}

/// Web GQL `FollowingLive` query with the user's web token.
pub struct GqlSource {
    client: reqwest::Client,
    endpoint: String,
    web_token: String,
}

impl GqlSource {
    pub fn new(client: reqwest::Client, web_token: String) -> Self {
        Self {
            client,
            endpoint: GQL_URL.to_string(),
            web_token,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl LiveSource for GqlSource {
    fn label(&self) -> &str {
        "gql"
    }

    async fn live_logins(&self, _request: &LiveRequest) -> Result<Vec<Login>> {
        let body = json!([{
            "operationName": "FollowingLive",
            "variables": { "limit": 100 },
            "extensions": {
                "persistedQuery": { "version": 1, "sha256Hash": GQL_FOLLOWING_LIVE_HASH }
            }
        }]);
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Client-Id", GQL_WEB_CLIENT_ID)
            .header("Authorization", format!("OAuth {}", self.web_token))
            .json(&body)
            .send()
            .await
            .context("GQL request failed")?
            .error_for_status()
            .context("GQL request rejected")?;
        let body: Value = resp.json().await.context("GQL response is not JSON")?;
        parse_gql_following(&body)
    }
}

/// Fetches channel pages directly, priority channels first, and stops once
/// enough live channels were found to fill every slot.
pub struct PageProbeSource {
    client: reqwest::Client,
    site: SitePattern,
    concurrency: usize,
    limit: usize,
}

impl PageProbeSource {
    pub fn new(client: reqwest::Client, site: SitePattern, concurrency: usize, limit: usize) -> Self {
        Self {
            client,
            site,
            concurrency: concurrency.max(1),
            limit: limit.max(1),
        }
    }

    async fn probe(&self, login: &Login) -> Result<bool> {
        let html = self
            .client
            .get(self.site.channel_url(login))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(page_is_live(&html))
    }
}

#[async_trait]
impl LiveSource for PageProbeSource {
    fn label(&self) -> &str {
        "page_probe"
    }

    async fn live_logins(&self, request: &LiveRequest) -> Result<Vec<Login>> {
        let candidates = request.ordered_candidates();
        let hard_cap = self.limit.min(candidates.len());
        if hard_cap == 0 {
            return Ok(Vec::new());
        }
        let target = request.capacity_hint.min(hard_cap).max(1);

        let mut results = futures::stream::iter(candidates.into_iter().take(hard_cap))
            .map(|login| async move {
                let live = self.probe(&login).await;
                (login, live)
            })
            .buffered(self.concurrency);

        let mut live = Vec::new();
        let mut probed = 0usize;
        while let Some((login, result)) = results.next().await {
            probed += 1;
            match result {
                Ok(true) => {
                    live.push(login);
                    if live.len() >= target {
                        break;
                    }
                }
                Ok(false) => {}
                Err(e) => debug!("Probe of {} failed: {:#}", login, e),
            }
        }
        debug!("Probed {} channel pages, {} live", probed, live.len());
        Ok(live)
    }
}

/// Scrapes the signed-in following-live directory page.
pub struct FollowingHtmlSource {
    client: reqwest::Client,
    site: SitePattern,
    url: String,
    cookie: Option<String>,
}

impl FollowingHtmlSource {
    pub fn new(client: reqwest::Client, site: SitePattern, cookie: Option<String>) -> Self {
        let url = format!("{}{}", site.base_url(), FOLLOWING_LIVE_PATH);
        Self {
            client,
            site,
            url,
            cookie,
        }
    }
}

#[async_trait]
impl LiveSource for FollowingHtmlSource {
    fn label(&self) -> &str {
        "following_html"
    }

    async fn live_logins(&self, request: &LiveRequest) -> Result<Vec<Login>> {
        let mut req = self.client.get(&self.url);
        if let Some(cookie) = &self.cookie {
            req = req.header(reqwest::header::COOKIE, cookie);
        }
        let html = req
            .send()
            .await
            .context("Following page request failed")?
            .error_for_status()
            .context("Following page request rejected")?
            .text()
            .await?;

        let found = extract_following_logins(&html, &self.site);
        let candidates: HashSet<Login> = request.ordered_candidates().into_iter().collect();
        if candidates.is_empty() {
            return Ok(found);
        }
        Ok(found.into_iter().filter(|l| candidates.contains(l)).collect())
    }
}

// =============================================================================
// Chain construction
// =============================================================================

/// Resolver whose chain can be swapped on reload while cycles keep running.
pub struct SharedResolver {
    chain: RwLock<Arc<ResolverChain>>,
}

impl SharedResolver {
    pub fn new(chain: ResolverChain) -> Self {
        Self {
            chain: RwLock::new(Arc::new(chain)),
        }
    }

    pub fn replace(&self, chain: ResolverChain) {
        let mut guard = self.chain.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(chain);
    }

    pub fn labels(&self) -> Vec<String> {
        self.current().labels().into_iter().map(String::from).collect()
    }

    fn current(&self) -> Arc<ResolverChain> {
        self.chain.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LiveResolver for SharedResolver {
    async fn resolve(&self, request: &LiveRequest) -> Resolution {
        let chain = self.current();
        chain.resolve(request).await
    }
}

/// Build the fallback chain in configured order. Sources whose credentials
/// are missing are skipped.
pub fn build_resolver(live: &LiveConfig, site: &SitePattern) -> Result<ResolverChain> {
    let client = reqwest::Client::builder()
        .timeout(live.request_timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let mut sources: Vec<Box<dyn LiveSource>> = Vec::new();
    for kind in &live.sources {
        match kind {
            SourceKind::Helix => match (&live.client_id, &live.access_token) {
                (Some(id), Some(token)) => sources.push(Box::new(HelixSource::new(
                    client.clone(),
                    id.clone(),
                    token.clone(),
                ))),
                _ => info!("Skipping helix source: client_id and access_token are required"),
            },
            SourceKind::Gql => match &live.web_token {
                Some(token) => sources.push(Box::new(GqlSource::new(client.clone(), token.clone()))),
                None => info!("Skipping gql source: web_token is not set"),
            },
            SourceKind::PageProbe => sources.push(Box::new(PageProbeSource::new(
                client.clone(),
                site.clone(),
                live.probe_concurrency,
                live.probe_limit,
            ))),
            SourceKind::FollowingHtml => sources.push(Box::new(FollowingHtmlSource::new(
                client.clone(),
                site.clone(),
                live.cookie.clone(),
            ))),
        }
    }

    let chain = ResolverChain::new(sources);
    info!("Live sources: {:?}", chain.labels());
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LiveFileConfig;
    use axum::{
        Json, Router,
        extract::{Path, RawQuery, State},
        http::StatusCode,
        routing::get,
    };
    use std::sync::{Arc, Mutex};

    fn names(logins: &[Login]) -> Vec<&str> {
        logins.iter().map(Login::as_str).collect()
    }

    fn request(follows: &[&str], priority: &[&str], capacity: usize) -> LiveRequest {
        LiveRequest {
            follows: parse_logins(follows),
            priority: parse_logins(priority),
            capacity_hint: capacity,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}/", port)
    }

    // ── parsing ─────────────────────────────────────────────────────────

    #[test]
    fn test_page_is_live_markers() {
        assert!(page_is_live(r#"{"isLiveBroadcast": true}"#));
        assert!(page_is_live(r#"..."isLive":true,..."#));
        assert!(page_is_live(r#""stream":{"id":"1","type":"live"}"#));
        assert!(page_is_live(r#""videoPlayerState":{"mode":"x","isLive" : true}"#));
        assert!(!page_is_live(r#"{"isLive": false, "stream": null}"#));
        assert!(!page_is_live("<html>offline</html>"));
    }

    #[test]
    fn test_extract_following_logins() {
        let site = SitePattern::default();
        let html = r#"
            <a data-test-selector="x" href="/ignored">
            <div data-channel-login="Alice"></div>
            {"broadcaster_login":"bob"}
            {"login":"carol","isLiveBroadcast":true}
            {"userLogin":"alice"}
            <a class="x" href="/dave" data-test-selector="ChannelLink">
            <a class="x" href="/directory" data-test-selector="ChannelLink">
            {"user_login":"not a login"}
        "#;
        let found = extract_following_logins(html, &site);
        assert_eq!(names(&found), vec!["bob", "alice", "carol", "dave"]);
    }

    #[test]
    fn test_parse_helix_streams() {
        let body = json!({
            "data": [
                {"user_login": "Alice", "user_name": "Alice"},
                {"user_name": "bob"},
                {"type": "live"}
            ],
            "pagination": {}
        });
        assert_eq!(names(&parse_helix_streams(&body).unwrap()), vec!["alice", "bob"]);
        assert!(parse_helix_streams(&json!({"data": "nope"})).is_err());
    }

    #[test]
    fn test_parse_gql_edges() {
        let batched = json!([{
            "data": {"followedLiveUsers": {"edges": [
                {"node": {"login": "alice"}},
                {"node": {"displayName": "Bob"}},
                {"node": {}}
            ]}}
        }]);
        assert_eq!(names(&parse_gql_following(&batched).unwrap()), vec!["alice", "bob"]);

        let nested = json!({
            "data": {"user": {"following": {"live": {"edges": [{"node": {"login": "carol"}}]}}}}
        });
        assert_eq!(names(&parse_gql_following(&nested).unwrap()), vec!["carol"]);
    }

    #[test]
    fn test_parse_gql_errors() {
        assert!(parse_gql_following(&json!([])).is_err());
        assert!(parse_gql_following(&json!({"data": {"user": null}})).is_err());
        let failed = json!([{"errors": [{"message": "PersistedQueryNotFound"}]}]);
        let err = parse_gql_following(&failed).unwrap_err();
        assert!(err.to_string().contains("PersistedQueryNotFound"));
    }

    // ── sources over HTTP ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_helix_batches_and_headers() {
        #[derive(Clone, Default)]
        struct Seen(Arc<Mutex<Vec<(usize, Option<String>)>>>);

        async fn streams(
            State(seen): State<Seen>,
            headers: axum::http::HeaderMap,
            RawQuery(q): RawQuery,
        ) -> Json<Value> {
            let q = q.unwrap_or_default();
            let count = q.matches("user_login=").count();
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            seen.0.lock().unwrap().push((count, auth));
            let live: Vec<Value> = if q.contains("user_login=ch0&") || q.ends_with("user_login=ch0")
            {
                vec![json!({"user_login": "ch0"})]
            } else {
                vec![]
            };
            Json(json!({ "data": live }))
        }

        let seen = Seen::default();
        let base = serve(
            Router::new()
                .route("/helix/streams", get(streams))
                .with_state(seen.clone()),
        )
        .await;

        let follows: Vec<String> = (0..150).map(|i| format!("ch{}", i)).collect();
        let req = LiveRequest {
            follows: parse_logins(&follows),
            priority: vec![],
            capacity_hint: 4,
        };
        let source = HelixSource::new(reqwest::Client::new(), "cid".into(), "tok".into())
            .with_endpoint(format!("{}helix/streams", base));
        let live = source.live_logins(&req).await.unwrap();
        assert_eq!(names(&live), vec!["ch0"]);

        let seen = seen.0.lock().unwrap();
        assert_eq!(seen.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![100, 50]);
        assert!(seen.iter().all(|(_, auth)| auth.as_deref() == Some("Bearer tok")));
    }

    #[tokio::test]
    async fn test_helix_total_failure_is_an_error() {
        let base = serve(Router::new().route(
            "/helix/streams",
            get(|| async { (StatusCode::UNAUTHORIZED, "nope") }),
        ))
        .await;
        let source = HelixSource::new(reqwest::Client::new(), "cid".into(), "bad".into())
            .with_endpoint(format!("{}helix/streams", base));
        assert!(source.live_logins(&request(&["alice"], &[], 4)).await.is_err());
    }

    #[tokio::test]
    async fn test_gql_posts_persisted_query() {
        async fn gql(headers: axum::http::HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
            if auth != Some("OAuth webtok") || body[0]["operationName"] != "FollowingLive" {
                return (StatusCode::BAD_REQUEST, Json(json!({})));
            }
            (
                StatusCode::OK,
                Json(json!([{"data": {"followedLiveUsers": {"edges": [{"node": {"login": "alice"}}]}}}])),
            )
        }

        let base = serve(Router::new().route("/gql", axum::routing::post(gql))).await;
        let source = GqlSource::new(reqwest::Client::new(), "webtok".into())
            .with_endpoint(format!("{}gql", base));
        let live = source.live_logins(&request(&[], &[], 4)).await.unwrap();
        assert_eq!(names(&live), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_page_probe_stops_at_target() {
        #[derive(Clone, Default)]
        struct Hits(Arc<Mutex<Vec<String>>>);

        async fn channel(State(hits): State<Hits>, Path(login): Path<String>) -> String {
            hits.0.lock().unwrap().push(login.clone());
            if login.starts_with("live") {
                r#"<script>{"isLiveBroadcast":true}</script>"#.to_string()
            } else {
                "<html></html>".to_string()
            }
        }

        let hits = Hits::default();
        let base = serve(
            Router::new()
                .route("/{login}", get(channel))
                .with_state(hits.clone()),
        )
        .await;
        let site = SitePattern::new(&base).unwrap();
        let source = PageProbeSource::new(reqwest::Client::new(), site, 1, 60);

        let req = request(&["off1", "live_b", "live_c", "off2"], &["live_a"], 2);
        let live = source.live_logins(&req).await.unwrap();
        assert_eq!(names(&live), vec!["live_a", "live_b"]);
        assert_eq!(*hits.0.lock().unwrap(), vec!["live_a", "off1", "live_b"]);
    }

    #[tokio::test]
    async fn test_page_probe_respects_limit() {
        let base = serve(Router::new().route("/{login}", get(|| async { "offline" }))).await;
        let site = SitePattern::new(&base).unwrap();
        let source = PageProbeSource::new(reqwest::Client::new(), site, 8, 60);
        let follows: Vec<String> = (0..100).map(|i| format!("ch{}", i)).collect();
        let req = LiveRequest {
            follows: parse_logins(&follows),
            priority: vec![],
            capacity_hint: 4,
        };
        assert!(source.live_logins(&req).await.unwrap().is_empty());
        assert!(source.live_logins(&request(&[], &[], 4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_following_html_filters_to_candidates() {
        async fn page(headers: axum::http::HeaderMap) -> (StatusCode, String) {
            if headers.get("cookie").and_then(|v| v.to_str().ok()) != Some("auth-token=abc") {
                return (StatusCode::FORBIDDEN, String::new());
            }
            (
                StatusCode::OK,
                r#"<div data-channel-login="alice"></div><div data-channel-login="stranger"></div>"#
                    .to_string(),
            )
        }

        let base = serve(Router::new().route("/directory/following/live", get(page))).await;
        let site = SitePattern::new(&base).unwrap();
        let source = FollowingHtmlSource::new(
            reqwest::Client::new(),
            site.clone(),
            Some("auth-token=abc".to_string()),
        );
        let live = source.live_logins(&request(&["alice", "bob"], &[], 4)).await.unwrap();
        assert_eq!(names(&live), vec!["alice"]);

        let unfiltered = source.live_logins(&request(&[], &[], 4)).await.unwrap();
        assert_eq!(names(&unfiltered), vec!["alice", "stranger"]);

        let anonymous = FollowingHtmlSource::new(reqwest::Client::new(), site, None);
        assert!(anonymous.live_logins(&request(&["alice"], &[], 4)).await.is_err());
    }

    // ── build_resolver ──────────────────────────────────────────────────

    #[test]
    fn test_build_resolver_skips_sources_without_credentials() {
        let live = LiveConfig::from_file(&LiveFileConfig::default());
        let chain = build_resolver(&live, &SitePattern::default()).unwrap();
        assert_eq!(chain.labels(), vec!["page_probe", "following_html"]);

        let live = LiveConfig::from_file(&LiveFileConfig {
            sources: vec!["helix".into(), "gql".into()],
            client_id: Some("cid".into()),
            access_token: Some("tok".into()),
            web_token: Some("web".into()),
            ..Default::default()
        });
        let chain = build_resolver(&live, &SitePattern::default()).unwrap();
        assert_eq!(chain.labels(), vec!["helix", "gql"]);
    }
}
