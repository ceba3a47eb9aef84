//! Channel-URL classification.
//!
//! Several URL shapes identify the same channel and must be treated as
//! equivalent when matching desired state against open tabs:
//!
//! - `/<login>` and `/<login>/<subpath>`
//! - `/moderator/<login>[/...]`
//! - `/moderator?channel=<login>`
//! - `/popout/<login>/chat`
//!
//! A fixed set of ignored paths never resolves to a login.

use url::Url;

use crate::login::Login;

const DEFAULT_SITE_URL: &str = "https://www.twitch.tv/";
const DEFAULT_HOSTS: &[&str] = &["www.twitch.tv", "twitch.tv", "m.twitch.tv"];

/// Exact paths (lowercased, no trailing slash) that are never channel pages.
const IGNORED_PATHS: &[&str] = &[
    "/moderator",
    "/drops",
    "/drops/inventory",
    "/drops/campaigns",
    "/inventory",
    "/settings/connections",
    "/directory",
    "/creatorcamp",
    "/videos",
];

/// First path segments owned by the site rather than by a channel.
const RESERVED_SEGMENTS: &[&str] = &[
    "directory",
    "videos",
    "settings",
    "drops",
    "inventory",
    "search",
    "subscriptions",
    "wallet",
    "friends",
    "messages",
    "payments",
    "turbo",
    "prime",
    "jobs",
    "p",
    "store",
    "downloads",
    "login",
    "signup",
    "creatorcamp",
    "schedule",
    "about",
];

/// What a tab URL points at, from the engine's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlClass {
    /// Unparseable, another host, or a non-web scheme.
    NotSite,
    /// One of the ignored paths (moderation root, drops, directory, ...).
    Ignored,
    /// A site page that is not tied to any channel.
    Other,
    /// A page identifying this channel.
    Channel(Login),
}

impl UrlClass {
    pub fn login(&self) -> Option<&Login> {
        match self {
            UrlClass::Channel(login) => Some(login),
            _ => None,
        }
    }

    pub fn is_site(&self) -> bool {
        !matches!(self, UrlClass::NotSite)
    }
}

/// The streaming site the engine manages tabs for.
#[derive(Clone, Debug)]
pub struct SitePattern {
    base: Url,
    hosts: Vec<String>,
}

impl Default for SitePattern {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_SITE_URL).expect("default site url is valid"),
            hosts: DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl SitePattern {
    /// Build a pattern from a base URL. The base host, its bare/`www.` twin and
    /// its `m.` mobile variant are all accepted.
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let host = base
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_ascii_lowercase();
        let bare = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let mut hosts = vec![host.clone()];
        for candidate in [bare.clone(), format!("www.{bare}"), format!("m.{bare}")] {
            if !hosts.contains(&candidate) {
                hosts.push(candidate);
            }
        }
        Ok(Self { base, hosts })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Canonical `/<login>` URL used when the engine opens a tab.
    pub fn channel_url(&self, login: &Login) -> String {
        format!("{}{}", self.base.as_str(), login.as_str())
    }

    pub fn matches_host(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url
                .host_str()
                .map(|h| self.hosts.iter().any(|known| known.eq_ignore_ascii_case(h)))
                .unwrap_or(false)
    }

    /// Classify a raw tab URL. Parse failures are `NotSite`, never errors.
    pub fn classify(&self, raw: &str) -> UrlClass {
        let Ok(url) = Url::parse(raw.trim()) else {
            return UrlClass::NotSite;
        };
        if !self.matches_host(&url) {
            return UrlClass::NotSite;
        }

        let segments: Vec<String> = url
            .path_segments()
            .map(|parts| {
                parts
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default();
        let query_channel = url
            .query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case("channel"))
            .and_then(|(_, value)| Login::parse(&value));

        match segments.first().map(String::as_str) {
            None => {
                return query_channel.map_or(UrlClass::Other, UrlClass::Channel);
            }
            Some("moderator") => {
                if let Some(login) = segments.get(1).and_then(|s| Login::parse(s)) {
                    return UrlClass::Channel(login);
                }
                if let Some(login) = query_channel {
                    return UrlClass::Channel(login);
                }
                return UrlClass::Ignored;
            }
            Some("popout") => {
                return segments
                    .get(1)
                    .and_then(|s| Login::parse(s))
                    .map_or(UrlClass::Other, UrlClass::Channel);
            }
            Some(_) => {}
        }

        let path = format!("/{}", segments.join("/"));
        if IGNORED_PATHS.contains(&path.as_str()) {
            return UrlClass::Ignored;
        }
        if RESERVED_SEGMENTS.contains(&segments[0].as_str()) {
            return UrlClass::Other;
        }
        Login::parse(&segments[0]).map_or(UrlClass::Other, UrlClass::Channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(s: &str) -> Login {
        Login::parse(s).unwrap()
    }

    #[test]
    fn test_equivalent_forms_resolve_to_same_login() {
        let site = SitePattern::default();
        let forms = [
            "https://www.twitch.tv/alice",
            "https://www.twitch.tv/Alice/videos",
            "https://twitch.tv/moderator/alice",
            "https://www.twitch.tv/moderator/alice/chat",
            "https://www.twitch.tv/popout/alice/chat",
            "https://www.twitch.tv/moderator?channel=ALICE",
        ];
        for form in forms {
            assert_eq!(
                site.classify(form),
                UrlClass::Channel(login("alice")),
                "form {form}"
            );
        }
    }

    #[test]
    fn test_ignored_paths_case_insensitive() {
        let site = SitePattern::default();
        for path in [
            "/moderator",
            "/drops",
            "/DROPS/Inventory",
            "/settings/connections",
            "/directory",
            "/directory/",
            "/creatorcamp",
            "/videos",
        ] {
            let raw = format!("https://www.twitch.tv{path}");
            assert_eq!(site.classify(&raw), UrlClass::Ignored, "path {path}");
        }
    }

    #[test]
    fn test_reserved_segments_are_not_channels() {
        let site = SitePattern::default();
        assert_eq!(
            site.classify("https://www.twitch.tv/directory/following/live"),
            UrlClass::Other
        );
        assert_eq!(
            site.classify("https://www.twitch.tv/videos/123456"),
            UrlClass::Other
        );
        assert_eq!(
            site.classify("https://www.twitch.tv/search?term=x"),
            UrlClass::Other
        );
        assert_eq!(site.classify("https://www.twitch.tv/"), UrlClass::Other);
    }

    #[test]
    fn test_foreign_and_broken_urls_are_not_site() {
        let site = SitePattern::default();
        assert_eq!(site.classify("https://example.com/alice"), UrlClass::NotSite);
        assert_eq!(site.classify("not a url"), UrlClass::NotSite);
        assert_eq!(site.classify("chrome://newtab/"), UrlClass::NotSite);
        assert_eq!(site.classify(""), UrlClass::NotSite);
    }

    #[test]
    fn test_custom_site_accepts_host_variants() {
        let site = SitePattern::new("https://streams.example.org").unwrap();
        assert_eq!(site.base_url(), "https://streams.example.org/");
        assert_eq!(
            site.channel_url(&login("bob")),
            "https://streams.example.org/bob"
        );
        assert!(site.classify("https://www.streams.example.org/bob").login().is_some());
        assert!(site.classify("https://m.streams.example.org/bob").login().is_some());
        assert!(!site.classify("https://www.twitch.tv/bob").is_site());
    }
}
