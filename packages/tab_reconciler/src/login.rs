use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest login the site hands out.
const MAX_LOGIN_LEN: usize = 25;

/// Normalized channel identifier (lowercase, trimmed).
///
/// Two logins compare equal iff their normalized forms match, so every
/// comparison in the engine goes through this type rather than raw strings.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Login(String);

impl Login {
    /// Normalize and validate a raw login. Returns `None` for empty input or
    /// characters a channel login can never contain.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() || normalized.len() > MAX_LOGIN_LEN {
            return None;
        }
        if !normalized
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return None;
        }
        Some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Login {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Login {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Login::parse(&value).ok_or_else(|| format!("invalid channel login: {value:?}"))
    }
}

impl From<Login> for String {
    fn from(login: Login) -> Self {
        login.0
    }
}

/// Parse a list of raw logins, dropping invalid entries and duplicates while
/// keeping first-seen order.
pub fn parse_logins<I, S>(raw: I) -> Vec<Login>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .filter_map(|s| Login::parse(s.as_ref()))
        .filter(|login| seen.insert(login.clone()))
        .collect()
}
