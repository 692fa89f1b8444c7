//! Session Cookie Abstraction
//!
//! Every outbound request that belongs to the user's session must carry the
//! cookies the catalog backend handed out earlier, and every `Set-Cookie` the
//! backend returns must be recorded before the next request goes out. The
//! store is process-wide; the HTTP client consults it per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single HTTP cookie scoped to a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Host the cookie was received from (lower-cased, no port).
    pub domain: String,
    pub path: String,
    /// Absolute expiry; `None` for session cookies.
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into().to_ascii_lowercase(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Whether the cookie has expired at `now`. Session cookies never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|expires| expires <= now).unwrap_or(false)
    }

    /// `name=value` pair as sent in a `Cookie` request header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Process-wide cookie persistence shared by every network call.
///
/// Calls are synchronous: the HTTP client reads the store right before
/// dispatch and writes it right after a response, and both must be visible to
/// the very next request.
pub trait CookieStore: Send + Sync {
    /// Cookies to attach to a request for `host`. Expired cookies are omitted.
    fn cookies_for(&self, host: &str) -> Vec<Cookie>;

    /// Record cookies received from `host`. A cookie with the same name and
    /// path replaces the stored one; an already-expired cookie deletes it.
    fn store(&self, host: &str, cookies: Vec<Cookie>);
}
