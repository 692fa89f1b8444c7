//! # Session Cookie Store
//!
//! Process-wide cookie jar shared by every network call the core makes.
//!
//! Entries are keyed by host. [`SessionCookieStore::set`] replaces a host's
//! whole sequence (last writer wins) and [`SessionCookieStore::get`] returns
//! exactly what was last written, so a write is visible to the very next read
//! from any thread. The [`CookieStore`] bridge impl layers per-cookie merge
//! and expiry on top for the HTTP client.
//!
//! Nothing is persisted and nothing is evicted; the jar lives as long as the
//! process.

use bridge_traits::cookies::{Cookie, CookieStore};
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::logging::redact_if_sensitive;

pub struct SessionCookieStore {
    entries: RwLock<HashMap<String, Vec<Cookie>>>,
    clock: Arc<dyn Clock>,
}

impl Default for SessionCookieStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl SessionCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose expiry decisions use `clock` instead of the system time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Replace the cookie sequence stored for `host`.
    pub fn set(&self, host: &str, cookies: Vec<Cookie>) {
        let host = normalize_host(host);
        trace!(host = %host, count = cookies.len(), "Replacing session cookies");
        self.entries.write().insert(host, cookies);
    }

    /// Cookie sequence last written for `host`, or empty if none.
    pub fn get(&self, host: &str) -> Vec<Cookie> {
        self.entries
            .read()
            .get(&normalize_host(host))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop everything stored for `host`, returning what was there.
    pub fn remove(&self, host: &str) -> Vec<Cookie> {
        self.entries
            .write()
            .remove(&normalize_host(host))
            .unwrap_or_default()
    }

    /// Hosts with a stored entry, sorted.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.entries.read().keys().cloned().collect();
        hosts.sort();
        hosts
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Value for a `Cookie:` request header to `host` at `now`, or `None` when
    /// no live cookie applies.
    pub fn header_value(&self, host: &str, now: DateTime<Utc>) -> Option<String> {
        let pairs: Vec<String> = self
            .matching(host, now)
            .iter()
            .map(Cookie::pair)
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Live cookies stored under `host` or any parent domain of it.
    fn matching(&self, host: &str, now: DateTime<Utc>) -> Vec<Cookie> {
        let host = normalize_host(host);
        let entries = self.entries.read();

        let mut keys: Vec<&String> = entries
            .keys()
            .filter(|key| domain_matches(&host, key))
            .collect();
        // Most specific domain first, so its cookies lead the header.
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        keys.into_iter()
            .flat_map(|key| entries[key].iter())
            .filter(|cookie| !cookie.is_expired(now))
            .cloned()
            .collect()
    }
}

impl CookieStore for SessionCookieStore {
    fn cookies_for(&self, host: &str) -> Vec<Cookie> {
        self.matching(host, self.clock.now())
    }

    fn store(&self, host: &str, cookies: Vec<Cookie>) {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        for cookie in cookies {
            let key = if cookie.domain.is_empty() {
                normalize_host(host)
            } else {
                normalize_host(&cookie.domain)
            };
            trace!(
                host = %key,
                name = %cookie.name,
                cookie = %redact_if_sensitive("cookie", &cookie.value),
                "Storing session cookie"
            );

            let jar = entries.entry(key).or_default();
            jar.retain(|existing| existing.name != cookie.name || existing.path != cookie.path);
            if !cookie.is_expired(now) {
                jar.push(cookie);
            }
        }

        entries.retain(|_, jar| !jar.is_empty());
    }
}

impl fmt::Debug for SessionCookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookieStore")
            .field("hosts", &self.hosts())
            .finish()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn cookie(name: &str, value: &str, domain: &str) -> Cookie {
        Cookie::new(name, value, domain)
    }

    #[test]
    fn test_read_your_writes() {
        let store = SessionCookieStore::new();
        let written = vec![
            cookie("MUSIC_U", "a", "music.example.com"),
            cookie("__csrf", "b", "music.example.com"),
        ];

        store.set("music.example.com", written.clone());
        assert_eq!(store.get("music.example.com"), written);
        assert_eq!(store.get("MUSIC.example.com"), written);
    }

    #[test]
    fn test_last_writer_wins_per_host() {
        let store = SessionCookieStore::new();
        store.set("a.example.com", vec![cookie("x", "1", "a.example.com")]);
        store.set("b.example.com", vec![cookie("y", "2", "b.example.com")]);
        store.set("a.example.com", vec![cookie("z", "3", "a.example.com")]);

        assert_eq!(store.get("a.example.com"), vec![cookie("z", "3", "a.example.com")]);
        assert_eq!(store.get("b.example.com"), vec![cookie("y", "2", "b.example.com")]);
        assert_eq!(store.hosts(), vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_unknown_host_is_empty() {
        let store = SessionCookieStore::new();
        assert!(store.get("nowhere.example.com").is_empty());
        assert!(store.header_value("nowhere.example.com", Utc::now()).is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let store = SessionCookieStore::new();
        store.set("a.example.com", vec![cookie("x", "1", "a.example.com")]);
        store.set("b.example.com", vec![cookie("y", "2", "b.example.com")]);

        assert_eq!(store.remove("a.example.com").len(), 1);
        assert!(store.get("a.example.com").is_empty());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_header_value_skips_expired_and_matches_parent_domain() {
        let store = SessionCookieStore::new();
        let now = Utc::now();

        store.set(
            "music.example.com",
            vec![
                cookie("MUSIC_U", "token", "music.example.com"),
                cookie("old", "x", "music.example.com").with_expiry(now - Duration::seconds(1)),
            ],
        );
        store.set("example.com", vec![cookie("NMTID", "n", "example.com")]);
        store.set("badexample.com", vec![cookie("evil", "e", "badexample.com")]);

        assert_eq!(
            store.header_value("music.example.com", now).as_deref(),
            Some("MUSIC_U=token; NMTID=n")
        );
        assert_eq!(
            store.header_value("example.com", now).as_deref(),
            Some("NMTID=n")
        );
    }

    #[test]
    fn test_bridge_store_merges_by_name_and_path() {
        let store = SessionCookieStore::new();
        let host = "music.example.com";

        CookieStore::store(&store, host, vec![cookie("MUSIC_U", "old", host)]);
        CookieStore::store(
            &store,
            host,
            vec![cookie("MUSIC_U", "new", host), cookie("__csrf", "c", host)],
        );

        let names: Vec<String> = store
            .cookies_for(host)
            .into_iter()
            .map(|c| c.pair())
            .collect();
        assert_eq!(names, vec!["MUSIC_U=new", "__csrf=c"]);
    }

    #[test]
    fn test_bridge_store_expired_cookie_deletes() {
        let store = SessionCookieStore::new();
        let host = "music.example.com";

        CookieStore::store(&store, host, vec![cookie("MUSIC_U", "v", host)]);
        CookieStore::store(
            &store,
            host,
            vec![cookie("MUSIC_U", "", host).with_expiry(Utc::now() - Duration::days(1))],
        );

        assert!(store.cookies_for(host).is_empty());
        assert!(store.hosts().is_empty());
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_expiry_follows_injected_clock() {
        let now = Utc::now();
        let host = "music.example.com";
        let expiring = cookie("MUSIC_U", "v", host).with_expiry(now + Duration::minutes(5));

        let before = SessionCookieStore::with_clock(Arc::new(FixedClock(now)));
        CookieStore::store(&before, host, vec![expiring.clone()]);
        assert_eq!(before.cookies_for(host), vec![expiring.clone()]);

        let after = SessionCookieStore::with_clock(Arc::new(FixedClock(now + Duration::hours(1))));
        after.set(host, vec![expiring]);
        assert!(after.cookies_for(host).is_empty());
        assert_eq!(after.get(host).len(), 1);
    }

    #[test]
    fn test_concurrent_writers_are_visible() {
        let store = Arc::new(SessionCookieStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let host = format!("host{}.example.com", i);
                    store.set(&host, vec![cookie("id", &i.to_string(), &host)]);
                    assert_eq!(store.get(&host)[0].value, i.to_string());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.hosts().len(), 8);
    }
}
