//! HTTP Client Implementation using Reqwest
//!
//! Every request consults the shared [`CookieStore`] for the target host and
//! every response's `Set-Cookie` headers are written back before the call
//! returns, so the next request already sees them.

use async_trait::async_trait;
use bridge_traits::{
    cookies::{Cookie, CookieStore},
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use chrono::{DateTime, Utc};
use reqwest::header::SET_COOKIE;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("player-core/", env!("CARGO_PKG_VERSION"));

/// [`HttpClient`] over a pooled `reqwest::Client`, retrying per
/// [`RetryPolicy`] and sharing session cookies through an injected
/// [`CookieStore`].
pub struct ReqwestHttpClient {
    client: Client,
    cookies: Option<Arc<dyn CookieStore>>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Default per-request deadline for requests without their own.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client configuration");
                Client::new()
            });

        Self {
            client,
            cookies: None,
        }
    }

    /// Wrap a preconfigured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            cookies: None,
        }
    }

    /// Attach the process-wide cookie store.
    pub fn with_cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(store);
        self
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// `Cookie` header value for `request`, merging any caller-supplied header
    /// with the stored session cookies.
    fn cookie_header(&self, request: &HttpRequest) -> Option<String> {
        let explicit = request
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("cookie"))
            .map(|(_, value)| value.clone());

        let stored = match (&self.cookies, request.host()) {
            (Some(store), Some(host)) => store
                .cookies_for(&host)
                .iter()
                .map(Cookie::pair)
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::new(),
        };

        match (explicit, stored.is_empty()) {
            (Some(explicit), true) => Some(explicit),
            (Some(explicit), false) => Some(format!("{}; {}", explicit, stored)),
            (None, false) => Some(stored),
            (None, true) => None,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            if !key.eq_ignore_ascii_case("cookie") {
                req = req.header(key, value);
            }
        }

        if let Some(cookie) = self.cookie_header(request) {
            req = req.header(reqwest::header::COOKIE, cookie);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Record every `Set-Cookie` header of `response` against the request host.
    fn capture_cookies(&self, host: Option<&str>, response: &reqwest::Response) {
        let (Some(store), Some(host)) = (&self.cookies, host) else {
            return;
        };

        let now = Utc::now();
        let received: Vec<Cookie> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| parse_set_cookie(raw, host, now))
            .collect();

        if !received.is_empty() {
            debug!(host = host, count = received.len(), "Captured session cookies");
            store.store(host, received);
        }
    }

    /// One attempt. `Ok(Err(_))` marks a response worth retrying.
    async fn attempt(
        &self,
        request: &HttpRequest,
        host: Option<&str>,
    ) -> Result<std::result::Result<HttpResponse, BridgeError>> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.capture_cookies(host, &response);

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Err(BridgeError::OperationFailed(format!(
                "HTTP {}",
                status.as_u16()
            ))));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect::<HashMap<_, _>>();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        }))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let host = request.host();
        let attempts = policy.max_attempts.max(1);
        let mut failed = 0;

        loop {
            debug!(attempt = failed + 1, attempts, url = %request.url, "Sending request");
            let error = match self.attempt(&request, host.as_deref()).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(retryable)) => retryable,
                Err(error) => error,
            };

            failed += 1;
            if failed >= attempts {
                return Err(error);
            }
            let delay = policy.delay_after(failed);
            warn!(
                error = %error,
                attempt = failed,
                retry_in_ms = delay.as_millis() as u64,
                "Request failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

fn map_reqwest_error(error: reqwest::Error) -> BridgeError {
    if error.is_timeout() {
        BridgeError::Timeout(error.to_string())
    } else if error.is_connect() {
        BridgeError::OperationFailed(format!("Connection failed: {}", error))
    } else {
        BridgeError::OperationFailed(error.to_string())
    }
}

/// Parse one `Set-Cookie` header received from `host`.
///
/// `Max-Age` wins over `Expires`; an expiry past the representable range
/// never expires. A missing `Domain` attribute scopes the cookie to the
/// responding host. A `Domain` the host does not belong to drops the cookie.
fn parse_set_cookie(raw: &str, host: &str, now: DateTime<Utc>) -> Option<Cookie> {
    let parsed = cookie::Cookie::parse(raw.to_string()).ok()?;
    let host = host.to_ascii_lowercase();

    let domain = match parsed
        .domain()
        .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
    {
        Some(domain) if domain_matches(&host, &domain) => domain,
        Some(domain) => {
            warn!(host = %host, domain = %domain, "Rejected cookie for foreign domain");
            return None;
        }
        None => host,
    };

    let expires = match parsed.max_age() {
        Some(max_age) => chrono::Duration::try_seconds(max_age.whole_seconds())
            .and_then(|age| now.checked_add_signed(age)),
        None => parsed
            .expires_datetime()
            .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)),
    };

    let mut cookie = Cookie::new(parsed.name(), parsed.value(), domain)
        .with_path(parsed.path().unwrap_or("/"))
        .secure(parsed.secure().unwrap_or(false))
        .http_only(parsed.http_only().unwrap_or(false));
    cookie.expires = expires;

    Some(cookie)
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        stored: Mutex<Vec<(String, Vec<Cookie>)>>,
        serve: Vec<Cookie>,
    }

    impl CookieStore for RecordingStore {
        fn cookies_for(&self, _host: &str) -> Vec<Cookie> {
            self.serve.clone()
        }

        fn store(&self, host: &str, cookies: Vec<Cookie>) {
            self.stored.lock().push((host.to_string(), cookies));
        }
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[test]
    fn test_cookie_header_uses_store() {
        let store = Arc::new(RecordingStore {
            serve: vec![
                Cookie::new("MUSIC_U", "token", "music.example.com"),
                Cookie::new("__csrf", "abc", "music.example.com"),
            ],
            ..Default::default()
        });
        let client = ReqwestHttpClient::new().with_cookie_store(store);

        let request = HttpRequest::get("https://music.example.com/api/song");
        assert_eq!(
            client.cookie_header(&request).as_deref(),
            Some("MUSIC_U=token; __csrf=abc")
        );

        let request = request.header("Cookie", "os=pc");
        assert_eq!(
            client.cookie_header(&request).as_deref(),
            Some("os=pc; MUSIC_U=token; __csrf=abc")
        );
    }

    #[test]
    fn test_no_cookie_header_without_store() {
        let client = ReqwestHttpClient::new();
        let request = HttpRequest::get("https://music.example.com/api/song");
        assert_eq!(client.cookie_header(&request), None);
    }

    #[test]
    fn test_parse_set_cookie_defaults_to_host() {
        let now = Utc::now();
        let cookie = parse_set_cookie("MUSIC_U=abc; Path=/; HttpOnly", "music.example.com", now)
            .unwrap();

        assert_eq!(cookie.name, "MUSIC_U");
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.domain, "music.example.com");
        assert!(cookie.http_only);
        assert!(cookie.expires.is_none());
    }

    #[test]
    fn test_parse_set_cookie_max_age_and_domain() {
        let now = Utc::now();
        let cookie = parse_set_cookie(
            "__csrf=xyz; Max-Age=60; Domain=.Example.com; Secure",
            "music.example.com",
            now,
        )
        .unwrap();

        assert_eq!(cookie.domain, "example.com");
        assert!(cookie.secure);
        assert_eq!(cookie.expires, Some(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_parse_set_cookie_huge_max_age_never_expires() {
        let now = Utc::now();
        for raw in [
            "MUSIC_U=abc; Max-Age=9223372036854775807",
            "MUSIC_U=abc; Max-Age=99999999999999",
        ] {
            let cookie = parse_set_cookie(raw, "music.example.com", now).unwrap();
            assert_eq!(cookie.value, "abc");
            assert!(cookie.expires.is_none(), "{}", raw);
        }
    }

    #[test]
    fn test_parse_set_cookie_rejects_foreign_domain() {
        let now = Utc::now();
        assert!(parse_set_cookie("MUSIC_U=evil; Domain=music.163.com", "attacker.example", now)
            .is_none());
        assert!(parse_set_cookie("MUSIC_U=evil; Domain=ample.com", "example.com", now).is_none());
        assert!(
            parse_set_cookie("MUSIC_U=evil; Domain=music.example.com", "example.com", now)
                .is_none()
        );

        let cookie =
            parse_set_cookie("MUSIC_U=ok; Domain=Music.Example.com", "music.example.com", now)
                .unwrap();
        assert_eq!(cookie.domain, "music.example.com");
    }

    #[test]
    fn test_parse_set_cookie_rejects_garbage() {
        assert!(parse_set_cookie("", "example.com", Utc::now()).is_none());
    }
}
