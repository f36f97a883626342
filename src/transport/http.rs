use super::fingerprint::{FingerprintPool, SessionCookies};
use super::TransportError;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Proxy};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Status codes at or above this are hard failures rather than data.
pub const HARD_FAILURE_STATUS: u16 = 500;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub proxy_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 5,
            proxy_url: None,
        }
    }
}

/// Per-request knobs for [`ChallengeClient::build_request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub referer: Option<String>,
    /// Caller-supplied `Cookie` header; suppresses synthetic cookies.
    pub cookie: Option<String>,
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// POST a JSON body (e.g. a GraphQL query).
    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.method = Some(Method::POST);
        self.json_body = Some(body);
        self
    }
}

/// A response below the hard-failure threshold, handed back as data.
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl ChallengeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Bot-mitigation rejection.
    pub fn is_blocked(&self) -> bool {
        self.status == 403
    }

    pub fn is_throttled(&self) -> bool {
        self.status == 429
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    fn header_first(&self, names: &[&str]) -> Option<String> {
        for name in names {
            if let Some(v) = self.headers.get(*name) {
                if let Ok(s) = v.to_str() {
                    let s = s.trim();
                    if !s.is_empty() {
                        return Some(s.to_string());
                    }
                }
            }
        }
        None
    }

    /// Best-effort parsing of `Retry-After`.
    ///
    /// Only the `Retry-After: <seconds>` form is supported.
    pub fn retry_after_ms(&self) -> Option<u64> {
        let raw = self.header_first(&["retry-after"])?;
        let secs: u64 = raw.parse().ok()?;
        Some(secs.saturating_mul(1000))
    }

    pub fn content_type(&self) -> Option<String> {
        self.header_first(&["content-type"])
    }
}

/// HTTP client that presents each request as a distinct, ordinary browser session.
pub struct ChallengeClient {
    client: reqwest::Client,
    fingerprints: FingerprintPool,
    timeout: Duration,
}

impl ChallengeClient {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        Self::with_fingerprints(cfg, FingerprintPool::default())
    }

    pub fn with_fingerprints(cfg: ClientConfig, fingerprints: FingerprintPool) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .redirect(reqwest::redirect::Policy::limited(cfg.max_redirects))
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = cfg.proxy_url.as_deref() {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            fingerprints,
            timeout: cfg.timeout,
        })
    }

    fn base_headers(&self, referer: Option<&str>) -> HeaderMap {
        let fp = self.fingerprints.next();
        let mut headers = HeaderMap::new();
        let pairs: [(&'static str, &str); 11] = [
            ("user-agent", fp.user_agent.as_str()),
            ("accept", "application/json, text/plain, */*"),
            ("accept-language", fp.accept_language.as_str()),
            ("dnt", "1"),
            ("connection", "keep-alive"),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
            ("cache-control", "no-cache"),
            ("pragma", "no-cache"),
        ];
        for (name, value) in pairs {
            if let Ok(v) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), v);
            }
        }
        if let Some(r) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
            headers.insert(reqwest::header::REFERER, r);
        }
        headers
    }

    /// Assemble a request for `target` with the next rotated fingerprint.
    pub fn build_request(&self, target: &str, options: &RequestOptions) -> Result<reqwest::Request> {
        let mut headers = self.base_headers(options.referer.as_deref());

        let cookie = match options.cookie.as_deref() {
            Some(c) => c.to_string(),
            None => SessionCookies::generate().header_value(),
        };
        let cookie = HeaderValue::from_str(&cookie).map_err(|e| {
            Error::Transport(TransportError::Other(format!("invalid cookie header: {}", e)))
        })?;
        headers.insert(reqwest::header::COOKIE, cookie);

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
            headers.insert(name, value);
        }

        let method = options.method.clone().unwrap_or(Method::GET);
        let mut req = self
            .client
            .request(method, target)
            .headers(headers)
            .timeout(options.timeout.unwrap_or(self.timeout));
        if let Some(body) = &options.json_body {
            req = req.json(body);
        }
        req.build()
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// Perform the call. Statuses below [`HARD_FAILURE_STATUS`] come back as data.
    pub async fn send(&self, request: reqwest::Request) -> Result<ChallengeResponse> {
        let url = request.url().to_string();
        let start = Instant::now();
        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| Error::Transport(TransportError::from_reqwest(e)))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::from_reqwest(e)))?;
        let elapsed = start.elapsed();

        debug!(
            http_status = status,
            url = url.as_str(),
            duration_ms = elapsed.as_millis() as u64,
            "harvest request completed"
        );

        if status >= HARD_FAILURE_STATUS {
            return Err(Error::Remote {
                status,
                message: truncate(&body, 200),
                retryable: true,
            });
        }

        Ok(ChallengeResponse {
            status,
            headers,
            body,
            elapsed,
        })
    }

    pub async fn fetch(&self, target: &str, options: &RequestOptions) -> Result<ChallengeResponse> {
        let request = self.build_request(target, options)?;
        self.send(request).await
    }

    /// Quick reachability probe before starting a run.
    pub async fn test_connectivity(&self, probe_url: &str) -> bool {
        match self.fetch(probe_url, &RequestOptions::new()).await {
            Ok(resp) if resp.is_success() => {
                info!(probe_url, "connectivity check passed");
                true
            }
            Ok(resp) => {
                info!(
                    probe_url,
                    http_status = resp.status,
                    blocked = resp.is_blocked(),
                    "connectivity check rejected"
                );
                false
            }
            Err(e) => {
                info!(probe_url, error = %e, "connectivity check failed");
                false
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
