use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use crate::cache::LruResultCache;
use crate::limiter::RateLimiter;
use crate::runner::{EngineError, Options};

/// Status codes that classify a probed target as found.
pub const ACCEPTED_STATUS: [u16; 9] = [200, 201, 202, 203, 204, 301, 302, 307, 308];

pub fn is_accepted_status(status: u16) -> bool {
    ACCEPTED_STATUS.contains(&status)
}

/// Outcome of probing one target. Status 0 means the target was unreachable
/// after all retries. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: String,
    pub status: u16,
    pub content_type: String,
    pub found: bool,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn classified(target: &str, status: u16, content_type: String) -> Self {
        Self {
            target: target.to_string(),
            status,
            content_type,
            found: is_accepted_status(status),
            timestamp: Utc::now(),
        }
    }

    pub fn unreachable(target: &str) -> Self {
        Self {
            target: target.to_string(),
            status: 0,
            content_type: String::new(),
            found: false,
            timestamp: Utc::now(),
        }
    }

    /// Flat mapping handed to result hooks; formatters consume the same shape.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("target".to_string(), json!(self.target));
        record.insert("status_code".to_string(), json!(self.status));
        record.insert("content_type".to_string(), json!(self.content_type));
        record.insert("found".to_string(), json!(self.found));
        record.insert("timestamp".to_string(), json!(self.timestamp.to_rfc3339()));
        record
    }
}

// Terminal request errors are not worth retrying: redirect loops, malformed
// responses, and anything that failed before leaving the client. Everything
// else (connect failures, timeouts, broken transfers) counts as transient.
fn is_transient(err: &reqwest::Error) -> bool {
    !(err.is_redirect() || err.is_builder() || err.is_decode() || err.is_status())
}

/// Issues a single HEAD probe per target with timeout, TLS, auth and proxy
/// policy from the engine options, plus a bounded retry loop on transient
/// network failure. Never returns an error: unreachable targets come back as
/// a `ProbeResult` with status 0.
pub struct ProbeExecutor {
    client: reqwest::Client,
    limiter: Option<RateLimiter>,
    cache: Option<Mutex<LruResultCache>>,
    auth: Option<(String, Option<String>)>,
    delay: Duration,
    retries: u32,
    requests: AtomicU64,
}

impl ProbeExecutor {
    pub fn new(options: &Options) -> Result<Self, EngineError> {
        let client = build_client(options)?;
        let limiter = options.rate_limit.as_ref().map(|cfg| {
            RateLimiter::new(cfg.max_requests, Duration::from_secs(cfg.period_seconds))
        });
        let cache = if options.cache_size > 0 {
            Some(Mutex::new(LruResultCache::new(options.cache_size)))
        } else {
            None
        };
        let auth = options
            .auth
            .as_ref()
            .map(|creds| (creds.username.clone(), creds.password.clone()));
        Ok(Self {
            client,
            limiter,
            cache,
            auth,
            delay: Duration::from_millis(options.delay_ms),
            retries: options.retries,
            requests: AtomicU64::new(0),
        })
    }

    /// Total HTTP requests issued so far, retries included. Cache hits issue
    /// none.
    pub fn requests_issued(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub async fn probe(&self, target: &str) -> ProbeResult {
        // Cache hits are free: they bypass the rate limiter entirely.
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(target) {
                tracing::debug!(target = %target, "cache hit");
                return hit;
            }
        }

        if let Some(limiter) = &self.limiter {
            limiter.admit().await;
        }

        let mut attempt: u32 = 0;
        let result = loop {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.requests.fetch_add(1, Ordering::Relaxed);
            let mut request = self.client.head(target);
            if let Some((username, password)) = &self.auth {
                request = request.basic_auth(username, password.as_deref());
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    break ProbeResult::classified(target, status, content_type);
                }
                Err(err) if is_transient(&err) => {
                    if attempt >= self.retries {
                        tracing::warn!(
                            target = %target,
                            attempts = attempt + 1,
                            error = %err,
                            "probe retries exhausted"
                        );
                        break ProbeResult::unreachable(target);
                    }
                    attempt += 1;
                    tracing::debug!(target = %target, attempt, error = %err, "transient probe failure, retrying");
                }
                Err(err) => {
                    tracing::debug!(target = %target, error = %err, "terminal probe failure");
                    break ProbeResult::unreachable(target);
                }
            }
        };

        // Only responses are worth remembering; an unreachable target is
        // re-probed if it ever comes up again.
        if result.status != 0 {
            if let Some(cache) = &self.cache {
                cache.lock().await.put(target, result.clone());
            }
        }
        result
    }
}

fn build_client(options: &Options) -> Result<reqwest::Client, EngineError> {
    let timeout = Duration::from_secs(options.timeout_seconds);
    let mut builder = reqwest::Client::builder()
        .user_agent(options.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(timeout);

    if !options.verify_ssl {
        builder = builder
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true);
    }

    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| EngineError::ProxySetup {
            proxy: options.proxy.clone().unwrap_or_default(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| EngineError::HttpClientBuild { source: e })
}
