use std::time::Duration;

use kite_models::TransportConfig;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Proxy, Response};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::NetError;
use crate::proxy::{redact, ProxyScheme};

/// Connection-level retry: exponential backoff on 5xx responses and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

/// Builds request clients bound to a proxy identity or to direct egress.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    policy: RetryPolicy,
    timeout: Duration,
}

impl TransportFactory {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self { policy, timeout }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            RetryPolicy::from_config(config),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Same timeout, but every request is sent exactly once.
    pub fn without_retries(&self) -> Self {
        Self::new(RetryPolicy::new(0, Duration::ZERO), self.timeout)
    }

    /// Client routed through `proxy`, or a direct client when `proxy` is
    /// `None` or cannot be used. Never fails.
    pub fn build(&self, proxy: Option<&str>) -> HttpTransport {
        let Some(uri) = proxy else {
            return self.direct();
        };
        match self.build_proxied(uri) {
            Ok(transport) => transport,
            Err(e) => {
                warn!(proxy = %redact(uri), error = %e, "Proxy unusable, using direct connection");
                self.direct()
            }
        }
    }

    /// Client without any proxy.
    pub fn direct(&self) -> HttpTransport {
        let client = self.client_builder().build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to configure HTTP client, using library defaults");
            Client::new()
        });
        HttpTransport {
            client,
            proxy: None,
            policy: self.policy,
        }
    }

    fn build_proxied(&self, uri: &str) -> Result<HttpTransport, NetError> {
        let scheme = ProxyScheme::classify(uri).ok_or_else(|| NetError::InvalidProxy {
            uri: redact(uri),
            reason: "unsupported scheme".to_string(),
        })?;
        let proxy = Proxy::all(uri).map_err(|e| NetError::InvalidProxy {
            uri: redact(uri),
            reason: e.to_string(),
        })?;
        let client = self.client_builder().proxy(proxy).build()?;
        debug!(proxy = %redact(uri), ?scheme, "Built proxied client");
        Ok(HttpTransport {
            client,
            proxy: Some(uri.to_string()),
            policy: self.policy,
        })
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
    }
}

/// A request client plus the retry policy it applies.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    proxy: Option<String>,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Proxy this transport is routed through, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// POST a JSON body, retrying 5xx responses and timeouts.
    ///
    /// Once retries run out the last response (even a 5xx) or the last error
    /// is handed back; 4xx responses are never retried.
    pub async fn post_json<T>(&self, url: &str, body: &T) -> Result<Response, NetError>
    where
        T: Serialize + ?Sized,
    {
        let mut attempt = 0;
        loop {
            let result = self.client.post(url).json(body).send().await;

            let reason = match &result {
                Ok(resp) if resp.status().is_server_error() => Some(resp.status().to_string()),
                Ok(_) => None,
                Err(e) if e.is_timeout() => Some("timeout".to_string()),
                Err(_) => None,
            };

            match reason {
                Some(reason) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        url,
                        reason = %reason,
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return result.map_err(NetError::from),
            }
        }
    }
}
