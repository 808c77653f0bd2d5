use std::sync::Mutex;
use std::time::Duration;

use kite_models::ProxyConfig;
use moka::future::Cache;
use tracing::{debug, info, warn};

/// Tunnelling scheme implied by a proxy URI prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Socks,
    HttpConnect,
}

impl ProxyScheme {
    /// Classify a proxy URI by its scheme. `None` for anything we cannot tunnel through.
    pub fn classify(uri: &str) -> Option<Self> {
        let scheme = uri.split_once("://")?.0.to_ascii_lowercase();
        match scheme.as_str() {
            "socks4" | "socks4a" | "socks5" | "socks5h" => Some(ProxyScheme::Socks),
            "http" | "https" => Some(ProxyScheme::HttpConnect),
            _ => None,
        }
    }
}

/// Strip credentials from a proxy URI before it goes into a log line.
pub fn redact(uri: &str) -> String {
    match (uri.split_once("://"), uri.rfind('@')) {
        (Some((scheme, _)), Some(at)) => format!("{scheme}://***@{}", &uri[at + 1..]),
        _ => uri.to_string(),
    }
}

/// Hands out proxy URIs in rotation, skipping ones that recently failed.
///
/// Failed entries drop out of rotation for `failure_ttl`. When every entry
/// is failed, `next` waits out the exhaustion cooldown, clears the failed
/// set and makes one more pass before falling back to a direct connection.
pub struct ProxyRotator {
    pool: Vec<String>,
    cursor: Mutex<usize>,
    failed: Cache<String, ()>,
    cooldown: Duration,
}

impl ProxyRotator {
    pub fn new(pool: Vec<String>, config: &ProxyConfig) -> Self {
        Self::with_timings(
            pool,
            Duration::from_secs(config.exhaustion_cooldown_seconds),
            Duration::from_secs(config.failure_ttl_seconds),
        )
    }

    pub fn with_timings(pool: Vec<String>, cooldown: Duration, failure_ttl: Duration) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(pool.len());
        for uri in pool {
            let uri = uri.trim().to_string();
            if !uri.is_empty() && !deduped.contains(&uri) {
                deduped.push(uri);
            }
        }
        Self {
            pool: deduped,
            cursor: Mutex::new(0),
            // only pool members are ever inserted, so no capacity bound is needed
            failed: Cache::builder()
                .time_to_live(failure_ttl)
                .build(),
            cooldown,
        }
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Next proxy to use, or `None` for a direct connection.
    pub async fn next(&self, enabled: bool) -> Option<String> {
        if !enabled || self.pool.is_empty() {
            return None;
        }

        for pass in 0..2 {
            if let Some(uri) = self.select() {
                return Some(uri);
            }
            if pass == 0 {
                warn!(
                    pool = self.pool.len(),
                    cooldown_secs = self.cooldown.as_secs(),
                    "All proxies failed, cooling down before retrying"
                );
                tokio::time::sleep(self.cooldown).await;
                self.clear_failed().await;
            }
        }

        warn!("No proxy available after cooldown, falling back to direct connection");
        None
    }

    /// Exclude a proxy from rotation. Repeated calls have no further effect.
    pub async fn mark_failed(&self, uri: &str) {
        if !self.pool.iter().any(|p| p == uri) {
            debug!(proxy = %redact(uri), "Ignoring failure report for proxy outside the pool");
            return;
        }
        if self.failed.contains_key(uri) {
            return;
        }
        self.failed.insert(uri.to_string(), ()).await;
        warn!(proxy = %redact(uri), "Proxy failed");
    }

    /// Failed entries, in pool order.
    pub fn failed(&self) -> Vec<String> {
        self.pool
            .iter()
            .filter(|p| self.failed.contains_key(p.as_str()))
            .cloned()
            .collect()
    }

    pub async fn clear_failed(&self) {
        for uri in &self.pool {
            self.failed.invalidate(uri.as_str()).await;
        }
        info!("Cleared failed proxy set");
    }

    fn select(&self) -> Option<String> {
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Proxy cursor lock poisoned");
                poisoned.into_inner()
            }
        };
        let len = self.pool.len();
        for offset in 0..len {
            let idx = (*cursor + offset) % len;
            let uri = &self.pool[idx];
            if !self.failed.contains_key(uri.as_str()) {
                *cursor = (idx + 1) % len;
                return Some(uri.clone());
            }
        }
        None
    }
}
