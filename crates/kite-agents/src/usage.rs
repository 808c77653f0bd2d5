use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kite_models::{ReportOutcome, UsageConfig, UsageReport, UsageResponse};
use kite_net::{HttpTransport, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Best-effort telemetry submission. Implementations never fail the caller.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn report(&self, wallet: &str, agent_id: &str, question: &str, answer: &str)
        -> ReportOutcome;
}

/// Capped exponential backoff for rate-limited reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &UsageConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// `min(max_delay, base_delay * 2^attempt)`, attempt 0-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&UsageConfig::default())
    }
}

/// Posts usage reports to the collector, backing off while it signals a rate limit.
pub struct UsageReporter {
    transport: HttpTransport,
    limiter: Arc<RateLimiter>,
    url: String,
    policy: BackoffPolicy,
    cancel: CancellationToken,
}

impl UsageReporter {
    pub fn new(
        transport: HttpTransport,
        limiter: Arc<RateLimiter>,
        url: String,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            url,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop backing off, and stop waiting for a rate-limit slot, once
    /// `cancel` fires. A request already on the wire still completes.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn backoff(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[async_trait]
impl UsageSink for UsageReporter {
    async fn report(
        &self,
        wallet: &str,
        agent_id: &str,
        question: &str,
        answer: &str,
    ) -> ReportOutcome {
        let report = UsageReport::new(wallet, agent_id, question, answer);
        let mut attempt = 0;

        loop {
            if !self.limiter.await_slot_or_cancel(&self.cancel).await {
                info!(agent_id, "Shutdown requested, dropping pending usage report");
                return ReportOutcome::Cancelled;
            }

            let response = match self.transport.post_json(&self.url, &report).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(agent_id, error = %e, "Could not report usage");
                    return ReportOutcome::Failed;
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(agent_id, status = status.as_u16(), error = %e, "Could not read usage response body");
                    String::new()
                }
            };
            let parsed: UsageResponse = serde_json::from_str(&body).unwrap_or_default();

            if parsed.is_rate_limited() {
                if attempt >= self.policy.max_retries {
                    warn!(
                        agent_id,
                        retries = attempt,
                        "Usage endpoint still rate-limited, giving up"
                    );
                    return ReportOutcome::Exhausted;
                }
                let delay = self.policy.delay_for(attempt);
                attempt += 1;
                info!(
                    agent_id,
                    attempt,
                    max_retries = self.policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Usage endpoint rate-limited, backing off"
                );
                if !self.backoff(delay).await {
                    info!(agent_id, "Shutdown requested, dropping pending usage report");
                    return ReportOutcome::Cancelled;
                }
                continue;
            }

            if status.is_success() {
                info!(agent_id, "Usage reported");
                return ReportOutcome::Reported;
            }

            warn!(agent_id, status = status.as_u16(), error = ?parsed.error, "Could not report usage");
            return ReportOutcome::Failed;
        }
    }
}
