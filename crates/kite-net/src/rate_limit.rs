use std::collections::VecDeque;
use std::time::Duration;

use kite_models::RateLimitConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::NetError;

/// Sliding-window rate limiter.
///
/// Keeps the instants of recently authorized requests. A caller that would
/// push the count inside the trailing window above the limit is suspended
/// until the oldest entry ages out. The window lock is held while waiting,
/// so concurrent callers are authorized one at a time, in arrival order.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Result<Self, NetError> {
        if limit == 0 {
            return Err(NetError::Config(
                "rate limit must allow at least one request per window".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(NetError::Config("rate limit window must be non-zero".to_string()));
        }
        Ok(Self {
            limit: limit as usize,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(limit as usize)),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, NetError> {
        Self::new(config.requests_per_minute, config.window())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until one more request fits in the window, then record it.
    /// On return the caller may issue exactly one request.
    pub async fn await_slot(&self) {
        let mut stamps = self.timestamps.lock().await;
        self.purge(&mut stamps, Instant::now());

        while stamps.len() >= self.limit {
            let Some(&oldest) = stamps.front() else {
                break;
            };
            let now = Instant::now();
            let wait = (oldest + self.window).saturating_duration_since(now);
            info!(
                wait_secs = wait.as_secs_f64().ceil() as u64,
                in_window = stamps.len(),
                "Rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
            self.purge(&mut stamps, Instant::now());
        }

        stamps.push_back(Instant::now());
    }

    /// Like [`await_slot`](Self::await_slot), but gives up once `cancel`
    /// fires while waiting. A slot that is free right away is always taken.
    /// Returns `false` if cancelled; no slot is recorded then.
    pub async fn await_slot_or_cancel(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = self.await_slot() => true,
            _ = cancel.cancelled() => {
                debug!("Shutdown requested while waiting for a rate-limit slot");
                false
            }
        }
    }

    /// Number of authorizations still inside the trailing window.
    pub async fn in_window(&self) -> usize {
        let mut stamps = self.timestamps.lock().await;
        self.purge(&mut stamps, Instant::now());
        stamps.len()
    }

    fn purge(&self, stamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = stamps.front() {
            if now.duration_since(front) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }
}
