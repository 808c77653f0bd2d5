use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One question/answer exchange with an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleResult {
    pub exchange_id: Uuid,
    pub agent_id: String,
    pub question: String,
    pub answer: String,
    pub elapsed_ms: u64,
}

/// How a usage report ended. Reports never fail the caller; this is for
/// bookkeeping only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Reported,
    /// Still rate-limited after the last retry.
    Exhausted,
    Failed,
    /// Skipped because the run was cancelled between retries.
    Cancelled,
}

impl ReportOutcome {
    pub fn is_reported(self) -> bool {
        self == ReportOutcome::Reported
    }
}

/// Per-wallet counters, reported when the wallet loop stops.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletStats {
    pub cycles: u64,
    pub queries_ok: u64,
    pub queries_failed: u64,
    pub reports_ok: u64,
    pub reports_failed: u64,
}

impl WalletStats {
    pub fn record_report(&mut self, outcome: ReportOutcome) {
        if outcome.is_reported() {
            self.reports_ok += 1;
        } else {
            self.reports_failed += 1;
        }
    }

    pub fn merge(&mut self, other: &WalletStats) {
        self.cycles += other.cycles;
        self.queries_ok += other.queries_ok;
        self.queries_failed += other.queries_failed;
        self.reports_ok += other.reports_ok;
        self.reports_failed += other.reports_failed;
    }
}

/// Everything the run loop tells the operator about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    WalletStarted {
        wallet: String,
        at: DateTime<Utc>,
    },
    ProxySelected {
        wallet: String,
        agent_id: String,
        proxy: String,
    },
    Exchange {
        wallet: String,
        agent_name: String,
        result: CycleResult,
    },
    QueryFailed {
        wallet: String,
        agent_id: String,
        error: String,
    },
    UsageReported {
        wallet: String,
        agent_id: String,
        outcome: ReportOutcome,
    },
    CycleCompleted {
        wallet: String,
        cycle: u64,
    },
    WalletStopped {
        wallet: String,
        stats: WalletStats,
        at: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn wallet(&self) -> &str {
        match self {
            RunEvent::WalletStarted { wallet, .. }
            | RunEvent::ProxySelected { wallet, .. }
            | RunEvent::Exchange { wallet, .. }
            | RunEvent::QueryFailed { wallet, .. }
            | RunEvent::UsageReported { wallet, .. }
            | RunEvent::CycleCompleted { wallet, .. }
            | RunEvent::WalletStopped { wallet, .. } => wallet,
        }
    }
}
