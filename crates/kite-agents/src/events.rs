use kite_models::RunEvent;
use tracing::{info, warn};

/// Where the run loop reports what it is doing.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Renders run events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::WalletStarted { wallet, .. } => {
                info!(wallet = %wallet, "Processing wallet");
            }
            RunEvent::ProxySelected {
                wallet,
                agent_id,
                proxy,
            } => {
                info!(wallet = %wallet, agent_id = %agent_id, proxy = %proxy, "Using proxy");
            }
            RunEvent::Exchange {
                wallet,
                agent_name,
                result,
            } => {
                info!(
                    wallet = %wallet,
                    agent = %agent_name,
                    exchange_id = %result.exchange_id,
                    elapsed_ms = result.elapsed_ms,
                    question = %result.question,
                    answer = %result.answer,
                    "Agent exchange"
                );
            }
            RunEvent::QueryFailed {
                wallet,
                agent_id,
                error,
            } => {
                warn!(wallet = %wallet, agent_id = %agent_id, error = %error, "Agent query failed");
            }
            RunEvent::UsageReported {
                wallet,
                agent_id,
                outcome,
            } => {
                if outcome.is_reported() {
                    info!(wallet = %wallet, agent_id = %agent_id, "Usage report accepted");
                } else {
                    warn!(wallet = %wallet, agent_id = %agent_id, ?outcome, "Usage report not accepted");
                }
            }
            RunEvent::CycleCompleted { wallet, cycle } => {
                info!(wallet = %wallet, cycle, "Cycle complete");
            }
            RunEvent::WalletStopped { wallet, stats, .. } => {
                info!(
                    wallet = %wallet,
                    cycles = stats.cycles,
                    queries_ok = stats.queries_ok,
                    queries_failed = stats.queries_failed,
                    reports_ok = stats.reports_ok,
                    reports_failed = stats.reports_failed,
                    "Wallet stopped"
                );
            }
        }
    }
}
