use std::sync::Arc;
use std::time::Duration;

use kite_models::{AgentDescriptor, ConnectionMode, CycleConfig, ReportOutcome, RunEvent, WalletStats};
use kite_net::proxy::redact;
use kite_net::{ProxyRotator, TransportFactory};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::AgentError;
use crate::events::EventSink;
use crate::query::AgentQuery;
use crate::usage::UsageSink;

/// Collaborators the orchestrator drives.
pub struct Services {
    pub query: Arc<dyn AgentQuery>,
    pub usage: Arc<dyn UsageSink>,
    pub rotator: Arc<ProxyRotator>,
    pub factory: TransportFactory,
    pub events: Arc<dyn EventSink>,
}

/// What happened to a single agent within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AgentOutcome {
    answered: bool,
    report: Option<ReportOutcome>,
    /// Shutdown arrived before the query went out.
    skipped: bool,
}

impl AgentOutcome {
    fn apply(self, stats: &mut WalletStats) {
        if self.skipped {
            return;
        }
        if self.answered {
            stats.queries_ok += 1;
        } else {
            stats.queries_failed += 1;
        }
        if let Some(report) = self.report {
            stats.record_report(report);
        }
    }
}

/// Drives the unbounded query/report loop for every wallet until cancelled.
///
/// Cancellation is checked before each agent and around each inter-cycle
/// pause. Calls already in flight are left to finish.
pub struct Orchestrator {
    agents: Vec<AgentDescriptor>,
    services: Services,
    mode: ConnectionMode,
    cycle: CycleConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        agents: Vec<AgentDescriptor>,
        services: Services,
        mode: ConnectionMode,
        cycle: CycleConfig,
    ) -> Self {
        Self {
            agents,
            services,
            mode,
            cycle,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally created token, e.g. one already shared with the usage reporter.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    /// Run every wallet concurrently until cancelled. Returns the combined stats.
    pub async fn run(self: Arc<Self>, wallets: Vec<String>) -> WalletStats {
        info!(
            wallets = wallets.len(),
            agents = self.agents.len(),
            mode = ?self.mode,
            parallel_agents = self.cycle.parallel_agents,
            "Orchestrator starting"
        );

        let mut join_set = JoinSet::new();
        for wallet in wallets {
            let this = Arc::clone(&self);
            join_set.spawn(async move { this.run_wallet(wallet).await });
        }

        let mut total = WalletStats::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(stats) => total.merge(&stats),
                Err(e) => error!(error = %e, "Wallet task panicked"),
            }
        }

        info!(
            cycles = total.cycles,
            queries_ok = total.queries_ok,
            reports_ok = total.reports_ok,
            "Orchestrator stopped"
        );
        total
    }

    /// One wallet's loop: cycle over the agent set, pause, repeat.
    pub async fn run_wallet(self: Arc<Self>, wallet: String) -> WalletStats {
        self.emit(RunEvent::WalletStarted {
            wallet: wallet.clone(),
            at: chrono::Utc::now(),
        });

        let interval = Duration::from_secs(self.cycle.interval_seconds);
        let mut stats = WalletStats::default();

        while self.is_running() {
            if !self.run_cycle(&wallet, &mut stats).await {
                break;
            }
            stats.cycles += 1;
            self.emit(RunEvent::CycleCompleted {
                wallet: wallet.clone(),
                cycle: stats.cycles,
            });

            if !self.is_running() {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        debug!(wallet = %wallet, "Wallet loop unwinding");
        self.emit(RunEvent::WalletStopped {
            wallet,
            stats: stats.clone(),
            at: chrono::Utc::now(),
        });
        stats
    }

    /// Query every agent once for `wallet`. Returns `false` if cancellation
    /// cut the cycle short.
    pub async fn run_cycle(self: &Arc<Self>, wallet: &str, stats: &mut WalletStats) -> bool {
        if self.cycle.parallel_agents {
            return self.run_cycle_parallel(wallet, stats).await;
        }

        for agent in &self.agents {
            if !self.is_running() {
                return false;
            }
            self.process_agent(wallet, agent).await.apply(stats);
        }
        true
    }

    async fn run_cycle_parallel(self: &Arc<Self>, wallet: &str, stats: &mut WalletStats) -> bool {
        if !self.is_running() {
            return false;
        }

        let mut join_set = JoinSet::new();
        for agent in self.agents.iter().cloned() {
            let this = Arc::clone(self);
            let wallet = wallet.to_string();
            join_set.spawn(async move { this.process_agent(&wallet, &agent).await });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcome.apply(stats),
                Err(e) => error!(error = %e, "Agent task panicked"),
            }
        }
        true
    }

    /// Query one agent and report the exchange. Never fails; problems are
    /// emitted as events.
    async fn process_agent(&self, wallet: &str, agent: &AgentDescriptor) -> AgentOutcome {
        let services = &self.services;
        let proxy = services.rotator.next(self.mode.uses_proxy()).await;
        let transport = services.factory.build(proxy.as_deref());

        if let Some(uri) = proxy.as_deref() {
            if transport.proxy().is_none() {
                // the factory could not use it; keep it out of rotation
                services.rotator.mark_failed(uri).await;
            } else {
                self.emit(RunEvent::ProxySelected {
                    wallet: wallet.to_string(),
                    agent_id: agent.id.clone(),
                    proxy: redact(uri),
                });
            }
        }

        let result = match services.query.ask(agent, &transport).await {
            Ok(result) => result,
            Err(AgentError::Cancelled) => {
                debug!(wallet = %wallet, agent_id = %agent.id, "Query dropped on shutdown");
                return AgentOutcome {
                    answered: false,
                    report: None,
                    skipped: true,
                };
            }
            Err(e) => {
                if e.is_egress_fault() {
                    if let Some(uri) = transport.proxy() {
                        services.rotator.mark_failed(uri).await;
                    }
                }
                self.emit(RunEvent::QueryFailed {
                    wallet: wallet.to_string(),
                    agent_id: agent.id.clone(),
                    error: e.to_string(),
                });
                return AgentOutcome {
                    answered: false,
                    report: None,
                    skipped: false,
                };
            }
        };

        self.emit(RunEvent::Exchange {
            wallet: wallet.to_string(),
            agent_name: agent.display_name.clone(),
            result: result.clone(),
        });

        let outcome = services
            .usage
            .report(wallet, &agent.id, &result.question, &result.answer)
            .await;
        self.emit(RunEvent::UsageReported {
            wallet: wallet.to_string(),
            agent_id: agent.id.clone(),
            outcome,
        });

        AgentOutcome {
            answered: true,
            report: Some(outcome),
            skipped: false,
        }
    }

    fn emit(&self, event: RunEvent) {
        self.services.events.emit(event);
    }
}
