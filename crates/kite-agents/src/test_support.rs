//! Scripted collaborators for exercising the orchestrator without a network.
//!
//! `MockQuery` answers (or fails) every question the same way and records
//! who was asked through which proxy. `RecordingUsage` and `RecordingSink`
//! capture what the orchestrator hands them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kite_models::{AgentDescriptor, ConnectionMode, CycleConfig, CycleResult, ReportOutcome, RunEvent};
use kite_net::{HttpTransport, NetError, ProxyRotator, RetryPolicy, TransportFactory};
use uuid::Uuid;

use crate::error::AgentError;
use crate::events::EventSink;
use crate::orchestrator::{Orchestrator, Services};
use crate::query::AgentQuery;
use crate::usage::UsageSink;

/// How a [`MockQuery`] responds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    Answer(String),
    /// Fails as if the proxy could not be reached.
    EgressFailure,
    /// Fails with a 500 from the agent.
    ServerFailure,
    /// Gives up as if shutdown arrived while waiting for a rate-limit slot.
    Cancelled,
}

/// A record of one `ask` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRecord {
    pub agent_id: String,
    pub proxy: Option<String>,
}

pub struct MockQuery {
    behavior: MockBehavior,
    delay: Duration,
    asked: Mutex<Vec<AskRecord>>,
    completed: AtomicUsize,
}

impl MockQuery {
    pub fn answering(answer: &str) -> Self {
        Self::with_behavior(MockBehavior::Answer(answer.to_string()))
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            asked: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    /// Make every call take `delay` before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn asked(&self) -> Vec<AskRecord> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn asked_agents(&self) -> Vec<String> {
        self.asked().into_iter().map(|r| r.agent_id).collect()
    }

    /// Calls that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentQuery for MockQuery {
    async fn ask(
        &self,
        agent: &AgentDescriptor,
        transport: &HttpTransport,
    ) -> Result<CycleResult, AgentError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(AskRecord {
                agent_id: agent.id.clone(),
                proxy: transport.proxy().map(str::to_string),
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Answer(answer) => Ok(CycleResult {
                exchange_id: Uuid::new_v4(),
                agent_id: agent.id.clone(),
                question: format!("Question for {}", agent.display_name),
                answer: answer.clone(),
                elapsed_ms: self.delay.as_millis() as u64,
            }),
            MockBehavior::EgressFailure => Err(AgentError::Net(NetError::InvalidProxy {
                uri: transport.proxy().unwrap_or("direct").to_string(),
                reason: "connection refused".to_string(),
            })),
            MockBehavior::ServerFailure => Err(AgentError::Status {
                status: 500,
                body: "internal error".to_string(),
            }),
            MockBehavior::Cancelled => Err(AgentError::Cancelled),
        }
    }
}

/// A record of one usage report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub wallet: String,
    pub agent_id: String,
    pub question: String,
    pub answer: String,
}

pub struct RecordingUsage {
    outcome: ReportOutcome,
    reports: Mutex<Vec<ReportRecord>>,
}

impl RecordingUsage {
    pub fn new(outcome: ReportOutcome) -> Self {
        Self {
            outcome,
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<ReportRecord> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for RecordingUsage {
    fn default() -> Self {
        Self::new(ReportOutcome::Reported)
    }
}

#[async_trait]
impl UsageSink for RecordingUsage {
    async fn report(
        &self,
        wallet: &str,
        agent_id: &str,
        question: &str,
        answer: &str,
    ) -> ReportOutcome {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(ReportRecord {
                wallet: wallet.to_string(),
                agent_id: agent_id.to_string(),
                question: question.to_string(),
                answer: answer.to_string(),
            });
        }
        self.outcome
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Three agents named `deployment_a`, `deployment_b`, `deployment_c`.
pub fn test_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new("deployment_a", "Alpha"),
        AgentDescriptor::new("deployment_b", "Beta"),
        AgentDescriptor::new("deployment_c", "Gamma"),
    ]
}

/// Everything a test needs to inspect after a run.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub query: Arc<MockQuery>,
    pub usage: Arc<RecordingUsage>,
    pub rotator: Arc<ProxyRotator>,
    pub events: Arc<RecordingSink>,
}

/// Wire an orchestrator to the given mocks. Transport retries are disabled.
pub fn harness(
    agents: Vec<AgentDescriptor>,
    query: MockQuery,
    usage: RecordingUsage,
    proxies: Vec<String>,
    mode: ConnectionMode,
    cycle: CycleConfig,
) -> Harness {
    let query = Arc::new(query);
    let usage = Arc::new(usage);
    let events = Arc::new(RecordingSink::default());
    let rotator = Arc::new(ProxyRotator::with_timings(
        proxies,
        Duration::from_secs(30),
        Duration::from_secs(300),
    ));

    let services = Services {
        query: query.clone(),
        usage: usage.clone(),
        rotator: rotator.clone(),
        factory: TransportFactory::new(RetryPolicy::new(0, Duration::ZERO), Duration::from_secs(5)),
        events: events.clone(),
    };

    Harness {
        orchestrator: Arc::new(Orchestrator::new(agents, services, mode, cycle)),
        query,
        usage,
        rotator,
        events,
    }
}
