pub mod agent;
pub mod config;
pub mod event;
pub mod prompt;
pub mod wire;

pub use agent::{agent_host, default_agents, AgentDescriptor};
pub use config::{
    ConnectionMode, CycleConfig, EndpointsConfig, KiteConfig, ProxyConfig, RateLimitConfig,
    TransportConfig, UsageConfig,
};
pub use event::{CycleResult, ReportOutcome, RunEvent, WalletStats};
pub use prompt::PromptBook;
pub use wire::{ChatCompletion, ChatRequest, UsageReport, UsageResponse, NO_RESPONSE};
