use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::{default_agents, AgentDescriptor};

/// How outbound agent calls leave the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Direct,
    Proxy,
}

impl ConnectionMode {
    pub fn uses_proxy(self) -> bool {
        self == ConnectionMode::Proxy
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "1" => Ok(ConnectionMode::Direct),
            "proxy" | "2" => Ok(ConnectionMode::Proxy),
            other => Err(format!("unknown connection mode: {other} (expected direct or proxy)")),
        }
    }
}

/// Top-level configuration. Every section is defaulted, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KiteConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentDescriptor>,
}

impl Default for KiteConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            proxy: ProxyConfig::default(),
            transport: TransportConfig::default(),
            usage: UsageConfig::default(),
            cycle: CycleConfig::default(),
            endpoints: EndpointsConfig::default(),
            agents: default_agents(),
        }
    }
}

impl KiteConfig {
    /// Reject values that would make the run loop meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.requests_per_minute == 0 {
            return Err("rate_limit.requests_per_minute must be greater than zero".to_string());
        }
        if self.rate_limit.window_seconds == 0 {
            return Err("rate_limit.window_seconds must be greater than zero".to_string());
        }
        if self.agents.is_empty() {
            return Err("at least one agent must be configured".to_string());
        }
        if let Some(agent) = self.agents.iter().find(|a| a.id.trim().is_empty()) {
            return Err(format!("agent '{}' has an empty id", agent.display_name));
        }
        Ok(())
    }
}

/// Sliding-window limit shared by agent queries and usage reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Length of the sliding window.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Pause before the failed set is cleared once every proxy has failed.
    #[serde(default = "default_exhaustion_cooldown")]
    pub exhaustion_cooldown_seconds: u64,
    /// How long a failed proxy stays excluded on its own.
    #[serde(default = "default_failure_ttl")]
    pub failure_ttl_seconds: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            exhaustion_cooldown_seconds: default_exhaustion_cooldown(),
            failure_ttl_seconds: default_failure_ttl(),
        }
    }
}

/// Connection-level retry for agent calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    #[serde(default = "default_transport_retries")]
    pub max_retries: u32,
    #[serde(default = "default_transport_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: default_transport_retries(),
            base_delay_ms: default_transport_base_delay(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Application-level retry for rate-limited usage reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageConfig {
    #[serde(default = "default_usage_retries")]
    pub max_retries: u32,
    #[serde(default = "default_usage_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_usage_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            max_retries: default_usage_retries(),
            base_delay_ms: default_usage_base_delay(),
            max_delay_ms: default_usage_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleConfig {
    /// Pause between two passes over the agent set.
    #[serde(default = "default_cycle_interval")]
    pub interval_seconds: u64,
    /// Query the whole agent set concurrently instead of in order.
    #[serde(default)]
    pub parallel_agents: bool,
    /// Delay between the end of the run loop and process exit.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
    /// Upper bound on waiting for in-flight calls after an interrupt.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_cycle_interval(),
            parallel_agents: false,
            shutdown_grace_ms: default_shutdown_grace(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointsConfig {
    /// Domain agents are served under, as `{host}.{agent_domain}`.
    #[serde(default = "default_agent_domain")]
    pub agent_domain: String,
    /// Routes agent calls to `{agent_base_url}/{host}/main` instead of the
    /// per-agent https host. Meant for staging and local mocks.
    #[serde(default)]
    pub agent_base_url: Option<String>,
    #[serde(default = "default_usage_url")]
    pub usage_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            agent_domain: default_agent_domain(),
            agent_base_url: None,
            usage_url: default_usage_url(),
        }
    }
}

impl EndpointsConfig {
    /// Full URL of an agent's chat endpoint.
    pub fn agent_url(&self, agent: &AgentDescriptor) -> String {
        let host = agent.host();
        match &self.agent_base_url {
            Some(base) => format!("{}/{host}/main", base.trim_end_matches('/')),
            None => format!("https://{host}.{}/main", self.agent_domain),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    15
}
fn default_window_seconds() -> u64 {
    60
}
fn default_exhaustion_cooldown() -> u64 {
    30
}
fn default_failure_ttl() -> u64 {
    300
}
fn default_transport_retries() -> u32 {
    3
}
fn default_transport_base_delay() -> u64 {
    1000
}
fn default_request_timeout() -> u64 {
    60
}
fn default_usage_retries() -> u32 {
    5
}
fn default_usage_base_delay() -> u64 {
    2000
}
fn default_usage_max_delay() -> u64 {
    10_000
}
fn default_cycle_interval() -> u64 {
    15
}
fn default_shutdown_grace() -> u64 {
    1000
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_agent_domain() -> String {
    "stag-vxzy.zettablock.com".to_string()
}
fn default_usage_url() -> String {
    "https://quests-usage-dev.prod.zettablock.com/api/report_usage".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: KiteConfig = toml::from_str("").unwrap();
        assert_eq!(config, KiteConfig::default());
        assert_eq!(config.rate_limit.requests_per_minute, 15);
        assert_eq!(config.usage.max_retries, 5);
        assert_eq!(config.transport.base_delay_ms, 1000);
        assert_eq!(config.cycle.interval_seconds, 15);
        assert_eq!(config.agents.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml_str = r#"
[rate_limit]
requests_per_minute = 30

[cycle]
parallel_agents = true

[endpoints]
agent_base_url = "http://127.0.0.1:9000"

[[agents]]
id = "deployment_abc"
display_name = "Solo"
"#;
        let config: KiteConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rate_limit.requests_per_minute, 30);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert!(config.cycle.parallel_agents);
        assert_eq!(config.cycle.shutdown_grace_ms, 1000);
        assert_eq!(config.agents, vec![AgentDescriptor::new("deployment_abc", "Solo")]);
        assert_eq!(
            config.endpoints.agent_url(&config.agents[0]),
            "http://127.0.0.1:9000/deployment-abc/main"
        );
    }

    #[test]
    fn default_agent_url() {
        let endpoints = EndpointsConfig::default();
        let agent = AgentDescriptor::new("deployment_SoFftlsf9z4fyA3QCHYkaANq", "Sherlock");
        assert_eq!(
            endpoints.agent_url(&agent),
            "https://deployment-sofftlsf9z4fya3qchykaanq.stag-vxzy.zettablock.com/main"
        );
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let mut config = KiteConfig::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_rate_limit_fails_to_parse() {
        let result: Result<KiteConfig, _> = toml::from_str("[rate_limit]\nrequests_per_minute = -1\n");
        assert!(result.is_err());
    }

    #[test]
    fn empty_agent_set_rejected() {
        let mut config = KiteConfig::default();
        config.agents.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn connection_mode_parsing() {
        assert_eq!("proxy".parse::<ConnectionMode>().unwrap(), ConnectionMode::Proxy);
        assert_eq!("Direct".parse::<ConnectionMode>().unwrap(), ConnectionMode::Direct);
        assert_eq!("2".parse::<ConnectionMode>().unwrap(), ConnectionMode::Proxy);
        assert!("tor".parse::<ConnectionMode>().is_err());
        assert!(ConnectionMode::Proxy.uses_proxy());
    }

    #[test]
    fn roundtrip_config() {
        let config = KiteConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: KiteConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
