use serde::{Deserialize, Serialize};

/// A remote conversational agent, identified by its deployment id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: String,
    pub display_name: String,
}

impl AgentDescriptor {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
        }
    }

    /// Host label this agent is served under.
    pub fn host(&self) -> String {
        agent_host(&self.id)
    }
}

/// Derive the host label for an agent id: lower-cased, with the first
/// underscore replaced by a hyphen.
pub fn agent_host(agent_id: &str) -> String {
    agent_id.to_lowercase().replacen('_', "-", 1)
}

/// The agent set queried when the config file does not name one.
pub fn default_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new("deployment_p5J9lz1Zxe7CYEoo0TZpRVay", "Professor"),
        AgentDescriptor::new("deployment_7sZJSiCqCNDy9bBHTEh7dwd9", "Crypto Buddy"),
        AgentDescriptor::new("deployment_SoFftlsf9z4fyA3QCHYkaANq", "Sherlock"),
    ]
}
