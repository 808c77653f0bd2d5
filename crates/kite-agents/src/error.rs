use kite_net::NetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Transport error: {0}")]
    Net(#[from] NetError),

    #[error("Agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Cancelled before the request was sent")]
    Cancelled,
}

impl AgentError {
    /// Whether the proxy (or lack of connectivity) is the likely culprit.
    pub fn is_egress_fault(&self) -> bool {
        match self {
            AgentError::Net(e) => e.is_egress_fault(),
            // 407 Proxy Authentication Required
            AgentError::Status { status, .. } => *status == 407,
            AgentError::Parse(_) | AgentError::Cancelled => false,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::Net(NetError::Http(e))
    }
}
