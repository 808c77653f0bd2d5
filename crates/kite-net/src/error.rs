use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid proxy '{uri}': {reason}")]
    InvalidProxy { uri: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NetError {
    /// Whether the failure happened on the way out (connect, timeout, proxy)
    /// rather than in the remote service.
    pub fn is_egress_fault(&self) -> bool {
        match self {
            NetError::Http(e) => e.is_connect() || e.is_timeout(),
            NetError::InvalidProxy { .. } => true,
            NetError::Config(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Http(e) if e.is_timeout())
    }
}
