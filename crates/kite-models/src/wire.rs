use serde::{Deserialize, Serialize};

/// Answer text used when the agent response carries no message content.
pub const NO_RESPONSE: &str = "No response";

/// Body posted to an agent's `/main` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub stream: bool,
}

impl ChatRequest {
    pub fn non_streaming(message: &str) -> Self {
        Self {
            message: message.to_string(),
            stream: false,
        }
    }
}

/// Chat-style response from an agent. Every level is optional so a partial
/// body still parses; use [`ChatCompletion::answer`] to read the content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Content of the first choice's message, if present.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }

    /// Content of the first choice, or [`NO_RESPONSE`].
    pub fn answer(&self) -> String {
        self.content().unwrap_or(NO_RESPONSE).to_string()
    }
}

/// Telemetry record posted to the usage collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageReport {
    pub wallet_address: String,
    pub agent_id: String,
    pub request_text: String,
    pub response_text: String,
    pub request_metadata: serde_json::Map<String, serde_json::Value>,
}

impl UsageReport {
    pub fn new(wallet: &str, agent_id: &str, question: &str, answer: &str) -> Self {
        Self {
            wallet_address: wallet.to_string(),
            agent_id: agent_id.to_string(),
            request_text: question.to_string(),
            response_text: answer.to_string(),
            request_metadata: serde_json::Map::new(),
        }
    }
}

/// Collector response body. Only the `error` field is inspected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageResponse {
    #[serde(default)]
    pub error: Option<String>,
}

impl UsageResponse {
    /// Whether the collector is asking us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|e| e.to_ascii_lowercase().contains("rate limit"))
    }
}
