use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use kite_models::{AgentDescriptor, ChatCompletion, ChatRequest, CycleResult, EndpointsConfig, PromptBook};
use kite_net::{HttpTransport, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AgentError;

/// Longest error body kept in an [`AgentError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// One prompt/response exchange with an agent. Mockable for testing.
#[async_trait]
pub trait AgentQuery: Send + Sync {
    async fn ask(
        &self,
        agent: &AgentDescriptor,
        transport: &HttpTransport,
    ) -> Result<CycleResult, AgentError>;
}

/// Asks agents over HTTP with a randomly sampled prompt.
pub struct HttpAgentQuery {
    prompts: Arc<PromptBook>,
    limiter: Arc<RateLimiter>,
    endpoints: EndpointsConfig,
    cancel: CancellationToken,
}

impl HttpAgentQuery {
    pub fn new(prompts: Arc<PromptBook>, limiter: Arc<RateLimiter>, endpoints: EndpointsConfig) -> Self {
        Self {
            prompts,
            limiter,
            endpoints,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up waiting for a rate-limit slot once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait]
impl AgentQuery for HttpAgentQuery {
    async fn ask(
        &self,
        agent: &AgentDescriptor,
        transport: &HttpTransport,
    ) -> Result<CycleResult, AgentError> {
        if !self.limiter.await_slot_or_cancel(&self.cancel).await {
            return Err(AgentError::Cancelled);
        }

        let question = self.prompts.sample();
        let url = self.endpoints.agent_url(agent);
        debug!(agent = %agent.display_name, url = %url, "Asking agent");

        let start = Instant::now();
        let response = transport
            .post_json(&url, &ChatRequest::non_streaming(&question))
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AgentError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let completion = parse_completion(&body)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(agent = %agent.display_name, elapsed_ms, "Agent answered");

        Ok(CycleResult {
            exchange_id: Uuid::new_v4(),
            agent_id: agent.id.clone(),
            question,
            answer: completion.answer(),
            elapsed_ms,
        })
    }
}

/// Parse an agent response body. Missing fields are tolerated; a body that
/// is not JSON at all is an error.
pub fn parse_completion(body: &str) -> Result<ChatCompletion, AgentError> {
    serde_json::from_str(body)
        .map_err(|e| AgentError::Parse(format!("{e} (length={})", body.len())))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_models::NO_RESPONSE;

    #[test]
    fn parse_full_completion() {
        let completion = parse_completion(
            r#"{"choices":[{"message":{"role":"assistant","content":"Proof of stake is..."}}]}"#,
        )
        .unwrap();
        assert_eq!(completion.answer(), "Proof of stake is...");
    }

    #[test]
    fn parse_partial_completion_falls_back() {
        let completion = parse_completion(r#"{"id":"x"}"#).unwrap();
        assert_eq!(completion.answer(), NO_RESPONSE);
    }

    #[test]
    fn parse_non_json_fails() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
        assert!(!err.is_egress_fault());
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééé", 2), "éé...");
    }
}
