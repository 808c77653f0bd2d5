//! Kite - agent query bot
//!
//! Repeatedly asks a fixed set of AI agents a random prompt on behalf of one
//! or more wallets and reports every exchange to a usage collector, under a
//! shared rate limit and with optional proxy rotation.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kite::models::{ConnectionMode, KiteConfig, PromptBook};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = KiteConfig::default();
//! let prompts = PromptBook::new(vec!["What is a rollup?".to_string()]).unwrap();
//! let orchestrator = Arc::new(kite::build_orchestrator(
//!     &config,
//!     ConnectionMode::Direct,
//!     Vec::new(),
//!     prompts,
//! )?);
//! let stats = orchestrator.run(vec!["0xabc".to_string()]).await;
//! # Ok(())
//! # }
//! ```

pub mod inputs;

pub use kite_agents as agents;
pub use kite_models as models;
pub use kite_net as net;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use kite_agents::{BackoffPolicy, HttpAgentQuery, Orchestrator, Services, TracingSink, UsageReporter};
use kite_models::{ConnectionMode, KiteConfig, PromptBook};
use kite_net::{ProxyRotator, RateLimiter, TransportFactory};
use tokio_util::sync::CancellationToken;

/// Read and validate a TOML config. `None` yields the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<KiteConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            toml::from_str::<KiteConfig>(&raw).with_context(|| "Failed to parse config")?
        }
        None => KiteConfig::default(),
    };
    config
        .validate()
        .map_err(|e| anyhow!("Invalid config: {e}"))?;
    Ok(config)
}

/// Build an Orchestrator from configuration.
///
/// One rate limiter is shared by every agent query and usage report across
/// all wallets. Usage reports always go out directly, sent once per attempt;
/// the reporter's own backoff is the only retry for them.
pub fn build_orchestrator(
    config: &KiteConfig,
    mode: ConnectionMode,
    proxies: Vec<String>,
    prompts: PromptBook,
) -> Result<Orchestrator> {
    let cancel = CancellationToken::new();
    let limiter = Arc::new(
        RateLimiter::from_config(&config.rate_limit).context("Failed to build rate limiter")?,
    );
    let factory = TransportFactory::from_config(&config.transport);
    let rotator = Arc::new(ProxyRotator::new(proxies, &config.proxy));

    let query = HttpAgentQuery::new(
        Arc::new(prompts),
        Arc::clone(&limiter),
        config.endpoints.clone(),
    )
    .with_cancel(cancel.clone());
    let usage = UsageReporter::new(
        factory.without_retries().direct(),
        limiter,
        config.endpoints.usage_url.clone(),
        BackoffPolicy::from_config(&config.usage),
    )
    .with_cancel(cancel.clone());

    let services = Services {
        query: Arc::new(query),
        usage: Arc::new(usage),
        rotator,
        factory,
        events: Arc::new(TracingSink),
    };

    Ok(
        Orchestrator::new(config.agents.clone(), services, mode, config.cycle.clone())
            .with_cancel_token(cancel),
    )
}
