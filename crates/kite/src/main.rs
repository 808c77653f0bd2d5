use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kite::inputs;
use kite::models::ConnectionMode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "kite",
    about = "Kite agent query bot - asks AI agents on behalf of wallets and reports usage"
)]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connection mode for agent calls: direct or proxy
    #[arg(short, long, default_value = "direct")]
    mode: ConnectionMode,

    /// Wallet address to run; repeat for several. Overrides --wallets-file
    #[arg(short, long = "wallet")]
    wallets: Vec<String>,

    /// File with one wallet address per line
    #[arg(long, default_value = "wallets.txt")]
    wallets_file: PathBuf,

    /// File with one proxy URI per line
    #[arg(long, default_value = "proxies.txt")]
    proxies_file: PathBuf,

    /// JSON array of prompts
    #[arg(short, long, default_value = "questions.json")]
    questions: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    // Respects RUST_LOG, defaulting to info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = kite::load_config(cli.config.as_deref())?;

    let wallets = if cli.wallets.is_empty() {
        inputs::load_wallets(&cli.wallets_file)?
    } else {
        inputs::normalize_wallets(&cli.wallets)
    };
    anyhow::ensure!(!wallets.is_empty(), "No wallet address given");

    let prompts = inputs::load_prompts(&cli.questions)?;
    let proxies = if cli.mode.uses_proxy() {
        inputs::load_proxies(&cli.proxies_file)?
    } else {
        Vec::new()
    };

    let orchestrator = Arc::new(
        kite::build_orchestrator(&config, cli.mode, proxies, prompts)
            .context("Failed to build orchestrator")?,
    );
    let cancel = orchestrator.cancel_token();

    // Handle shutdown signals
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
        signal_cancel.cancel();
    });

    let mut run = tokio::spawn(Arc::clone(&orchestrator).run(wallets));
    let shutdown_timeout = Duration::from_secs(config.cycle.shutdown_timeout_seconds);

    let stats = tokio::select! {
        joined = &mut run => Some(joined.context("Run loop panicked")?),
        _ = cancel.cancelled() => {
            info!(timeout_secs = shutdown_timeout.as_secs(), "Waiting for in-flight work");
            match tokio::time::timeout(shutdown_timeout, &mut run).await {
                Ok(joined) => Some(joined.context("Run loop panicked")?),
                Err(_) => {
                    warn!("In-flight work did not finish in time, abandoning it");
                    run.abort();
                    None
                }
            }
        }
    };

    if let Some(stats) = stats {
        info!(
            cycles = stats.cycles,
            queries_ok = stats.queries_ok,
            queries_failed = stats.queries_failed,
            reports_ok = stats.reports_ok,
            reports_failed = stats.reports_failed,
            "Run finished"
        );
    }

    tokio::time::sleep(Duration::from_millis(config.cycle.shutdown_grace_ms)).await;
    info!("Goodbye");
    Ok(())
}
