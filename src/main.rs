//! Agent Matchmaker server
//!
//! Serves the matching trigger endpoints, or with `--run-once` performs a
//! single matching pass and prints the report.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use agent_matchmaker::config::{AppConfig, Cli};
use agent_matchmaker::{server, telemetry};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before clap reads env-backed flags
    let _ = dotenv();

    let cli = Cli::parse();

    // Initialize tracing (M-LOG-STRUCTURED)
    telemetry::init(cli.log_json);

    let config = match AppConfig::from_cli(&cli) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!(
        name: "config.loaded",
        provider = %config.persistence.provider,
        term_matcher = ?config.matching.term_matcher,
        "Configuration loaded"
    );

    if cli.run_once {
        let state = server::build_state(config).await?;
        let report = state.runs.run_today().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    server::start_server(config).await
}
