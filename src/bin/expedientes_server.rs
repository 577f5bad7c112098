//!
//! expedientes server binary
//! -------------------------
//! Command-line entry point for the HTTP server. Configuration comes from environment
//! variables; `--http-port`, `--database-url` and `--files-dir` override them.

use anyhow::Result;
use std::env;

use expedientes::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with env filter, defaulting to info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = ServerConfig::from_env_and_args(&args)?;
    tracing::info!(
        target: "startup",
        "expedientes starting: http_port={}, database={}, files_dir='{}', enforce_api_permissions={}",
        config.http_port,
        if config.database_url.is_some() { "postgres" } else { "memory" },
        config.files_dir.display(),
        config.enforce_api_permissions
    );
    if let Err(e) = expedientes::server::run(config).await {
        tracing::error!(target: "startup", "fatal: {:#}", e);
        return Err(e);
    }
    Ok(())
}
