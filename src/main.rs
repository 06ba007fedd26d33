//! QUINIELA — National Lottery agency client
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens this agency's bet file, and runs one full session against the
//! lottery server with graceful shutdown.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use quiniela::config::ClientConfig;
use quiniela::records::FileRecordSource;
use quiniela::session::Client;
use quiniela::shutdown;

const BANNER: &str = r#"
  ___  _   _ ___ _   _ ___ _____ _        _
 / _ \| | | |_ _| \ | |_ _| ____| |      / \
| | | | | | || ||  \| || ||  _| | |     / _ \
| |_| | |_| || || |\  || || |___| |___ / ___ \
 \__\_\\___/|___|_| \_|___|_____|_____/_/   \_\

  National Lottery agency client
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML (env vars override the file)
    let cfg = ClientConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        action = "config",
        result = "success",
        agency_id = cfg.agency.id,
        server_address = %cfg.server.address,
        max_batch_size = cfg.batch.max_size,
        retry_period_ms = cfg.results.retry_period_ms,
    );

    // -- Shutdown wiring -------------------------------------------------

    let cancel = CancellationToken::new();
    shutdown::spawn_signal_listener(cancel.clone());

    // -- Session ---------------------------------------------------------

    let mut source = FileRecordSource::open(&cfg.data_file()).await?;
    let mut client = Client::new(cfg, cancel);

    match client.run(&mut source).await {
        Ok(results) => {
            info!(
                action = "exit",
                result = "success",
                winners = results.winner_count(),
            );
            Ok(())
        }
        Err(err) if err.is_cancelled() => {
            info!(action = "exit", result = "interrupted");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quiniela=info"));

    let json_logging = std::env::var("QUINIELA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
