//! cross-send - Background daemon for scheduled publishing
//!
//! Monitors the scheduled post queue and publishes content to the
//! connected platforms when it comes due.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use libcrosscast::credentials::{CredentialGateway, TokenCipher};
use libcrosscast::http::ApiClient;
use libcrosscast::platforms::PublisherRegistry;
use libcrosscast::scheduler::{DbTaskQueue, SchedulerService};
use libcrosscast::{Config, Database, Result};
use tokio::time::sleep;
use tracing::{error, info};

const TASK_BATCH_SIZE: i64 = 50;

#[derive(Parser, Debug)]
#[command(name = "cross-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
cross-send - Background daemon for scheduled publishing

DESCRIPTION:
    cross-send is a long-running daemon that monitors the Crosscast queue
    and publishes scheduled content at the right time.

    Each cycle it queues pending posts that have come due, executes queued
    tasks whose ETA has passed, and expires posts that sat unpublished for
    too long. Failed attempts are retried with exponential backoff until
    the retry budget is spent.

USAGE:
    # Run in foreground (logs to stderr)
    cross-send

    # Run with custom poll interval
    cross-send --poll-interval 30

    # Process one cycle and exit
    cross-send --once

SIGNALS:
    SIGINT (Ctrl-C) - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Database location: ~/.local/share/crosscast/crosscast.db

    [scheduler]
    poll_interval_secs = 60   # seconds between polls
    queue_window_secs = 60    # queue posts due within this window
    grace_secs = 300          # still publish posts this far past due
    expiry_days = 7           # expire posts overdue by this many days
    max_publish_retries = 3   # retry failed publishes

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Authentication error
    3 - Invalid input
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Process one cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    libcrosscast::logging::init("info", cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduler.poll_interval_secs);
    let service = build_service(&config).await?;

    info!(poll_interval, "cross-send started");

    loop {
        if let Err(e) = cycle(&service).await {
            // Keep the daemon alive; the next poll retries from the database.
            error!(error = %e, "cycle failed");
        }

        if cli.once {
            break;
        }

        tokio::select! {
            _ = sleep(Duration::from_secs(poll_interval)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("cross-send stopped");
    Ok(())
}

async fn cycle(service: &SchedulerService) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let queued = service.sweep_due(now).await?;
    if queued > 0 {
        info!(queued, "queued due posts");
    }
    let processed = service.process_due_tasks(now, TASK_BATCH_SIZE).await?;
    if processed > 0 {
        info!(processed, "executed due tasks");
    }
    service.expire_overdue(now).await?;
    Ok(())
}

async fn build_service(config: &Config) -> Result<SchedulerService> {
    let db = Database::new(&config.database.path).await?;
    let http = ApiClient::new(config.http.backoff_policy())?;
    let cipher = TokenCipher::from_passphrase_file(&config.credentials.passphrase_file)?;
    let gateway = CredentialGateway::new(
        db.clone(),
        cipher,
        http.clone(),
        config.endpoints.clone(),
    );
    let registry = PublisherRegistry::new(
        http,
        &config.endpoints,
        Duration::from_secs(config.scheduler.instagram_container_delay_secs),
    );
    let queue = Arc::new(DbTaskQueue::new(db.clone()));
    Ok(SchedulerService::new(
        db,
        queue,
        gateway,
        registry,
        config.scheduler.clone(),
    ))
}
