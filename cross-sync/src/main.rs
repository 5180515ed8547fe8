//! cross-sync - Pull per-post engagement metrics into the local database

use std::str::FromStr;

use clap::{Parser, Subcommand};
use libcrosscast::credentials::{CredentialGateway, TokenCipher};
use libcrosscast::http::ApiClient;
use libcrosscast::types::PlatformKind;
use libcrosscast::{AnalyticsSyncService, Config, CrosscastError, Database, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-sync")]
#[command(version)]
#[command(about = "Pull per-post engagement metrics into the local database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync metrics for every published post of a business
    Run {
        /// Business to sync
        #[arg(short, long)]
        business: String,

        /// Restrict the run to one platform (linkedin, twitter, meta)
        #[arg(short, long)]
        platform: Option<String>,

        /// Maximum number of posts to sync
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Sync metrics for a single published post
    Post {
        /// Published post id
        id: String,
    },

    /// Show how much of a business's posts have metrics
    Status {
        /// Business to inspect
        #[arg(short, long)]
        business: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    libcrosscast::logging::init("error", cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = build_service().await?;
    let json = cli.format == "json";

    match cli.command {
        Command::Run {
            business,
            platform,
            limit,
        } => {
            let platform = platform
                .map(|p| PlatformKind::from_str(&p).map_err(CrosscastError::InvalidInput))
                .transpose()?;
            let summary = service.sync_business(&business, platform, limit).await?;
            if json {
                print_json(&summary)?;
            } else {
                println!(
                    "Synced {}/{} posts ({} failed, {} rate limited)",
                    summary.synced, summary.total_posts, summary.failed, summary.rate_limited
                );
                let mut platforms: Vec<_> = summary.by_platform.iter().collect();
                platforms.sort_by_key(|(platform, _)| platform.as_str());
                for (platform, counts) in platforms {
                    println!(
                        "  {:<8}  {} synced, {} failed, {} rate limited",
                        platform, counts.synced, counts.failed, counts.rate_limited
                    );
                }
                for error in &summary.errors {
                    println!("Warning: {}", error);
                }
            }
        }

        Command::Post { id } => {
            let analytics = service.sync_single_post(&id).await?;
            if json {
                print_json(&analytics)?;
            } else {
                println!("Synced {} ({})", id, analytics.platform);
                println!(
                    "  likes {}  comments {}  shares {}  impressions {}",
                    analytics.likes, analytics.comments, analytics.shares, analytics.impressions
                );
                println!(
                    "  engagement rate {:.2}%  CTR {:.2}%",
                    analytics.engagement_rate, analytics.click_through_rate
                );
            }
        }

        Command::Status { business } => {
            let status = service.sync_status(&business).await?;
            if json {
                print_json(&status)?;
            } else {
                println!(
                    "{}/{} posts synced ({:.2}%)",
                    status.synced_posts, status.total_posts, status.sync_percentage
                );
                match status.last_sync_at {
                    Some(at) => println!(
                        "Last sync: {}",
                        chrono::DateTime::from_timestamp(at, 0)
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_else(|| at.to_string())
                    ),
                    None => println!("Last sync: never"),
                }
            }
        }
    }
    Ok(())
}

async fn build_service() -> Result<AnalyticsSyncService> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let http = ApiClient::new(config.http.backoff_policy())?;
    let cipher = TokenCipher::from_passphrase_file(&config.credentials.passphrase_file)?;
    let gateway = CredentialGateway::new(
        db.clone(),
        cipher,
        http.clone(),
        config.endpoints.clone(),
    );
    Ok(AnalyticsSyncService::new(
        db,
        gateway,
        http,
        config.endpoints,
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CrosscastError::InvalidInput(format!("Failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
