//! cross-queue - Manage the scheduled post queue

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use libcrosscast::credentials::{CredentialGateway, TokenCipher};
use libcrosscast::http::ApiClient;
use libcrosscast::platforms::PublisherRegistry;
use libcrosscast::scheduler::{DbTaskQueue, SchedulerService};
use libcrosscast::types::{PlatformKind, ScheduledStatus};
use libcrosscast::{Config, CrosscastError, Database, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-queue")]
#[command(version)]
#[command(about = "Manage the scheduled post queue", long_about = None)]
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
    /// Schedule a post for future publication
    Add {
        /// Content to publish (reads from stdin if not provided)
        content: Option<String>,

        /// Business the post belongs to
        #[arg(short, long)]
        business: String,

        /// Connected social account to publish as
        #[arg(short, long)]
        account: String,

        /// When to publish (RFC 3339 timestamp or epoch seconds)
        #[arg(long, value_name = "TIME")]
        at: String,

        /// Platform-specific parameters as a JSON object
        #[arg(long, value_name = "JSON")]
        params: Option<String>,
    },

    /// List scheduled posts
    List {
        /// Filter by business
        #[arg(short, long)]
        business: Option<String>,

        /// Filter by status (pending, queued, published, failed, ...)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by platform (linkedin, twitter, meta)
        #[arg(short, long)]
        platform: Option<String>,

        /// Maximum number of posts to show
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },

    /// Cancel a pending or queued post
    Cancel {
        /// Scheduled post id
        id: String,
    },

    /// Move a pending post to a new time
    Reschedule {
        /// Scheduled post id
        id: String,

        /// New publication time (RFC 3339 timestamp or epoch seconds)
        #[arg(long, value_name = "TIME")]
        at: String,

        /// Replace the post content
        #[arg(long)]
        content: Option<String>,

        /// Replace the platform parameters
        #[arg(long, value_name = "JSON")]
        params: Option<String>,
    },

    /// Show per-platform queue counts
    Stats,

    /// Queue due posts and expire overdue ones (one maintenance pass)
    Sweep,
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
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let service = build_service(&config, db.clone())?;
    let json = cli.format == "json";

    match cli.command {
        Command::Add {
            content,
            business,
            account,
            at,
            params,
        } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let scheduled_for = parse_time(&at)?;
            let post = service
                .schedule(&business, &account, &content, params.as_deref(), scheduled_for)
                .await?;
            if json {
                print_json(&post)?;
            } else {
                println!("Scheduled {} for {}", post.id, format_time(post.scheduled_for));
            }
        }

        Command::List {
            business,
            status,
            platform,
            limit,
        } => {
            let status = status
                .map(|s| parse_status(&s))
                .transpose()?;
            let platform = platform
                .map(|p| {
                    PlatformKind::from_str(&p).map_err(CrosscastError::InvalidInput)
                })
                .transpose()?;
            let posts = db
                .list_scheduled_posts(business.as_deref(), status, platform, limit)
                .await?;
            if json {
                print_json(&posts)?;
            } else if posts.is_empty() {
                println!("No scheduled posts");
            } else {
                for post in posts {
                    println!(
                        "{}  {:<9}  {:<8}  {}  {}",
                        post.id,
                        post.status,
                        post.platform,
                        format_time(post.scheduled_for),
                        truncate(&post.content_text, 40)
                    );
                }
            }
        }

        Command::Cancel { id } => {
            service.cancel(&id).await?;
            if json {
                print_json(&serde_json::json!({ "cancelled": id }))?;
            } else {
                println!("Cancelled {}", id);
            }
        }

        Command::Reschedule {
            id,
            at,
            content,
            params,
        } => {
            let scheduled_for = parse_time(&at)?;
            let post = service
                .reschedule(&id, scheduled_for, content.as_deref(), params.as_deref())
                .await?;
            if json {
                print_json(&post)?;
            } else {
                println!("Rescheduled {} for {}", post.id, format_time(post.scheduled_for));
            }
        }

        Command::Stats => {
            let stats = service.queue_stats().await?;
            if json {
                let rows: Vec<serde_json::Value> = stats
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "platform": s.platform,
                            "status": s.status,
                            "count": s.count,
                        })
                    })
                    .collect();
                print_json(&rows)?;
            } else if stats.is_empty() {
                println!("Queue is empty");
            } else {
                for stat in stats {
                    println!("{:<8}  {:<9}  {}", stat.platform, stat.status, stat.count);
                }
            }
        }

        Command::Sweep => {
            let now = chrono::Utc::now().timestamp();
            let queued = service.sweep_due(now).await?;
            let expired = service.expire_overdue(now).await?;
            if json {
                print_json(&serde_json::json!({ "queued": queued, "expired": expired }))?;
            } else {
                println!("Queued {} posts, expired {}", queued, expired);
            }
        }
    }
    Ok(())
}

fn build_service(config: &Config, db: Database) -> Result<SchedulerService> {
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

fn read_stdin() -> Result<String> {
    use std::io::Read;
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|e| CrosscastError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
    Ok(content.trim_end().to_string())
}

/// Accepts RFC 3339 timestamps or plain epoch seconds.
fn parse_time(input: &str) -> Result<i64> {
    if let Ok(epoch) = input.parse::<i64>() {
        return Ok(epoch);
    }
    chrono::DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.timestamp())
        .map_err(|_| {
            CrosscastError::InvalidInput(format!(
                "Invalid time '{}'. Use RFC 3339 (2026-09-01T12:00:00Z) or epoch seconds",
                input
            ))
        })
}

fn format_time(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}

fn parse_status(input: &str) -> Result<ScheduledStatus> {
    serde_json::from_value(serde_json::Value::String(input.to_lowercase()))
        .map_err(|_| {
            CrosscastError::InvalidInput(format!(
                "Invalid status '{}'. Valid options: pending, queued, publishing, published, partial, failed, cancelled, expired",
                input
            ))
        })
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let cut: String = flattened.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CrosscastError::InvalidInput(format!("Failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_epoch() {
        assert_eq!(parse_time("1900000000").unwrap(), 1_900_000_000);
    }

    #[test]
    fn test_parse_time_rfc3339() {
        let parsed = parse_time("2026-09-01T12:00:00Z").unwrap();
        assert_eq!(parsed, 1_788_264_000);
    }

    #[test]
    fn test_parse_time_invalid() {
        assert!(parse_time("tomorrow").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("pending").unwrap(), ScheduledStatus::Pending);
        assert_eq!(parse_status("QUEUED").unwrap(), ScheduledStatus::Queued);
        assert!(parse_status("limbo").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer piece of text", 8), "a longer…");
    }
}
