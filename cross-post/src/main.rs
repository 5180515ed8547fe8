//! cross-post - Publish content to a connected social account immediately

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use libcrosscast::credentials::{CredentialGateway, TokenCipher};
use libcrosscast::http::ApiClient;
use libcrosscast::platforms::PublisherRegistry;
use libcrosscast::scheduler::{DbTaskQueue, SchedulerService};
use libcrosscast::{Config, CrosscastError, Database, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-post")]
#[command(version)]
#[command(about = "Publish content to a connected social account immediately", long_about = None)]
struct Cli {
    /// Content to publish (reads from stdin if not provided)
    content: Option<String>,

    /// Business the post belongs to
    #[arg(short, long)]
    business: String,

    /// Connected social account to publish as
    #[arg(short, long)]
    account: String,

    /// Platform-specific parameters as a JSON object
    #[arg(long, value_name = "JSON")]
    params: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
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
    let content = match cli.content {
        Some(content) => content,
        None => read_stdin()?,
    };
    if content.trim().is_empty() {
        return Err(CrosscastError::InvalidInput(
            "Content cannot be empty".to_string(),
        ));
    }

    let service = build_service().await?;
    let post = service
        .publish_now(&cli.business, &cli.account, &content, cli.params.as_deref())
        .await?;

    match cli.format.as_str() {
        "json" => {
            let rendered = serde_json::to_string_pretty(&post).map_err(|e| {
                CrosscastError::InvalidInput(format!("Failed to render output: {}", e))
            })?;
            println!("{}", rendered);
        }
        _ => {
            println!("Published to {} ({})", post.platform, post.status);
            if let Some(url) = &post.platform_post_url {
                println!("{}", url);
            }
            if let Some(error) = &post.error_message {
                println!("Warning: {}", error);
            }
        }
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|e| CrosscastError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
    Ok(content.trim_end().to_string())
}

async fn build_service() -> Result<SchedulerService> {
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
        config.scheduler,
    ))
}
