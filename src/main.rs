use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use graze::config::Config;
use graze::ingest::{FetchClient, Ingestor, Scheduler};
use graze::storage::{Database, StorageError, User};

/// Get the config directory path (~/.config/graze/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("graze"))
}

#[derive(Parser, Debug)]
#[command(name = "graze", about = "Feed aggregation daemon for RSS subscriptions")]
struct Args {
    /// Override the database file path
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// List all users
    Users,
    /// Register a feed owned by the current user (and follow it)
    Addfeed { name: String, url: String },
    /// List all registered feeds
    Feeds,
    /// Follow a registered feed
    Follow { url: String },
    /// Stop following a feed
    Unfollow { url: String },
    /// List the feeds the current user follows
    Following,
    /// Run one ingestion cycle for a single feed right now
    Fetch { url: String },
    /// Show recent posts from followed feeds
    Browse {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Run the polling scheduler until interrupted
    Run {
        /// Seconds between ticks (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Feed URLs must be fetchable over HTTP(S)
fn validate_feed_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).with_context(|| format!("Invalid feed URL: {url}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("Unsupported URL scheme '{other}' (only http/https allowed)"),
    }
}

async fn current_user(db: &Database, config: &Config) -> Result<User> {
    let name = config
        .current_user
        .as_deref()
        .context("No user logged in. Run `graze register <name>` first.")?;
    db.get_user_by_name(name)
        .await?
        .with_context(|| format!("Unknown user '{name}'. Run `graze register {name}` first."))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }
    let config_path = config_dir.join("config.toml");
    let mut config = Config::load(&config_path)?;

    let db_path = args
        .db
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("graze.db"));
    let db_path_str = db_path
        .to_str()
        .context("Invalid UTF-8 in database path")?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(e @ StorageError::InstanceLocked) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to open database"),
    };

    match args.command {
        Command::Register { name } => {
            let user = db.create_user(&name).await?;
            config.current_user = Some(user.name.clone());
            config.store(&config_path)?;
            println!("Registered and logged in as {}", user.name);
        }
        Command::Login { name } => {
            let user = db
                .get_user_by_name(&name)
                .await?
                .with_context(|| format!("Unknown user '{name}'"))?;
            config.current_user = Some(user.name.clone());
            config.store(&config_path)?;
            println!("Logged in as {}", user.name);
        }
        Command::Users => {
            let current = config.current_user.as_deref();
            for user in db.users().await? {
                if Some(user.name.as_str()) == current {
                    println!("* {} (current)", user.name);
                } else {
                    println!("* {}", user.name);
                }
            }
        }
        Command::Addfeed { name, url } => {
            validate_feed_url(&url)?;
            let user = current_user(&db, &config).await?;
            let feed = db.add_feed(&name, &url, user.id).await?;
            db.follow_feed(user.id, feed.id).await?;
            println!("Added feed '{}' ({})", feed.name, feed.url);
        }
        Command::Feeds => {
            for feed in db.all_feeds().await? {
                println!("* {} ({})", feed.name, feed.url);
            }
        }
        Command::Follow { url } => {
            let user = current_user(&db, &config).await?;
            let feed = db
                .feed_by_url(&url)
                .await?
                .with_context(|| format!("No feed registered with URL {url}"))?;
            db.follow_feed(user.id, feed.id).await?;
            println!("Following '{}'", feed.name);
        }
        Command::Unfollow { url } => {
            let user = current_user(&db, &config).await?;
            let feed = db
                .feed_by_url(&url)
                .await?
                .with_context(|| format!("No feed registered with URL {url}"))?;
            db.unfollow_feed(user.id, feed.id).await?;
            println!("Unfollowed '{}'", feed.name);
        }
        Command::Following => {
            let user = current_user(&db, &config).await?;
            for feed in db.followed_feeds(user.id).await? {
                println!("* {} ({})", feed.name, feed.url);
            }
        }
        Command::Fetch { url } => {
            let feed = db
                .feed_by_url(&url)
                .await?
                .with_context(|| format!("No feed registered with URL {url} (addfeed it first)"))?;
            let client = FetchClient::new(config.fetch_timeout())?;
            let ingestor = Ingestor::new(db.clone(), client);

            // One-off ingestion surfaces the error taxonomy synchronously
            // instead of only logging it.
            let report = ingestor.ingest(&feed).await?;
            println!("Fetched '{}': {report}", feed.name);
            for failure in &report.failures {
                eprintln!("  failed to store '{}': {}", failure.title, failure.error);
            }
        }
        Command::Browse { limit } => {
            let user = current_user(&db, &config).await?;
            for post in db.recent_posts_for_user(user.id, limit).await? {
                let published = post
                    .published_at
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "unknown date".to_string());
                println!("* [{published}] {}", post.title);
                println!("  {}", post.url);
                if let Some(description) = &post.description {
                    println!("  {description}");
                }
            }
        }
        Command::Run { interval } => {
            if let Some(seconds) = interval {
                config.poll_interval_seconds = seconds;
            }
            let interval = config.poll_interval()?;
            let client = FetchClient::new(config.fetch_timeout())?;
            let scheduler = Scheduler::new(db, client, interval)?;

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                    return;
                }
                signal.cancel();
            });

            scheduler.run(shutdown).await?;
        }
    }

    Ok(())
}
