use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use podshelf::catalog::{normalize_labels, Catalog, EpisodeFilter, EpisodeView, FeedSummary};
use podshelf::config::{Backend, Config};
use podshelf::error::CatalogError;
use podshelf::feed::{duration_seconds, format_duration_short, parse_publish_date, HttpFetcher};
use podshelf::storage::{JsonFileStore, MemoryStore, SqliteStore, Store};
use podshelf::util::{fit_to_width, strip_control_chars};

const TITLE_WIDTH: usize = 48;
const PODCAST_WIDTH: usize = 24;

/// Get the config directory path (~/.config/podshelf/)
fn get_config_dir(home: &Path) -> PathBuf {
    home.join(".config").join("podshelf")
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home))
}

#[derive(Parser, Debug)]
#[command(name = "podshelf", about = "Podcast feed aggregator with episode tagging")]
struct Args {
    /// Config file (default: ~/.config/podshelf/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscribed feeds
    Feeds {
        #[arg(long)]
        json: bool,
    },
    /// Subscribe to a feed URL
    Add { url: String },
    /// Re-fetch one feed, or every feed with --all
    Refresh {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        feed_id: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Unsubscribe from a feed and drop its episodes' tags
    Remove { feed_id: String },
    /// List episodes across all feeds, newest first
    Episodes {
        /// Only episodes of this feed id
        #[arg(long)]
        podcast: Option<String>,
        /// Case-insensitive search in titles and descriptions
        #[arg(long, short)]
        query: Option<String>,
        /// Only episodes carrying this tag
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Replace an episode's tags (no tags clears them)
    Tag {
        episode_id: String,
        tags: Vec<String>,
    },
    /// List every tag in use
    Tags {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let home = home_dir()?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| get_config_dir(&home).join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let store = open_store(&config, &config.data_dir_or(&home)).await?;
    let fetcher = HttpFetcher::with_user_agent(&config.user_agent)
        .context("Failed to build HTTP client")?
        .timeout(config.fetch_timeout())
        .max_bytes(config.max_feed_bytes);

    let catalog = Catalog::new(store, Arc::new(fetcher))
        .host_policy(config.host_policy())
        .refresh_concurrency(config.refresh_concurrency);

    if let Err(e) = run(&catalog, args.command).await {
        match e.downcast_ref::<CatalogError>() {
            Some(catalog_error) => eprintln!("{}: {}", catalog_error.kind(), catalog_error),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn open_store(config: &Config, data_dir: &Path) -> Result<Arc<dyn Store>> {
    if config.backend == Backend::Memory {
        tracing::warn!("Memory backend selected, nothing will be saved");
        return Ok(Arc::new(MemoryStore::new()));
    }

    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    }

    // Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(data_dir, permissions) {
            tracing::warn!(
                path = %data_dir.display(),
                error = %e,
                "Failed to set data directory permissions to 0700"
            );
        }
    }

    match config.backend {
        Backend::Sqlite => {
            let db_path = data_dir.join("catalog.db");
            let db_path = db_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
            let store = SqliteStore::open(db_path)
                .await
                .context("Failed to open database")?;
            Ok(Arc::new(store))
        }
        Backend::Json | Backend::Memory => Ok(Arc::new(JsonFileStore::new(data_dir))),
    }
}

async fn run(catalog: &Catalog, command: Command) -> Result<()> {
    match command {
        Command::Feeds { json } => {
            let feeds = catalog.list_feeds().await?;
            if json {
                print_json(&feeds)?;
            } else {
                print_feeds(&feeds);
            }
        }
        Command::Add { url } => {
            let feed = catalog.add_feed(&url).await?;
            println!(
                "Added {} ({}) with {} episodes",
                clean(&feed.title),
                feed.id,
                feed.episodes.len()
            );
        }
        Command::Refresh { feed_id, all } => {
            if all {
                let outcomes = catalog.refresh_all().await?;
                for outcome in &outcomes {
                    match &outcome.result {
                        Ok(count) => println!("{}  {} episodes", outcome.feed_id, count),
                        Err(e) => println!("{}  {}: {}", outcome.feed_id, e.kind(), e),
                    }
                }
            } else if let Some(feed_id) = feed_id {
                let feed = catalog.refresh_feed(&feed_id).await?;
                println!(
                    "Refreshed {} with {} episodes",
                    clean(&feed.title),
                    feed.episodes.len()
                );
            }
        }
        Command::Remove { feed_id } => {
            let feed = catalog.delete_feed(&feed_id).await?;
            println!("Removed {}", clean(&feed.title));
        }
        Command::Episodes {
            podcast,
            query,
            tag,
            json,
        } => {
            let filter = EpisodeFilter {
                podcast_id: podcast,
                query,
                tag,
            };
            let episodes = catalog.list_episodes(&filter).await?;
            if json {
                print_json(&serde_json::json!({ "episodes": episodes }))?;
            } else {
                print_episodes(&episodes);
            }
        }
        Command::Tag { episode_id, tags } => {
            let stored = catalog
                .set_episode_tags(&episode_id, normalize_labels(tags))
                .await?;
            if stored.is_empty() {
                println!("Cleared tags on {}", episode_id);
            } else {
                println!("{}: {}", episode_id, stored.join(", "));
            }
        }
        Command::Tags { json } => {
            if json {
                let index = catalog.tag_index().await?;
                let by_episode: BTreeMap<&str, &[String]> = index.entries().collect();
                print_json(&serde_json::json!({
                    "tags": index.distinct_tags(),
                    "tagsByEpisodeId": by_episode,
                }))?;
            } else {
                for tag in catalog.list_tags().await? {
                    println!("{}", clean(&tag));
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn clean(text: &str) -> String {
    strip_control_chars(text).into_owned()
}

fn print_feeds(feeds: &[FeedSummary]) {
    if feeds.is_empty() {
        println!("No feeds yet. Add one with: podshelf add <url>");
        return;
    }
    for feed in feeds {
        println!(
            "{}  {}  {:>4} episodes  {}",
            feed.id,
            fit_to_width(&clean(&feed.title), TITLE_WIDTH),
            feed.episode_count,
            feed.last_fetched_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_episodes(episodes: &[EpisodeView]) {
    for episode in episodes {
        let date = parse_publish_date(&episode.pub_date)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        let duration = duration_seconds(episode.duration.as_deref())
            .map(format_duration_short)
            .unwrap_or_default();
        let tags = if episode.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", clean(&episode.tags.join(", ")))
        };
        println!(
            "{}  {}  {}  {:>7}  {}{}",
            date,
            fit_to_width(&clean(&episode.podcast_title), PODCAST_WIDTH),
            fit_to_width(&clean(&episode.episode_title), TITLE_WIDTH),
            duration,
            episode.episode_id,
            tags
        );
    }
}
