//! drip - Feed folders of content to your social targets
//!
//! Command-line front end over libdripfeed: prepare posts from content
//! folders, schedule them on an interval, and push due posts out.

use clap::{Parser, Subcommand};
use libdripfeed::schedule::parse_when;
use libdripfeed::{
    Config, DripfeedError, MockPublisher, Post, PostStore, Preparer, Result, Scheduler, Target,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drip")]
#[command(version)]
#[command(about = "Feed folders of content to your social targets")]
#[command(long_about = "\
drip - Feed folders of content to your social targets

DESCRIPTION:
    drip treats every folder under your content root as one potential
    post. Each configured target gets its own prepared copy of the post,
    normalized through the target's constraint pipeline, scheduled on the
    target's interval and published when due.

COMMANDS:
    prepare     Reconcile content folders into post records
    schedule    Schedule the next post for each target
    due         Show the post currently due for each target
    publish     Publish due posts
    list        List post records

USAGE EXAMPLES:
    # Prepare every folder for every target
    drip prepare

    # Prepare one folder for one target
    drip prepare --sources trip-2026 --targets mastodon

    # Schedule the next post, overriding the interval date
    drip schedule --date \"tomorrow 9am\"

    # Publish whatever is due, without side effects
    drip publish --dry-run

CONFIGURATION:
    Configuration file: ~/.config/dripfeed/config.toml

    Override with environment variables:
        DRIPFEED_CONFIG      - Path to config file
        DRIPFEED_LOG_FORMAT  - text, json or pretty
        DRIPFEED_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Post not in a publishable state
    3 - Invalid input (bad date, unknown target, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "DRIPFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Only operate on these source folders (comma-separated)
    #[arg(short, long, global = true, value_delimiter = ',')]
    sources: Vec<String>,

    /// Only operate on these targets (comma-separated)
    #[arg(short, long, global = true, value_delimiter = ',')]
    targets: Vec<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile content folders into post records
    Prepare,

    /// Schedule the next post for each target
    Schedule {
        /// Schedule date (e.g. "2h", "tomorrow 9am", "2026-09-01")
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show the post currently due for each target
    Due,

    /// Publish due posts
    Publish {
        /// Go through the motions without publishing
        #[arg(long)]
        dry_run: bool,
    },

    /// List post records
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        libdripfeed::logging::init_default();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let store = PostStore::new(config.content_root());

    let sources = resolve_sources(&store, &cli.sources)?;
    let targets = resolve_targets(&config, &cli.targets)?;

    match cli.command {
        Commands::Prepare => cmd_prepare(&store, &sources, &targets),
        Commands::Schedule { date } => cmd_schedule(&store, &sources, &targets, date.as_deref()),
        Commands::Due => cmd_due(&store, &sources, &targets),
        Commands::Publish { dry_run } => cmd_publish(&store, &sources, &targets, dry_run).await,
        Commands::List { format } => cmd_list(&store, &sources, &targets, &format),
    }
}

/// Validate the source filter against the folders that actually exist.
fn resolve_sources(store: &PostStore, filter: &[String]) -> Result<Vec<String>> {
    let all = store.list_sources()?;
    if filter.is_empty() {
        return Ok(all);
    }
    for wanted in filter {
        if !all.contains(wanted) {
            return Err(DripfeedError::InvalidInput(format!(
                "no such source folder: {}",
                wanted
            )));
        }
    }
    Ok(filter.to_vec())
}

fn resolve_targets(config: &Config, filter: &[String]) -> Result<Vec<Target>> {
    if filter.is_empty() {
        return Ok(config.all_targets());
    }
    filter.iter().map(|id| config.target(id)).collect()
}

fn cmd_prepare(store: &PostStore, sources: &[String], targets: &[Target]) -> Result<()> {
    let preparer = Preparer::new(store);
    for post in preparer.prepare_all(sources, targets)? {
        let held = if post.valid { "" } else { " (held back)" };
        println!("{}  {}{}", post.id, post.status, held);
    }
    Ok(())
}

fn cmd_schedule(
    store: &PostStore,
    sources: &[String],
    targets: &[Target],
    date: Option<&str>,
) -> Result<()> {
    let date = date.map(parse_when).transpose()?;
    let scheduler = Scheduler::new(store);
    for target in targets {
        match scheduler.schedule_next_post(target, sources, date)? {
            Some(post) => println!(
                "{}  scheduled for {}",
                post.id,
                post.scheduled_at
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default()
            ),
            None => println!("{}: nothing to schedule", target.id),
        }
    }
    Ok(())
}

fn cmd_due(store: &PostStore, sources: &[String], targets: &[Target]) -> Result<()> {
    let scheduler = Scheduler::new(store);
    for target in targets {
        match scheduler.get_due_post(target, sources)? {
            Some(post) => println!("{}  due since {}", post.id, due_date(&post)),
            None => println!("{}: nothing due", target.id),
        }
    }
    Ok(())
}

fn due_date(post: &Post) -> String {
    post.scheduled_at
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

async fn cmd_publish(
    store: &PostStore,
    sources: &[String],
    targets: &[Target],
    dry_run: bool,
) -> Result<()> {
    // Real transports plug in behind the Publisher trait; the built-in
    // publisher records the attempt locally.
    let publisher = MockPublisher::new();
    let scheduler = Scheduler::new(store);
    for target in targets {
        match scheduler
            .publish_due_post(target, sources, &publisher, dry_run)
            .await?
        {
            Some((post, true)) => println!("{}  published", post.id),
            Some((post, false)) => println!("{}  failed", post.id),
            None => println!("{}: nothing due", target.id),
        }
    }
    Ok(())
}

fn cmd_list(store: &PostStore, sources: &[String], targets: &[Target], format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(DripfeedError::InvalidInput(format!(
            "invalid format '{}', must be 'text' or 'json'",
            format
        )));
    }

    let mut posts = Vec::new();
    for target in targets {
        posts.extend(store.load_for_target(&target.id, sources)?);
    }

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&posts)
                .map_err(|e| DripfeedError::InvalidInput(e.to_string()))?
        );
    } else {
        for post in posts {
            println!(
                "{:30} {:12} valid={} files={} scheduled={}",
                post.id,
                post.status.to_string(),
                post.valid,
                post.files.len(),
                post.scheduled_at
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    }
    Ok(())
}
