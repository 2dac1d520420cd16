//! Forum-Tracker main entry point
//!
//! This is the operator command-line interface for the forum tracker.

use anyhow::Context;
use clap::{Parser, Subcommand};
use forum_tracker::config::{load_config_with_hash, Config};
use forum_tracker::notify::StdoutNotifier;
use forum_tracker::{SubscriberId, Tracker};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Forum-Tracker: watches forum threads and sub-forums for new content
///
/// Tracked threads announce their newest post, tracked sub-forums announce
/// new topics. Replies can be posted through the site's own reply form.
#[derive(Parser, Debug)]
#[command(name = "forum-tracker")]
#[command(version = "1.0.0")]
#[command(about = "Watches forum threads and sub-forums for new content", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on the configured interval until Ctrl-C
    Run,

    /// Run a single poll cycle and exit
    CheckOnce,

    /// Start tracking a thread or sub-forum
    Track {
        #[arg(long)]
        subscriber: i64,
        url: String,
    },

    /// Stop tracking a thread or sub-forum
    Untrack {
        #[arg(long)]
        subscriber: i64,
        url: String,
    },

    /// List a subscriber's tracked resources
    List {
        #[arg(long)]
        subscriber: i64,
    },

    /// Print the posts currently on a thread page
    Posts { url: String },

    /// Print the topics currently listed in a sub-forum
    Topics { url: String },

    /// Post a reply into a thread
    Reply {
        #[arg(long)]
        subscriber: i64,
        url: String,
        text: String,
    },

    /// Show the reply form a post would use, without posting
    ReplyForm { url: String },

    /// Check whether each credential set is still logged in
    CheckCredentials,

    /// Validate the config and print it without touching the network
    DryRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Command::DryRun = cli.command {
        handle_dry_run(&config);
        return Ok(());
    }

    let tracker = Tracker::new(config, Arc::new(StdoutNotifier))?;

    match cli.command {
        Command::Run => handle_run(&tracker).await?,
        Command::CheckOnce => {
            let report = tracker.check_now().await?;
            println!(
                "Checked {} of {} resources: {} notified, {} baselined, {} empty, {} failed",
                report.checked,
                report.resources,
                report.notified,
                report.baselined,
                report.empty,
                report.failed
            );
        }
        Command::Track { subscriber, url } => {
            let outcome = tracker.track(SubscriberId(subscriber), &url)?;
            if outcome.created {
                println!("Tracking {}", outcome.resource);
            } else {
                println!("Already tracking {}", outcome.resource);
            }
        }
        Command::Untrack { subscriber, url } => {
            if tracker.untrack(SubscriberId(subscriber), &url)? {
                println!("Stopped tracking {}", url);
            } else {
                println!("Not tracking {}", url);
            }
        }
        Command::List { subscriber } => {
            let subscriptions = tracker.list_tracked(SubscriberId(subscriber))?;
            if subscriptions.is_empty() {
                println!("Nothing tracked");
            }
            for sub in subscriptions {
                println!(
                    "{}\t{}\t{}",
                    sub.resource.kind(),
                    sub.resource.url(),
                    sub.cursor.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Posts { url } => {
            for post in tracker.manual_fetch_posts(&url).await? {
                println!(
                    "#{} {} | {}\n{}\n{}\n",
                    post.id, post.timestamp, post.author, post.body, post.permalink
                );
            }
        }
        Command::Topics { url } => {
            for topic in tracker.manual_fetch_topics(&url).await? {
                println!(
                    "#{} {} (by {})\n{}\n",
                    topic.id, topic.title, topic.author, topic.url
                );
            }
        }
        Command::Reply {
            subscriber,
            url,
            text,
        } => {
            let outcome = tracker.post_reply(SubscriberId(subscriber), &url, &text).await;
            match outcome.error {
                None => println!("✓ Reply posted"),
                Some(error) => anyhow::bail!("reply failed: {}", error),
            }
        }
        Command::ReplyForm { url } => {
            let form = tracker.inspect_reply_form(&url).await?;
            println!("Action: {}", form.action);
            println!(
                "Token: {}",
                if form.csrf_token().is_some() { "present" } else { "missing" }
            );
            println!("Fields:");
            for (name, value) in form.redacted_fields() {
                println!("  {} = {}", name, value);
            }
            println!("Message field candidates: {}", form.body_fields.join(", "));
        }
        Command::CheckCredentials => {
            for status in tracker.check_credentials().await {
                let code = status
                    .status
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let state = if status.logged_in { "logged in" } else { "NOT logged in" };
                match status.error {
                    Some(error) => println!("{}: {} ({})", status.label, state, error),
                    None => println!("{}: HTTP {}, {}", status.label, code, state),
                }
            }
        }
        Command::DryRun => {}
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_tracker=info,warn"),
            1 => EnvFilter::new("forum_tracker=debug,info"),
            2 => EnvFilter::new("forum_tracker=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the dry-run command: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Forum-Tracker Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  User agent: {}", config.site.user_agent);

    println!("\nPolling:");
    println!("  Interval: {}s", config.tracker.poll_interval_secs);
    println!("  Concurrent checks: {}", config.tracker.max_concurrent_checks);
    println!("  Forum topic window: {}", config.tracker.forum_topic_window);
    if config.tracker.keepalive_enabled {
        println!("  Keep-alive: every {}s", config.tracker.keepalive_interval_secs);
    } else {
        println!("  Keep-alive: disabled");
    }

    println!("\nHTTP:");
    println!("  Attempt timeout: {}s", config.http.attempt_timeout_secs);
    println!("  Fetch ceiling: {}s", config.http.fetch_ceiling_secs);

    println!("\nReplies:");
    println!(
        "  Verification: {} checks, {}ms apart",
        config.reply.verify_attempts, config.reply.verify_delay_ms
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nCredential sets ({}):", config.credentials.len());
    for entry in &config.credentials {
        let names: Vec<&str> = entry.tokens.keys().map(String::as_str).collect();
        println!("  - {} [{}]", entry.label, names.join(", "));
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the run command: polls until Ctrl-C
async fn handle_run(tracker: &Tracker) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Interrupt received, shutting down");
        on_signal.cancel();
    });

    tracker.run(cancel).await?;
    tracing::info!("Tracker stopped");
    Ok(())
}
