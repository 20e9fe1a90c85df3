//! VibeLink - External messaging bridge runner
//!
//! Runs the configured bridges against the in-memory external systems and
//! logs every message they hand to the broker.
//!
//! Usage:
//!   vibelink [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>    Configuration file path
//!   -l, --log-level        Log level (error, warn, info, debug, trace)
//!   --check                Validate the configuration, print the link plan and exit
//!   -h, --help             Print help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vibelink::adapters::TOPIC_ARN_OPTION;
use vibelink::bridge::{BridgeContext, BridgeFactory, BridgeManager, ChannelSink};
use vibelink::config::{BridgeKind, Config, LinkDirection};
use vibelink::external::memory::{MemoryNotificationService, MemoryPubSub, MemoryQueueManager};
use vibelink::ingest::TokioScheduler;
use vibelink::{Metrics, MetricsServer};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    fn from_config(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }
}

/// VibeLink - External messaging bridges
#[derive(Parser, Debug)]
#[command(name = "vibelink")]
#[command(version = "0.1.0")]
#[command(about = "Bridges broker destinations to notification, queue manager and pub/sub systems")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Validate the configuration, print the bridge plan and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // CLI overrides config, config overrides default (warn)
    let log_level = args
        .log_level
        .unwrap_or_else(|| LogLevel::from_config(&config.log.level));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if args.check {
        print_plan(&config);
        return Ok(());
    }

    info!("Starting VibeLink");
    info!(
        "  Bridges: {} configured ({} enabled)",
        config.bridge.len(),
        config.enabled_bridges().count()
    );

    let (notification, queue_manager, pubsub) = sandbox_systems(&config);
    let factory = BridgeFactory::in_memory(notification, queue_manager, pubsub);

    let (sink, mut deliveries) = ChannelSink::new();
    tokio::spawn(async move {
        while let Some((destination, message)) = deliveries.recv().await {
            info!(
                "Inbound '{}': {} bytes, {} properties",
                destination,
                message.payload().len(),
                message.properties().len()
            );
        }
    });

    let metrics = Arc::new(Metrics::new());
    let ctx = BridgeContext::new(Arc::new(sink), Arc::new(TokioScheduler::new()))
        .with_metrics(metrics.clone());

    let manager = Arc::new(BridgeManager::from_configs(&config.bridge, &factory, &ctx));
    manager.start_all().await;
    info!(
        "  Active: {} of {} bridges",
        manager.active_count(),
        manager.bridge_count()
    );

    if config.metrics.enabled {
        info!("  Metrics: enabled (http://{})", config.metrics.bind);
        let server =
            MetricsServer::new(metrics, config.metrics.bind).with_readiness(manager.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        });
    } else {
        info!("  Metrics: disabled");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    manager.stop_all().await;

    Ok(())
}

/// Print every bridge with its links
fn print_plan(config: &Config) {
    for bridge in &config.bridge {
        let status = if bridge.enabled { "enabled" } else { "disabled" };
        println!("{} ({}) -> {} [{}]", bridge.name, bridge.kind, bridge.url, status);
        for link in &bridge.links {
            let arrow = match link.direction {
                LinkDirection::Out => "->",
                LinkDirection::In => "<-",
            };
            match &link.filter {
                Some(filter) => println!(
                    "  {} {} {} (filter: {})",
                    link.local,
                    arrow,
                    link.remote_name(),
                    filter
                ),
                None => println!("  {} {} {}", link.local, arrow, link.remote_name()),
            }
        }
    }
}

/// In-memory systems with every configured queue and topic defined
fn sandbox_systems(config: &Config) -> (MemoryNotificationService, MemoryQueueManager, MemoryPubSub) {
    let notification = MemoryNotificationService::new();
    let queue_manager = MemoryQueueManager::new();
    let pubsub = MemoryPubSub::new();

    for bridge in config.enabled_bridges() {
        let remotes = bridge.links.iter().map(|l| l.remote_name().to_string());
        match bridge.kind {
            BridgeKind::Notification => {
                if let Some(topic) = bridge.option(TOPIC_ARN_OPTION) {
                    notification.create_topic(&topic);
                }
                remotes.for_each(|r| notification.create_topic(&r));
            }
            BridgeKind::QueueManager => remotes.for_each(|r| queue_manager.define_queue(&r)),
            // Topics are created on first use
            BridgeKind::PubSub => {}
        }
    }

    (notification, queue_manager, pubsub)
}
