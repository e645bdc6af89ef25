//! Copy-trading ingestion service - Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use copytrade_core::Influencer;
use copytrade_ingestion::{AppConfig, Application};
use copytrade_registry::{InfluencerSource, RedisInfluencerRegistry};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Streams influencer fills from Hyperliquid and publishes normalized signals to Kafka.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion service (default).
    Run,
    /// Add an influencer to the registry set.
    AddInfluencer {
        #[arg(long)]
        id: String,
        #[arg(long)]
        address: String,
        /// Market to track; repeat for several. None means all markets.
        #[arg(long = "market")]
        markets: Vec<String>,
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// Print the registry set, one JSON object per line.
    ListInfluencers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    copytrade_telemetry::init_logging()?;

    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::AddInfluencer {
            id,
            address,
            markets,
            priority,
        } => {
            let influencer = Influencer::new(id, address)
                .with_markets(markets)
                .with_priority(priority);
            add_influencer(config, influencer).await
        }
        Command::ListInfluencers => list_influencers(config).await,
    }
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting copytrade-ingestion v{}", env!("CARGO_PKG_VERSION"));
    let app = Application::new(config)?;
    info!(
        redis_addr = %app.config().redis_addr,
        kafka_brokers = %app.config().kafka_brokers,
        topic = %app.config().kafka_topic_influencer_signals,
        ws_url = %app.config().hyperliquid_ws_url,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        signal_cancel.cancel();
    });

    match app.run(cancel).await {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Ingestion failed");
            Err(e.into())
        }
        Err(e) => {
            warn!(error = %e, "Ingestion stopped with a non-fatal error");
            Ok(())
        }
    }
}

async fn add_influencer(config: AppConfig, influencer: Influencer) -> Result<()> {
    let registry = RedisInfluencerRegistry::connect(&config.registry_config()).await?;
    let result = registry.add(&influencer).await;
    registry.close();

    if result? {
        println!("added influencer {}", influencer.normalized().id);
    } else {
        println!("influencer already present");
    }
    Ok(())
}

async fn list_influencers(config: AppConfig) -> Result<()> {
    let registry = RedisInfluencerRegistry::connect(&config.registry_config()).await?;
    let result = registry.list_influencers().await;
    registry.close();

    for influencer in result? {
        println!("{}", serde_json::to_string(&influencer)?);
    }
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                    _ = sigterm.recv() => info!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("SIGINT received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received");
    }
}
