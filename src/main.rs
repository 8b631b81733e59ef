//! Bet Channel Watcher
//!
//! Long-running listener: connects to the Discord gateway and hands every
//! event to the bet watcher.

use betwatch_bot::{
    config::Config,
    discord::{DiscordClient, Gateway},
    handler::{BetWatcher, ChannelRoutes},
    notify::ChatApi,
    report::{ReportDispatcher, ReportSink, RetryPolicy, SheetsSink},
    types::ChatEvent,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "betwatch-bot")]
#[command(about = "Watches a Discord betting channel for group votes, results and cash-outs")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting bet channel watcher");

    let discord = Arc::new(DiscordClient::new(&config.discord)?);
    let routes = ChannelRoutes::resolve(discord.as_ref(), &config.discord).await?;
    tracing::info!(
        source = %routes.source.name,
        target = %routes.target.name,
        "Channels resolved"
    );

    let reports = build_reports(&config).await?;
    let api: Arc<dyn ChatApi> = discord;
    let watcher = Arc::new(BetWatcher::new(&config, api, reports, routes));

    let (event_tx, mut event_rx) = mpsc::channel::<ChatEvent>(256);
    let gateway = Gateway::new(config.discord.gateway_url.clone(), config.discord.token.clone());
    let mut gateway_task = gateway.spawn(event_tx);

    let mut eviction = tokio::time::interval(Duration::from_secs(3600));
    eviction.tick().await;

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                let watcher = watcher.clone();
                tokio::spawn(async move {
                    watcher.dispatch(event).await;
                });
            }
            _ = eviction.tick() => {
                watcher.evict();
            }
            result = &mut gateway_task => {
                match result {
                    Ok(Ok(())) => tracing::info!("Gateway stopped"),
                    Ok(Err(e)) => tracing::error!(error = %e, "Gateway failed"),
                    Err(e) => tracing::error!(error = %e, "Gateway task panicked"),
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn build_reports(config: &Config) -> anyhow::Result<ReportDispatcher> {
    let reporting = &config.reporting;
    if !reporting.enabled {
        tracing::warn!("Reporting not configured, spreadsheet rows disabled");
        return Ok(ReportDispatcher::disabled());
    }

    let sheets = SheetsSink::new(reporting)?;
    if let Err(e) = sheets.ensure_header().await {
        tracing::warn!(error = %e, "Could not verify report header row");
    }

    let sink: Arc<dyn ReportSink> = Arc::new(sheets);
    Ok(ReportDispatcher::new(
        sink,
        reporting.cutoff,
        RetryPolicy::from_config(reporting),
    ))
}
