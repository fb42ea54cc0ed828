//! farewatch-bot: conversational flight price alerts.
//!
//! Provides:
//! - The alert setup conversation (departure, arrival, outbound and return dates)
//! - A per-chat dispatcher that serializes each chat's messages
//! - The recurring daily price update job
//! - Channel plugin framework for chat platform integrations

pub mod alerts;
pub mod channel;
pub mod conversation;
pub mod dispatcher;
pub mod prompts;
pub mod session;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use farewatch_config::FarewatchConfig;
use farewatch_cron::NotificationScheduler;
use farewatch_pricing::PricingClient;

pub use channel::{ChannelPlugin, Reply};
pub use conversation::{ConversationEngine, EngineOptions};
pub use dispatcher::Dispatcher;
pub use session::{Session, Step};

/// Buffer between a channel's listener and the dispatcher.
const INBOUND_BUFFER: usize = 256;

/// Run the bot on `channel` until `shutdown` resolves.
///
/// Starts the scheduler and the channel, pumps inbound messages into the
/// dispatcher, and on shutdown stops the channel and cancels every alert.
pub async fn run_bot<F>(
    config: &FarewatchConfig,
    channel: Arc<dyn ChannelPlugin>,
    pricing: Arc<dyn PricingClient>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let options =
        EngineOptions::from_config(&config.alerts).context("invalid alerts.stop_phrase pattern")?;

    let scheduler = Arc::new(NotificationScheduler::new());
    scheduler.start().await;

    let engine = Arc::new(ConversationEngine::new(
        config.city_table(),
        pricing,
        scheduler.clone(),
        channel.clone(),
        options,
    ));
    let dispatcher = Arc::new(Dispatcher::new(engine, channel.clone()));

    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    channel
        .start(tx)
        .await
        .with_context(|| format!("failed to start {} channel", channel.channel_type()))?;

    let cancel = CancellationToken::new();
    let message_loop = tokio::spawn(dispatcher.run(rx, cancel.clone()));

    info!(
        channel = %channel.channel_type(),
        cities = config.cities.len(),
        interval_secs = config.alerts.interval_secs,
        "Bot running"
    );

    shutdown.await;
    info!("Shutting down");

    cancel.cancel();
    if let Err(e) = channel.stop().await {
        warn!("Failed to stop channel: {e}");
    }
    scheduler.shutdown().await;
    if let Err(e) = message_loop.await {
        warn!("Message loop panicked: {e}");
    }

    Ok(())
}

/// Run the bot until Ctrl-C.
pub async fn start_bot(
    config: &FarewatchConfig,
    channel: Arc<dyn ChannelPlugin>,
    pricing: Arc<dyn PricingClient>,
) -> anyhow::Result<()> {
    run_bot(config, channel, pricing, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
        }
    })
    .await
}
