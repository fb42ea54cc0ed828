//! End-to-end run of the bot against an in-memory channel and pricing backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use farewatch_bot::{ChannelPlugin, run_bot};
use farewatch_config::FarewatchConfig;
use farewatch_pricing::{PricingClient, PricingError};
use farewatch_types::{
    ChannelStatus, FareQuery, InboundMessage, OutboundMessage, PriceInsight, PriceLookup, PricePoint,
};

#[derive(Default)]
struct MemoryChannel {
    inbound: Mutex<Option<mpsc::Sender<InboundMessage>>>,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MemoryChannel {
    fn sender(&self) -> Option<mpsc::Sender<InboundMessage>> {
        self.inbound.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    async fn wait_for(&self, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let texts = self.texts();
                if texts.len() >= count {
                    return texts;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for replies")
    }
}

#[async_trait]
impl ChannelPlugin for MemoryChannel {
    fn channel_type(&self) -> &str {
        "memory"
    }

    fn channel_id(&self) -> &str {
        "memory-1"
    }

    async fn start(&self, sender: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        *self.inbound.lock().unwrap() = Some(sender);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.inbound.lock().unwrap().take();
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        if self.inbound.lock().unwrap().is_some() {
            ChannelStatus::Running
        } else {
            ChannelStatus::Stopped
        }
    }
}

#[derive(Default)]
struct FixedPricing {
    calls: Mutex<Vec<FareQuery>>,
}

#[async_trait]
impl PricingClient for FixedPricing {
    fn currency(&self) -> &str {
        "GBP"
    }

    async fn price_insights(&self, query: &FareQuery) -> Result<PriceLookup, PricingError> {
        self.calls.lock().unwrap().push(query.clone());
        Ok(PriceLookup::Complete(PriceInsight {
            lowest_price: 180,
            price_level: "low".into(),
            typical_range: (190, 260),
            price_history: vec![PricePoint {
                timestamp: 1748736000,
                price: 185,
            }],
        }))
    }
}

#[tokio::test]
async fn test_setup_schedules_alert_and_stop_cancels_it() {
    let channel = Arc::new(MemoryChannel::default());
    let pricing = Arc::new(FixedPricing::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let config = FarewatchConfig::default();
    let bot = {
        let channel = channel.clone();
        let pricing = pricing.clone();
        tokio::spawn(async move {
            run_bot(&config, channel, pricing, async {
                let _ = shutdown_rx.await;
            })
            .await
        })
    };

    // Wait for the channel to be started.
    let tx = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(tx) = channel.sender() {
                return tx;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    tx.send(InboundMessage::command(42, "start")).await.unwrap();
    for answer in ["manchester", "Sevilla", "2025-06-01", "2025-06-08"] {
        tx.send(InboundMessage::text(42, answer)).await.unwrap();
    }

    let texts = channel.wait_for(6).await;
    assert_eq!(texts[0], "🛫 Enter departure city (e.g., Manchester):");
    assert_eq!(texts[1], "🏙️ Enter arrival city (e.g., Sevilla):");
    assert!(texts[4].contains("Lowest Price: £180"));
    assert!(texts[4].contains("- 2025-06-01: £185"));
    assert!(texts[5].starts_with("✅ Daily updates scheduled!"));

    let calls = pricing.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].departure, "MAN");
    assert_eq!(calls[0].arrival, "SVQ");

    tx.send(InboundMessage::command(42, "status")).await.unwrap();
    let texts = channel.wait_for(7).await;
    assert!(texts[6].contains("Manchester → Sevilla, 2025-06-01 to 2025-06-08"));

    tx.send(InboundMessage::command(42, "stop")).await.unwrap();
    let texts = channel.wait_for(9).await;
    assert!(texts[7].starts_with("🛑 Notifications cancelled."));
    assert!(texts[8].starts_with("🛫 Enter departure city"));

    tx.send(InboundMessage::command(42, "status")).await.unwrap();
    let texts = channel.wait_for(10).await;
    assert!(texts[9].starts_with("No active notifications"));

    shutdown_tx.send(()).unwrap();
    bot.await.unwrap().unwrap();
    assert_eq!(channel.status(), ChannelStatus::Stopped);
}
