//! Recurring price alert job body.

use std::sync::Arc;

use tracing::{info, warn};

use farewatch_cron::{JobAction, JobOutcome};
use farewatch_pricing::{PricingClient, format_price_insights};
use farewatch_types::{City, FareQuery, PriceLookup, format_date};

use crate::channel::{ChannelPlugin, Reply, send_reply};
use crate::prompts;

/// Re-runs one fixed itinerary lookup and pushes the result to a chat.
///
/// The query is a snapshot taken when the alert was installed and never
/// changes afterwards.
pub struct DailyUpdate {
    pub chat_id: i64,
    pub query: FareQuery,
    pub pricing: Arc<dyn PricingClient>,
    pub channel: Arc<dyn ChannelPlugin>,
}

impl DailyUpdate {
    /// One execution. An empty lookup tells the chat and asks the scheduler
    /// to drop the job; a failed lookup is logged and retried next interval.
    pub async fn run(&self) -> JobOutcome {
        match self.pricing.price_insights(&self.query).await {
            Ok(PriceLookup::Complete(insight)) => {
                let text = format_price_insights(&insight, self.pricing.currency());
                self.deliver(Reply::markdown(text)).await;
                info!(chat_id = self.chat_id, lowest_price = insight.lowest_price, "Daily update sent");
                JobOutcome::Continue
            }
            Ok(PriceLookup::Empty) => {
                self.deliver(Reply::plain(prompts::DAILY_NO_FLIGHTS)).await;
                info!(chat_id = self.chat_id, "Route has no flights any more, cancelling alert");
                JobOutcome::Stop
            }
            Err(e) => {
                warn!(chat_id = self.chat_id, "Daily price lookup failed: {e}");
                JobOutcome::Continue
            }
        }
    }

    async fn deliver(&self, reply: Reply) {
        if let Err(e) = send_reply(self.channel.as_ref(), self.chat_id, reply).await {
            warn!(chat_id = self.chat_id, "Failed to send daily update: {e}");
        }
    }

    /// Wrap into a scheduler action.
    pub fn into_action(self) -> JobAction {
        let this = Arc::new(self);
        Arc::new(move || {
            let this = this.clone();
            Box::pin(async move { this.run().await })
        })
    }
}

/// Short description of an alert, e.g. `Manchester → Sevilla, 2025-06-01 to 2025-06-08`.
pub fn alert_description(departure: &City, arrival: &City, query: &FareQuery) -> String {
    format!(
        "{} → {}, {} to {}",
        departure.name,
        arrival.name,
        format_date(query.outbound),
        format_date(query.return_date)
    )
}
