//! The four-step alert setup conversation.
//!
//! ```text
//! /start → DEPARTURE → ARRIVAL → OUTBOUND_DATE → RETURN_DATE → (alert scheduled, idle)
//!              ↑                        ↑              │
//!              └──── no data (restart) ─┼──────────────┤
//!                                       └─ no data (alternatives)
//! ```
//!
//! Invalid input re-prompts and stays on the same step. `/stop` (or the
//! configured stop phrase) works from any step, including idle.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use farewatch_config::AlertConfig;
use farewatch_cron::NotificationScheduler;
use farewatch_pricing::{PricingClient, ScanOptions, find_alternatives, format_price_insights};
use farewatch_types::{CityTable, FareQuery, InboundMessage, NoDataStrategy, PriceLookup, format_date, parse_date};

use crate::alerts::{DailyUpdate, alert_description};
use crate::channel::{ChannelPlugin, Reply};
use crate::prompts;
use crate::session::{Session, Step};

static DEFAULT_STOP_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&AlertConfig::default().stop_phrase).expect("default stop phrase is a valid regex")
});

/// Behaviour switches for the conversation.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub no_data: NoDataStrategy,
    /// Re-enter the departure prompt after a stop.
    pub restart_on_stop: bool,
    /// Time between alert updates.
    pub interval: Duration,
    pub scan: ScanOptions,
    /// Free text treated like `/stop`.
    pub stop_phrase: Regex,
}

impl EngineOptions {
    pub fn from_config(alerts: &AlertConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            no_data: alerts.no_data,
            restart_on_stop: alerts.restart_on_stop,
            interval: Duration::from_secs(alerts.interval_secs),
            scan: ScanOptions {
                window_days: alerts.alternatives.window_days,
                trip_days: alerts.alternatives.trip_days,
            },
            stop_phrase: Regex::new(&alerts.stop_phrase)?,
        })
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        let alerts = AlertConfig::default();
        Self {
            no_data: alerts.no_data,
            restart_on_stop: alerts.restart_on_stop,
            interval: Duration::from_secs(alerts.interval_secs),
            scan: ScanOptions::default(),
            stop_phrase: DEFAULT_STOP_PHRASE.clone(),
        }
    }
}

enum Trigger<'a> {
    Start,
    Stop,
    Status,
    Text(&'a str),
}

/// Drives a chat's [`Session`] through the setup steps and owns the hand-off
/// to the scheduler.
pub struct ConversationEngine {
    cities: CityTable,
    pricing: Arc<dyn PricingClient>,
    scheduler: Arc<NotificationScheduler>,
    channel: Arc<dyn ChannelPlugin>,
    options: EngineOptions,
}

impl ConversationEngine {
    pub fn new(
        cities: CityTable,
        pricing: Arc<dyn PricingClient>,
        scheduler: Arc<NotificationScheduler>,
        channel: Arc<dyn ChannelPlugin>,
        options: EngineOptions,
    ) -> Self {
        Self {
            cities,
            pricing,
            scheduler,
            channel,
            options,
        }
    }

    /// Handle one inbound message for `session`, returning the replies to send.
    pub async fn handle(&self, session: &mut Session, msg: &InboundMessage) -> Vec<Reply> {
        match self.classify(msg) {
            Trigger::Start => self.start(session),
            Trigger::Stop => self.stop(session).await,
            Trigger::Status => self.status(session).await,
            Trigger::Text(text) => match session.step {
                None => {
                    debug!(chat_id = session.chat_id, "Ignoring message outside a conversation");
                    Vec::new()
                }
                Some(Step::Departure) => self.on_departure(session, text),
                Some(Step::Arrival) => self.on_arrival(session, text),
                Some(Step::OutboundDate) => self.on_outbound_date(session, text),
                Some(Step::ReturnDate) => self.on_return_date(session, text).await,
            },
        }
    }

    fn classify<'a>(&self, msg: &'a InboundMessage) -> Trigger<'a> {
        match msg.command.as_deref() {
            Some("start") => return Trigger::Start,
            Some("stop") => return Trigger::Stop,
            Some("status") => return Trigger::Status,
            _ => {}
        }
        if self.options.stop_phrase.is_match(msg.text.trim()) {
            return Trigger::Stop;
        }
        Trigger::Text(&msg.text)
    }

    fn departure_prompt(&self) -> String {
        prompts::departure_prompt(self.cities.example(0).unwrap_or("Manchester"))
    }

    fn start(&self, session: &mut Session) -> Vec<Reply> {
        session.restart();
        info!(chat_id = session.chat_id, "Conversation started");
        vec![Reply::plain(self.departure_prompt())]
    }

    fn on_departure(&self, session: &mut Session, text: &str) -> Vec<Reply> {
        let Some(city) = self.cities.lookup(text) else {
            return vec![Reply::plain(prompts::invalid_city("departure", &self.cities.names()))];
        };
        debug!(chat_id = session.chat_id, city = %city.name, "Departure city set");
        session.departure = Some(city.clone());
        session.step = Some(Step::Arrival);
        vec![Reply::plain(prompts::arrival_prompt(
            self.cities.example(1).unwrap_or("Sevilla"),
        ))]
    }

    fn on_arrival(&self, session: &mut Session, text: &str) -> Vec<Reply> {
        let Some(city) = self.cities.lookup(text) else {
            return vec![Reply::plain(prompts::invalid_city("arrival", &self.cities.names()))];
        };
        debug!(chat_id = session.chat_id, city = %city.name, "Arrival city set");
        session.arrival = Some(city.clone());
        session.step = Some(Step::OutboundDate);
        vec![Reply::plain(prompts::OUTBOUND_PROMPT)]
    }

    fn on_outbound_date(&self, session: &mut Session, text: &str) -> Vec<Reply> {
        let Some(date) = parse_date(text) else {
            return vec![Reply::plain(prompts::INVALID_DATE)];
        };
        session.outbound = Some(date);
        session.step = Some(Step::ReturnDate);
        vec![Reply::plain(prompts::RETURN_PROMPT)]
    }

    async fn on_return_date(&self, session: &mut Session, text: &str) -> Vec<Reply> {
        let Some(date) = parse_date(text) else {
            return vec![Reply::plain(prompts::INVALID_DATE)];
        };
        session.return_date = Some(date);

        let Some(query) = session.fare_query() else {
            warn!(chat_id = session.chat_id, "Incomplete session at return date, restarting");
            return self.start(session);
        };

        info!(
            chat_id = session.chat_id,
            departure = %query.departure,
            arrival = %query.arrival,
            outbound = %query.outbound,
            return_date = %query.return_date,
            "Looking up prices"
        );

        match self.pricing.price_insights(&query).await {
            Ok(PriceLookup::Complete(insight)) => {
                let text = format_price_insights(&insight, self.pricing.currency());
                self.install_alert(session, query).await;
                session.end();
                vec![
                    Reply::markdown(text),
                    Reply::plain(prompts::scheduled(self.options.restart_on_stop)),
                ]
            }
            Ok(PriceLookup::Empty) => self.on_no_data(session, &query).await,
            Err(e) => {
                warn!(chat_id = session.chat_id, "Price lookup failed: {e}");
                vec![Reply::plain(prompts::LOOKUP_FAILED)]
            }
        }
    }

    async fn on_no_data(&self, session: &mut Session, query: &FareQuery) -> Vec<Reply> {
        match self.options.no_data {
            NoDataStrategy::Restart => {
                info!(chat_id = session.chat_id, "No flights, restarting conversation");
                session.step = Some(Step::Departure);
                vec![Reply::plain(prompts::no_flights_restart(&self.departure_prompt()))]
            }
            NoDataStrategy::SuggestAlternatives => {
                let alternatives =
                    find_alternatives(self.pricing.as_ref(), query, self.options.scan).await;
                info!(
                    chat_id = session.chat_id,
                    found = alternatives.len(),
                    "No flights, scanned nearby dates"
                );
                session.step = Some(Step::OutboundDate);

                if alternatives.is_empty() {
                    return vec![Reply::plain(prompts::no_alternatives(self.options.scan.window_days))];
                }
                let currency = self.pricing.currency();
                let lines: Vec<String> = alternatives.iter().map(|a| a.summary_line(currency)).collect();
                vec![Reply::markdown(prompts::alternatives_found(
                    &format_date(query.outbound),
                    &format_date(query.return_date),
                    &lines,
                ))]
            }
        }
    }

    async fn install_alert(&self, session: &Session, query: FareQuery) {
        let description = match (&session.departure, &session.arrival) {
            (Some(from), Some(to)) => alert_description(from, to, &query),
            _ => format!("{} → {}", query.departure, query.arrival),
        };
        let action = DailyUpdate {
            chat_id: session.chat_id,
            query,
            pricing: self.pricing.clone(),
            channel: self.channel.clone(),
        }
        .into_action();

        self.scheduler
            .schedule(&session.key(), description, self.options.interval, action)
            .await;
    }

    async fn stop(&self, session: &mut Session) -> Vec<Reply> {
        let existed = self.scheduler.cancel(&session.key()).await;
        info!(chat_id = session.chat_id, existed, "Stop requested");

        let mut replies = vec![Reply::plain(prompts::stopped(existed, self.options.restart_on_stop))];
        if self.options.restart_on_stop {
            replies.extend(self.start(session));
        } else {
            session.end();
        }
        replies
    }

    async fn status(&self, session: &Session) -> Vec<Reply> {
        match self.scheduler.get(&session.key()).await {
            Some(job) => {
                let last_run = job.last_run.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string());
                vec![Reply::plain(prompts::alert_status(&job.description, last_run.as_deref()))]
            }
            None => vec![Reply::plain(prompts::NO_ALERT_STATUS)],
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use farewatch_pricing::PricingError;
    use farewatch_types::{PriceInsight, PricePoint};

    use crate::channel::tests::MockChannel;

    type Responder = Box<dyn Fn(&FareQuery) -> Result<PriceLookup, PricingError> + Send + Sync>;

    /// Pricing double answering from a closure and recording every query.
    pub(crate) struct StubPricing {
        responder: Responder,
        calls: Mutex<Vec<FareQuery>>,
    }

    impl StubPricing {
        pub(crate) fn with<F>(f: F) -> Self
        where
            F: Fn(&FareQuery) -> Result<PriceLookup, PricingError> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(f),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn always(lookup: PriceLookup) -> Self {
            Self::with(move |_| Ok(lookup.clone()))
        }

        pub(crate) fn failing() -> Self {
            Self::with(|_| Err(PricingError::Malformed("stub failure".into())))
        }

        pub(crate) fn calls(&self) -> Vec<FareQuery> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PricingClient for StubPricing {
        fn currency(&self) -> &str {
            "GBP"
        }

        async fn price_insights(&self, query: &FareQuery) -> Result<PriceLookup, PricingError> {
            self.calls.lock().unwrap().push(query.clone());
            (self.responder)(query)
        }
    }

    pub(crate) fn sample_insight() -> PriceInsight {
        PriceInsight {
            lowest_price: 250,
            price_level: "typical".into(),
            typical_range: (200, 300),
            price_history: vec![
                PricePoint {
                    timestamp: 1748736000,
                    price: 220,
                },
                PricePoint {
                    timestamp: 1748822400,
                    price: 250,
                },
            ],
        }
    }

    struct Harness {
        engine: ConversationEngine,
        pricing: Arc<StubPricing>,
        scheduler: Arc<NotificationScheduler>,
        session: Session,
    }

    impl Harness {
        fn new(pricing: StubPricing, options: EngineOptions) -> Self {
            let pricing = Arc::new(pricing);
            let scheduler = Arc::new(NotificationScheduler::new());
            let engine = ConversationEngine::new(
                CityTable::default(),
                pricing.clone(),
                scheduler.clone(),
                Arc::new(MockChannel::new("mock")),
                options,
            );
            Self {
                engine,
                pricing,
                scheduler,
                session: Session::new(42),
            }
        }

        async fn say(&mut self, text: &str) -> Vec<String> {
            let msg = InboundMessage::text(42, text);
            self.run(msg).await
        }

        async fn command(&mut self, name: &str) -> Vec<String> {
            self.run(InboundMessage::command(42, name)).await
        }

        async fn run(&mut self, msg: InboundMessage) -> Vec<String> {
            self.engine
                .handle(&mut self.session, &msg)
                .await
                .into_iter()
                .map(|r| r.text)
                .collect()
        }

        async fn fill_until_return(&mut self) {
            self.command("start").await;
            self.say("Manchester").await;
            self.say("Sevilla").await;
            self.say("2025-06-01").await;
        }
    }

    fn complete() -> StubPricing {
        StubPricing::always(PriceLookup::Complete(sample_insight()))
    }

    #[tokio::test]
    async fn test_start_prompts_departure() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        let replies = h.command("start").await;
        assert_eq!(replies, vec!["🛫 Enter departure city (e.g., Manchester):"]);
        assert_eq!(h.session.step, Some(Step::Departure));
    }

    #[tokio::test]
    async fn test_unknown_city_reprompts_same_step() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        h.command("start").await;

        let first = h.say("Paris").await;
        let second = h.say("Atlantis").await;
        assert_eq!(first, second);
        assert!(first[0].contains("Invalid departure city"));
        assert!(first[0].contains("Manchester, Sevilla, Gdansk, Malaga, Faro, London"));
        assert_eq!(h.session.step, Some(Step::Departure));

        h.say(" manchester ").await;
        assert_eq!(h.session.step, Some(Step::Arrival));
        let replies = h.say("Tokyo").await;
        assert!(replies[0].contains("Invalid arrival city"));
        assert_eq!(h.session.step, Some(Step::Arrival));
    }

    #[tokio::test]
    async fn test_bad_dates_keep_step() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        h.command("start").await;
        h.say("Manchester").await;
        h.say("Sevilla").await;

        for bad in ["01-06-2025", "2025/06/01", "2025-13-01", "soon"] {
            assert_eq!(h.say(bad).await, vec![prompts::INVALID_DATE]);
            assert_eq!(h.session.step, Some(Step::OutboundDate));
        }
        h.say("2025-06-01").await;
        assert_eq!(h.session.step, Some(Step::ReturnDate));

        assert_eq!(h.say("next week").await, vec![prompts::INVALID_DATE]);
        assert_eq!(h.session.step, Some(Step::ReturnDate));
        assert!(h.pricing.calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_lookup_schedules_alert() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        h.fill_until_return().await;
        let replies = h.say("2025-06-08").await;

        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("Lowest Price: £250"));
        assert!(replies[1].starts_with("✅ Daily updates scheduled!"));
        assert_eq!(h.session.step, None);

        let job = h.scheduler.get("42").await.unwrap();
        assert_eq!(job.description, "Manchester → Sevilla, 2025-06-01 to 2025-06-08");
        assert_eq!(job.interval_secs, 86_400);
        assert_eq!(h.pricing.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_return_before_outbound_is_accepted() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        h.fill_until_return().await;
        h.say("2025-05-01").await;
        assert_eq!(h.scheduler.len().await, 1);
    }

    #[tokio::test]
    async fn test_second_setup_replaces_alert() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        h.fill_until_return().await;
        h.say("2025-06-08").await;
        let first = h.scheduler.get("42").await.unwrap();

        h.fill_until_return().await;
        h.say("2025-06-09").await;
        assert_eq!(h.scheduler.len().await, 1);
        assert_ne!(h.scheduler.get("42").await.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_no_data_scans_alternatives() {
        let pricing = StubPricing::with(|q| {
            if q.outbound == "2025-06-03".parse().unwrap() {
                Ok(PriceLookup::Complete(sample_insight()))
            } else {
                Ok(PriceLookup::Empty)
            }
        });
        let mut h = Harness::new(pricing, EngineOptions::default());
        h.fill_until_return().await;
        let replies = h.say("2025-06-08").await;

        // One primary lookup, then the fifteen offsets.
        let calls = h.pricing.calls();
        assert_eq!(calls.len(), 16);
        assert_eq!(calls[1].outbound, "2025-05-25".parse().unwrap());
        assert_eq!(calls[15].outbound, "2025-06-08".parse().unwrap());

        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("No flights found for dates 2025-06-01 - 2025-06-08"));
        assert!(replies[0].contains("- Depart: 2025-06-03, Return: 2025-06-10, Price: £250"));
        assert_eq!(h.session.step, Some(Step::OutboundDate));
        assert!(h.scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_data_without_alternatives() {
        let mut h = Harness::new(StubPricing::always(PriceLookup::Empty), EngineOptions::default());
        h.fill_until_return().await;
        let replies = h.say("2025-06-08").await;

        assert_eq!(h.pricing.calls().len(), 16);
        assert!(replies[0].contains("No available flights found within ±7 days"));
        assert_eq!(h.session.step, Some(Step::OutboundDate));
        assert!(h.scheduler.is_empty().await);

        // The loop continues from the outbound date.
        h.say("2025-07-01").await;
        assert_eq!(h.session.step, Some(Step::ReturnDate));
    }

    #[tokio::test]
    async fn test_no_data_restart_strategy() {
        let options = EngineOptions {
            no_data: NoDataStrategy::Restart,
            ..EngineOptions::default()
        };
        let mut h = Harness::new(StubPricing::always(PriceLookup::Empty), options);
        h.fill_until_return().await;
        let replies = h.say("2025-06-08").await;

        assert_eq!(h.pricing.calls().len(), 1);
        assert!(replies[0].starts_with("⚠️ No available flights for the given dates. Restarting."));
        assert!(replies[0].ends_with("🛫 Enter departure city (e.g., Manchester):"));
        assert_eq!(h.session.step, Some(Step::Departure));
        assert!(h.scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn test_lookup_failure_stays_on_return_date() {
        let mut h = Harness::new(StubPricing::failing(), EngineOptions::default());
        h.fill_until_return().await;
        let replies = h.say("2025-06-08").await;

        assert_eq!(replies, vec![prompts::LOOKUP_FAILED]);
        assert_eq!(h.session.step, Some(Step::ReturnDate));
        assert_eq!(h.pricing.calls().len(), 1);
        assert!(h.scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn test_stop_without_alert() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        let replies = h.command("stop").await;
        assert!(replies[0].to_lowercase().contains("no active notifications"));
        // Restarts into the departure prompt.
        assert_eq!(replies.len(), 2);
        assert_eq!(h.session.step, Some(Step::Departure));
    }

    #[tokio::test]
    async fn test_stop_without_restart() {
        let options = EngineOptions {
            restart_on_stop: false,
            ..EngineOptions::default()
        };
        let mut h = Harness::new(complete(), options);
        h.command("start").await;
        h.say("Faro").await;

        let replies = h.command("stop").await;
        assert_eq!(replies, vec!["⚠️ No active notifications to cancel."]);
        assert_eq!(h.session.step, None);
    }

    #[tokio::test]
    async fn test_stop_phrase_cancels_alert() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        h.fill_until_return().await;
        h.say("2025-06-08").await;
        assert_eq!(h.scheduler.len().await, 1);

        let replies = h.say("don't want to get more updates").await;
        assert!(replies[0].starts_with("🛑 Notifications cancelled."));
        assert!(h.scheduler.is_empty().await);
        assert_eq!(h.session.step, Some(Step::Departure));
    }

    #[tokio::test]
    async fn test_status_reports_alert() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        assert_eq!(h.command("status").await, vec![prompts::NO_ALERT_STATUS]);

        h.fill_until_return().await;
        h.say("2025-06-08").await;
        let replies = h.command("status").await;
        assert!(replies[0].contains("Manchester → Sevilla"));
        assert!(replies[0].contains("not yet"));
        assert_eq!(h.session.step, None);
    }

    #[tokio::test]
    async fn test_text_outside_conversation_is_ignored() {
        let mut h = Harness::new(complete(), EngineOptions::default());
        assert!(h.say("Manchester").await.is_empty());
        assert_eq!(h.session.step, None);
    }

    #[test]
    fn test_options_from_config() {
        let mut alerts = AlertConfig::default();
        alerts.interval_secs = 60;
        alerts.alternatives.trip_days = 4;
        let options = EngineOptions::from_config(&alerts).unwrap();
        assert_eq!(options.interval, Duration::from_secs(60));
        assert_eq!(options.scan.trip_days, 4);
        assert!(options.stop_phrase.is_match("Don't want more updates"));
        assert!(!options.stop_phrase.is_match("I want more updates"));

        alerts.stop_phrase = "(unclosed".into();
        assert!(EngineOptions::from_config(&alerts).is_err());
    }
}
