//! SerpApi Google Flights client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use farewatch_config::PricingConfig;
use farewatch_types::{FareQuery, PriceInsight, PriceLookup, PricePoint, format_date};

use crate::client::{PricingClient, PricingError};

/// Price lookups through SerpApi's `google_flights` engine.
pub struct SerpApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    engine: String,
    currency: String,
    locale: String,
    stops: u8,
}

impl SerpApiClient {
    /// Create a client from the pricing config section and an API key.
    pub fn new(api_key: &str, config: &PricingConfig) -> Result<Self, PricingError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            engine: config.engine.clone(),
            currency: config.currency.clone(),
            locale: config.locale.clone(),
            stops: config.stops,
        })
    }

    fn query_params(&self, query: &FareQuery) -> Vec<(&'static str, String)> {
        vec![
            ("engine", self.engine.clone()),
            ("currency", self.currency.clone()),
            ("hl", self.locale.clone()),
            ("stops", self.stops.to_string()),
            ("departure_id", query.departure.clone()),
            ("arrival_id", query.arrival.clone()),
            ("outbound_date", format_date(query.outbound)),
            ("return_date", format_date(query.return_date)),
            ("api_key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl PricingClient for SerpApiClient {
    fn currency(&self) -> &str {
        &self.currency
    }

    async fn price_insights(&self, query: &FareQuery) -> Result<PriceLookup, PricingError> {
        let resp = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&self.query_params(query))
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;

        let lookup = parse_search_response(status.as_u16(), body)?;
        debug!(
            departure = %query.departure,
            arrival = %query.arrival,
            outbound = %query.outbound,
            return_date = %query.return_date,
            found = !lookup.is_empty(),
            "Price lookup finished"
        );
        Ok(lookup)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    price_insights: Option<RawPriceInsights>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPriceInsights {
    #[serde(default)]
    lowest_price: Option<u32>,
    #[serde(default)]
    price_level: Option<String>,
    #[serde(default)]
    typical_price_range: Option<Vec<u32>>,
    #[serde(default)]
    price_history: Vec<(i64, u32)>,
}

/// Turn a SerpApi response body into a lookup result.
///
/// A missing `price_insights.lowest_price`, or SerpApi's "no results" error,
/// is `Empty`. A present lowest price without a level or a two-element
/// typical range is rejected here so formatting never sees partial data.
pub fn parse_search_response(
    status: u16,
    body: serde_json::Value,
) -> Result<PriceLookup, PricingError> {
    let resp: SearchResponse =
        serde_json::from_value(body).map_err(|e| PricingError::Malformed(e.to_string()))?;

    if let Some(message) = resp.error {
        if is_no_results(&message) {
            return Ok(PriceLookup::Empty);
        }
        return Err(PricingError::Api { status, message });
    }
    if !(200..300).contains(&status) {
        return Err(PricingError::Api {
            status,
            message: "unexpected response status".into(),
        });
    }

    let Some(raw) = resp.price_insights else {
        return Ok(PriceLookup::Empty);
    };
    let Some(lowest_price) = raw.lowest_price else {
        return Ok(PriceLookup::Empty);
    };

    let price_level = raw
        .price_level
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| PricingError::Malformed("missing price_level".into()))?;
    let typical_range = match raw.typical_price_range.as_deref() {
        Some([low, high]) => (*low, *high),
        Some(other) => {
            return Err(PricingError::Malformed(format!(
                "typical_price_range has {} values, expected 2",
                other.len()
            )));
        }
        None => return Err(PricingError::Malformed("missing typical_price_range".into())),
    };

    Ok(PriceLookup::Complete(PriceInsight {
        lowest_price,
        price_level,
        typical_range,
        price_history: raw
            .price_history
            .into_iter()
            .map(|(timestamp, price)| PricePoint { timestamp, price })
            .collect(),
    }))
}

fn is_no_results(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("hasn't returned any results") || lower.contains("no results")
}
