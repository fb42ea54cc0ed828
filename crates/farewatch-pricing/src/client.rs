//! Pricing client trait and error type.

use async_trait::async_trait;
use thiserror::Error;

use farewatch_types::{FareQuery, PriceLookup};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Search API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Malformed price insights: {0}")]
    Malformed(String),
}

/// Looks up price insights for one itinerary.
///
/// `Ok(PriceLookup::Empty)` means the search service answered and had no
/// price. Transport failures and unusable payloads are `Err`, so callers can
/// tell "no flights" apart from "could not ask".
#[async_trait]
pub trait PricingClient: Send + Sync {
    /// ISO code of the currency prices are quoted in.
    fn currency(&self) -> &str;

    /// Query price insights. Exactly one request is made; there is no retry.
    async fn price_insights(&self, query: &FareQuery) -> Result<PriceLookup, PricingError>;
}
