//! farewatch-pricing: flight price lookups and their presentation.
//!
//! Provides:
//! - `PricingClient` trait, the seam the bot and scheduler query through
//! - `SerpApiClient`, a Google Flights client backed by SerpApi
//! - Message formatting for price insights
//! - Nearby-date scanning when a requested itinerary has no price

pub mod alternatives;
pub mod client;
pub mod format;
pub mod serpapi;

pub use alternatives::{AlternativeFare, ScanOptions, find_alternatives, scan_alternatives};
pub use client::{PricingClient, PricingError};
pub use format::format_price_insights;
pub use serpapi::SerpApiClient;
