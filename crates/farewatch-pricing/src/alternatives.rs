//! Nearby-date scan for itineraries without a price.

use chrono::{Days, NaiveDate};
use futures::stream::{self, Stream, StreamExt};
use tracing::warn;

use farewatch_types::{FareQuery, PriceLookup, currency_symbol, format_date};

use crate::client::PricingClient;

/// Shape of the scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Days scanned on each side of the requested departure date.
    pub window_days: u32,
    /// Every candidate returns this many days after it departs.
    pub trip_days: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            window_days: 7,
            trip_days: 7,
        }
    }
}

/// A nearby itinerary that has a price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternativeFare {
    pub outbound: NaiveDate,
    pub return_date: NaiveDate,
    pub lowest_price: u32,
}

impl AlternativeFare {
    /// One-line summary, e.g. `- Depart: 2025-06-03, Return: 2025-06-10, Price: £180`.
    pub fn summary_line(&self, currency: &str) -> String {
        format!(
            "- Depart: {}, Return: {}, Price: {}{}",
            format_date(self.outbound),
            format_date(self.return_date),
            currency_symbol(currency),
            self.lowest_price
        )
    }
}

/// Candidate (outbound, return) pairs in offset order, from `-window_days`
/// to `+window_days` around `outbound`.
pub fn candidate_dates(outbound: NaiveDate, opts: ScanOptions) -> Vec<(NaiveDate, NaiveDate)> {
    let window = i64::from(opts.window_days);
    (-window..=window)
        .filter_map(|offset| {
            let depart = if offset < 0 {
                outbound.checked_sub_days(Days::new(offset.unsigned_abs()))
            } else {
                outbound.checked_add_days(Days::new(offset as u64))
            }?;
            let ret = depart.checked_add_days(Days::new(u64::from(opts.trip_days)))?;
            Some((depart, ret))
        })
        .collect()
}

/// Lazily query every candidate around `query.outbound`, yielding the ones
/// that have a price.
///
/// Candidates are queried one after another and all of them are queried;
/// results come out in offset order. The route comes from `query`; its return
/// date is ignored in favour of `opts.trip_days`. A failed lookup skips that
/// candidate.
pub fn scan_alternatives<'a>(
    client: &'a dyn PricingClient,
    query: &'a FareQuery,
    opts: ScanOptions,
) -> impl Stream<Item = AlternativeFare> + Send + 'a {
    stream::iter(candidate_dates(query.outbound, opts)).filter_map(move |(outbound, return_date)| {
        async move {
            let candidate = query.with_dates(outbound, return_date);
            match client.price_insights(&candidate).await {
                Ok(PriceLookup::Complete(insight)) => Some(AlternativeFare {
                    outbound,
                    return_date,
                    lowest_price: insight.lowest_price,
                }),
                Ok(PriceLookup::Empty) => None,
                Err(e) => {
                    warn!(
                        departure = %query.departure,
                        arrival = %query.arrival,
                        %outbound,
                        "Alternative date lookup failed: {e}"
                    );
                    None
                }
            }
        }
    })
}

/// Run the whole scan and collect the hits.
pub async fn find_alternatives(
    client: &dyn PricingClient,
    query: &FareQuery,
    opts: ScanOptions,
) -> Vec<AlternativeFare> {
    scan_alternatives(client, query, opts).collect().await
}
