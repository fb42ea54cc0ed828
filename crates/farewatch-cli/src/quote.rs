use anyhow::{Context, Result, bail};
use futures::StreamExt;

use farewatch_config::FarewatchConfig;
use farewatch_pricing::{
    PricingClient, ScanOptions, SerpApiClient, format_price_insights, scan_alternatives,
};
use farewatch_types::{CityTable, FareQuery, PriceLookup, parse_date};

/// Build the itinerary from command-line input, using the same city and
/// date rules as the chat.
pub fn resolve_query(
    cities: &CityTable,
    from: &str,
    to: &str,
    outbound: &str,
    return_date: &str,
) -> Result<FareQuery> {
    let Some(departure) = cities.lookup(from) else {
        bail!("unknown departure city {from:?}, expected one of: {}", cities.names());
    };
    let Some(arrival) = cities.lookup(to) else {
        bail!("unknown arrival city {to:?}, expected one of: {}", cities.names());
    };
    let outbound = parse_date(outbound).with_context(|| format!("invalid outbound date {outbound:?}, use YYYY-MM-DD"))?;
    let return_date =
        parse_date(return_date).with_context(|| format!("invalid return date {return_date:?}, use YYYY-MM-DD"))?;
    Ok(FareQuery::new(departure, arrival, outbound, return_date))
}

/// One-shot price lookup printed to stdout.
pub async fn run_quote(config: &FarewatchConfig, query: FareQuery, alternatives: bool) -> Result<()> {
    let Some(api_key) = config.pricing.api_key.as_deref() else {
        bail!(
            "pricing requires pricing.api_key or {}",
            farewatch_config::PRICING_KEY_ENV
        );
    };
    let client = SerpApiClient::new(api_key, &config.pricing)?;

    match client.price_insights(&query).await? {
        PriceLookup::Complete(insight) => {
            println!("{}", format_price_insights(&insight, client.currency()));
        }
        PriceLookup::Empty => {
            println!(
                "No flights found for {} → {}, {} to {}.",
                query.departure, query.arrival, query.outbound, query.return_date
            );
            if alternatives {
                print_alternatives(&client, &query, config).await;
            }
        }
    }
    Ok(())
}

async fn print_alternatives(client: &SerpApiClient, query: &FareQuery, config: &FarewatchConfig) {
    let opts = ScanOptions {
        window_days: config.alerts.alternatives.window_days,
        trip_days: config.alerts.alternatives.trip_days,
    };
    println!("Scanning ±{} days...", opts.window_days);

    let mut found = 0usize;
    let mut hits = std::pin::pin!(scan_alternatives(client, query, opts));
    while let Some(fare) = hits.next().await {
        println!("{}", fare.summary_line(client.currency()));
        found += 1;
    }
    if found == 0 {
        println!("No available flights within ±{} days.", opts.window_days);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_query() {
        let query = resolve_query(&CityTable::default(), "gdansk", "Malaga", "2025-06-01", "2025-06-08").unwrap();
        assert_eq!(query.departure, "GDN");
        assert_eq!(query.arrival, "AGP");
        assert_eq!(query.return_date, "2025-06-08".parse().unwrap());
    }

    #[test]
    fn test_resolve_query_rejects_bad_input() {
        let cities = CityTable::default();
        let err = resolve_query(&cities, "Paris", "Faro", "2025-06-01", "2025-06-08").unwrap_err();
        assert!(err.to_string().contains("Manchester"));
        assert!(resolve_query(&cities, "Faro", "London", "2025-6-1", "2025-06-08").is_err());
        assert!(resolve_query(&cities, "Faro", "London", "2025-06-01", "2025-02-30").is_err());
    }
}
