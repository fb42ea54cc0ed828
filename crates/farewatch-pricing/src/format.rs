//! Chat message rendering for price insights.

use std::fmt::Write;

use chrono::DateTime;

use farewatch_types::{PriceInsight, currency_symbol, title_case};

/// Render a price insight as a Markdown chat message.
///
/// History is printed in the reverse of the order the search API returned
/// it; entries are not re-sorted by timestamp.
pub fn format_price_insights(insight: &PriceInsight, currency: &str) -> String {
    let sym = currency_symbol(currency);
    let (low, high) = insight.typical_range;

    let mut out = format!(
        "✈️ *Flight Price Insights:*\n\n\
         Lowest Price: {sym}{}\n\
         Price Level: {}\n\
         Typical Range: {sym}{low} - {sym}{high}\n\n\
         📅 *Price History:*\n",
        insight.lowest_price,
        title_case(&insight.price_level),
    );

    for point in insight.price_history.iter().rev() {
        let date = DateTime::from_timestamp(point.timestamp, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| point.timestamp.to_string());
        let _ = writeln!(out, "- {date}: {sym}{}", point.price);
    }
    out
}
