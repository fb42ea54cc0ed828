use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ──────────────────── Channel Types ────────────────────

/// Message from a chat channel to the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel type (e.g. "telegram").
    pub channel_type: String,
    /// Unique channel instance ID.
    pub channel_id: String,
    /// Chat the message arrived in. Conversations and alerts are keyed by it.
    pub chat_id: i64,
    /// External user/sender identifier.
    pub sender_id: String,
    /// Display name of the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message text content.
    pub text: String,
    /// Bot command name without the leading slash (e.g. "start").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Message timestamp (unix millis).
    pub timestamp: i64,
}

impl InboundMessage {
    /// Build a plain text message, mostly useful for tests and the CLI.
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            channel_type: "local".into(),
            channel_id: "local".into(),
            chat_id,
            sender_id: chat_id.to_string(),
            sender_name: None,
            text: text.into(),
            command: None,
            timestamp: 0,
        }
    }

    /// Build a bot command message (`name` without the slash).
    pub fn command(chat_id: i64, name: &str) -> Self {
        let mut msg = Self::text(chat_id, format!("/{name}"));
        msg.command = Some(name.to_string());
        msg
    }
}

/// Message from the bot to a chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Channel type (e.g. "telegram").
    pub channel_type: String,
    /// Unique channel instance ID.
    pub channel_id: String,
    /// Destination chat.
    pub chat_id: i64,
    /// Message text.
    pub text: String,
    /// Whether `text` uses simple Markdown markup.
    #[serde(default)]
    pub markdown: bool,
}

/// Status of a channel plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Channel is not running.
    Stopped,
    /// Channel is initializing.
    Starting,
    /// Channel is running and accepting messages.
    Running,
    /// Channel encountered an error.
    Error(String),
}

// ──────────────────── Route Types ────────────────────

/// A city the bot knows how to search from or to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct City {
    /// Display name, already title-cased (e.g. "Manchester").
    pub name: String,
    /// IATA airport or metro code (e.g. "MAN").
    pub airport: String,
}

impl City {
    pub fn new(name: &str, airport: &str) -> Self {
        Self {
            name: name.to_string(),
            airport: airport.to_string(),
        }
    }
}

/// Closed, ordered set of supported cities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityTable {
    cities: Vec<City>,
}

impl CityTable {
    /// Build a table, normalizing names the same way `lookup` normalizes
    /// input (trimmed, title-cased) and airport codes to trimmed uppercase.
    pub fn new(cities: Vec<City>) -> Self {
        let cities = cities
            .into_iter()
            .map(|c| City {
                name: title_case(c.name.trim()),
                airport: c.airport.trim().to_ascii_uppercase(),
            })
            .collect();
        Self { cities }
    }

    /// Look a city up from raw user input. Input is trimmed and title-cased
    /// before matching.
    pub fn lookup(&self, input: &str) -> Option<&City> {
        let name = title_case(input.trim());
        self.cities.iter().find(|c| c.name == name)
    }

    /// Comma-separated list of city names in table order.
    pub fn names(&self) -> String {
        self.cities
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The city name to show in a prompt example, by position.
    pub fn example(&self, index: usize) -> Option<&str> {
        self.cities
            .get(index)
            .or_else(|| self.cities.first())
            .map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl Default for CityTable {
    fn default() -> Self {
        Self::new(vec![
            City::new("Manchester", "MAN"),
            City::new("Sevilla", "SVQ"),
            City::new("Gdansk", "GDN"),
            City::new("Malaga", "AGP"),
            City::new("Faro", "FAO"),
            City::new("London", "LHR"),
        ])
    }
}

/// Title-case a string: the first letter of every run of letters is
/// uppercased, the rest lowercased.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_is_letter = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

// ──────────────────── Date Types ────────────────────

/// Textual date format accepted from users and sent to the pricing API.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date. Surrounding whitespace is ignored;
/// anything else that is not exactly four-two-two digits is rejected.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Format a date the way users type it.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ──────────────────── Pricing Types ────────────────────

/// One priced itinerary lookup: a route plus outbound and return dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareQuery {
    /// Departure airport code.
    pub departure: String,
    /// Arrival airport code.
    pub arrival: String,
    pub outbound: NaiveDate,
    pub return_date: NaiveDate,
}

impl FareQuery {
    pub fn new(departure: &City, arrival: &City, outbound: NaiveDate, return_date: NaiveDate) -> Self {
        Self {
            departure: departure.airport.clone(),
            arrival: arrival.airport.clone(),
            outbound,
            return_date,
        }
    }

    /// Same route, different dates.
    pub fn with_dates(&self, outbound: NaiveDate, return_date: NaiveDate) -> Self {
        Self {
            departure: self.departure.clone(),
            arrival: self.arrival.clone(),
            outbound,
            return_date,
        }
    }
}

/// A single point of price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix seconds.
    pub timestamp: i64,
    pub price: u32,
}

/// Fully validated price summary for one itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInsight {
    pub lowest_price: u32,
    /// Categorical label as returned by the search API (e.g. "typical").
    pub price_level: String,
    /// Typical price range as (low, high).
    pub typical_range: (u32, u32),
    /// History in the order the search API returned it.
    pub price_history: Vec<PricePoint>,
}

/// Result of a pricing lookup that reached the search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceLookup {
    Complete(PriceInsight),
    /// The API answered but had no usable price for the itinerary.
    Empty,
}

impl PriceLookup {
    pub fn insight(&self) -> Option<&PriceInsight> {
        match self {
            PriceLookup::Complete(insight) => Some(insight),
            PriceLookup::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PriceLookup::Empty)
    }
}

/// Display symbol for an ISO currency code.
pub fn currency_symbol(code: &str) -> String {
    match code.to_ascii_uppercase().as_str() {
        "GBP" => "£".into(),
        "EUR" => "€".into(),
        "USD" => "$".into(),
        "JPY" => "¥".into(),
        other => format!("{other} "),
    }
}

// ──────────────────── Alert Behaviour ────────────────────

/// What the conversation does when the requested dates have no price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataStrategy {
    /// Scan nearby dates, list any hits and ask for a new departure date.
    #[default]
    SuggestAlternatives,
    /// Tell the user and start over from the departure city.
    Restart,
}
