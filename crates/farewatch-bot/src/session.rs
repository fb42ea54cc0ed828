//! Per-chat conversation state.

use chrono::NaiveDate;

use farewatch_types::{City, FareQuery};

/// Which answer the conversation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Departure,
    Arrival,
    OutboundDate,
    ReturnDate,
}

/// Answers collected so far in one chat, plus the step it is on.
///
/// `step` is `None` when no conversation is in progress (never started, or
/// finished by scheduling an alert). Sessions live only in memory.
#[derive(Debug, Clone)]
pub struct Session {
    pub chat_id: i64,
    pub step: Option<Step>,
    pub departure: Option<City>,
    pub arrival: Option<City>,
    pub outbound: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
}

impl Session {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            step: None,
            departure: None,
            arrival: None,
            outbound: None,
            return_date: None,
        }
    }

    /// Key used for this chat's recurring alert.
    pub fn key(&self) -> String {
        self.chat_id.to_string()
    }

    /// Drop every answer and wait for a departure city.
    pub fn restart(&mut self) {
        *self = Self::new(self.chat_id);
        self.step = Some(Step::Departure);
    }

    /// Leave the conversation. Answers are kept for reference.
    pub fn end(&mut self) {
        self.step = None;
    }

    pub fn is_active(&self) -> bool {
        self.step.is_some()
    }

    /// The itinerary, once all four answers are in.
    pub fn fare_query(&self) -> Option<FareQuery> {
        Some(FareQuery::new(
            self.departure.as_ref()?,
            self.arrival.as_ref()?,
            self.outbound?,
            self.return_date?,
        ))
    }
}
