//! User-facing message texts.

pub const OUTBOUND_PROMPT: &str = "📅 Enter departure date (YYYY-MM-DD):";
pub const RETURN_PROMPT: &str = "📅 Enter return date (YYYY-MM-DD):";
pub const INVALID_DATE: &str = "⚠️ Invalid date format. Please enter date as YYYY-MM-DD:";
pub const LOOKUP_FAILED: &str = "⚠️ The flight search service could not be reached. \
                                 Please enter the return date again to retry (YYYY-MM-DD):";
pub const DAILY_NO_FLIGHTS: &str = "⚠️ The specified dates no longer have any available flights. \
                                    Notifications cancelled. Send /start to set up a new schedule.";

pub fn departure_prompt(example: &str) -> String {
    format!("🛫 Enter departure city (e.g., {example}):")
}

pub fn arrival_prompt(example: &str) -> String {
    format!("🏙️ Enter arrival city (e.g., {example}):")
}

/// `kind` is "departure" or "arrival".
pub fn invalid_city(kind: &str, available: &str) -> String {
    format!("⚠️ Invalid {kind} city. Available options:\n{available}\n\nPlease enter again:")
}

pub fn no_flights_restart(departure_prompt: &str) -> String {
    format!("⚠️ No available flights for the given dates. Restarting.\n\n{departure_prompt}")
}

pub fn alternatives_found(outbound: &str, return_date: &str, lines: &[String]) -> String {
    format!(
        "⚠️ No flights found for dates {outbound} - {return_date}.\n\n\
         ✅ *Available alternatives:*\n{}\n\n\
         Please enter a new departure date (YYYY-MM-DD):",
        lines.join("\n")
    )
}

pub fn no_alternatives(window_days: u32) -> String {
    format!(
        "⚠️ No available flights found within ±{window_days} days. Try different cities or dates.\n\n\
         {OUTBOUND_PROMPT}"
    )
}

pub fn scheduled(restart_on_stop: bool) -> String {
    if restart_on_stop {
        "✅ Daily updates scheduled! You will receive updates daily.\n\
         Type 'Don't want more updates' or /stop to cancel and start a new schedule."
            .to_string()
    } else {
        "✅ Daily updates scheduled! Type /stop to cancel.".to_string()
    }
}

pub fn stopped(existed: bool, restart_on_stop: bool) -> String {
    match (existed, restart_on_stop) {
        (true, true) => "🛑 Notifications cancelled. \
                         Please enter a new departure city to start a new schedule."
            .to_string(),
        (false, true) => "No active notifications found. \
                          Please enter a new departure city to start a new schedule."
            .to_string(),
        (true, false) => "🛑 Daily notifications cancelled.".to_string(),
        (false, false) => "⚠️ No active notifications to cancel.".to_string(),
    }
}

pub fn alert_status(description: &str, last_run: Option<&str>) -> String {
    format!(
        "🔔 Active alert: {description}\nLast update: {}",
        last_run.unwrap_or("not yet")
    )
}

pub const NO_ALERT_STATUS: &str = "No active notifications. Send /start to set one up.";
