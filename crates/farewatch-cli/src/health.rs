use std::fmt::Write;
use std::path::Path;

use farewatch_config::FarewatchConfig;

fn set_or_missing(value: &Option<String>) -> &'static str {
    if value.as_deref().is_some_and(|v| !v.is_empty()) {
        "set"
    } else {
        "missing"
    }
}

/// Human-readable summary of the resolved configuration. Secrets are only
/// reported as present or missing.
pub fn health_report(config: &FarewatchConfig, config_path: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "farewatch {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "  config file: {}", config_path.display());
    let _ = writeln!(out, "  telegram token: {}", set_or_missing(&config.telegram.bot_token));
    let _ = writeln!(out, "  pricing api key: {}", set_or_missing(&config.pricing.api_key));
    let _ = writeln!(
        out,
        "  pricing: {} ({}, {}, stops={})",
        config.pricing.base_url, config.pricing.currency, config.pricing.locale, config.pricing.stops
    );
    let _ = writeln!(out, "  cities: {}", config.city_table().names());
    let _ = writeln!(out, "  alert interval: {}s", config.alerts.interval_secs);
    let _ = writeln!(out, "  on no data: {:?}", config.alerts.no_data);
    let _ = write!(out, "  restart on stop: {}", config.alerts.restart_on_stop);
    out
}
