use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farewatch_types::{City, CityTable, NoDataStrategy};

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the SerpApi key.
pub const PRICING_KEY_ENV: &str = "SERPAPI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Missing secret: set {0} in the environment or config file")]
    MissingSecret(&'static str),
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Flight search API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    /// ISO currency code prices are quoted in.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Interface language (`hl`).
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Stop-count filter passed through to the search engine.
    #[serde(default = "default_stops")]
    pub stops: u8,
}

fn default_base_url() -> String {
    "https://serpapi.com".to_string()
}

fn default_engine() -> String {
    "google_flights".to_string()
}

fn default_currency() -> String {
    "GBP".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_stops() -> u8 {
    1
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            engine: default_engine(),
            currency: default_currency(),
            locale: default_locale(),
            stops: default_stops(),
        }
    }
}

/// Nearby-date scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativesConfig {
    /// Days scanned on each side of the requested departure date.
    #[serde(default = "default_seven")]
    pub window_days: u32,
    /// Trip length used for every scanned itinerary.
    #[serde(default = "default_seven")]
    pub trip_days: u32,
}

fn default_seven() -> u32 {
    7
}

impl Default for AlternativesConfig {
    fn default() -> Self {
        Self {
            window_days: default_seven(),
            trip_days: default_seven(),
        }
    }
}

/// Recurring alert and conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Seconds between price updates for an active alert.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub no_data: NoDataStrategy,
    /// Re-enter the departure prompt after a stop.
    #[serde(default = "default_true")]
    pub restart_on_stop: bool,
    /// Free-text phrase (regex) that acts like `/stop`.
    #[serde(default = "default_stop_phrase")]
    pub stop_phrase: String,
    #[serde(default)]
    pub alternatives: AlternativesConfig,
}

fn default_interval() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_stop_phrase() -> String {
    "(?i)^(Don't want( to get)? more updates)$".to_string()
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            no_data: NoDataStrategy::default(),
            restart_on_stop: default_true(),
            stop_phrase: default_stop_phrase(),
            alternatives: AlternativesConfig::default(),
        }
    }
}

/// Top-level farewatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarewatchConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Supported cities, in the order they are listed to users.
    #[serde(default = "default_cities")]
    pub cities: Vec<City>,
}

fn default_cities() -> Vec<City> {
    CityTable::default().iter().cloned().collect()
}

impl Default for FarewatchConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            pricing: PricingConfig::default(),
            alerts: AlertConfig::default(),
            cities: default_cities(),
        }
    }
}

impl FarewatchConfig {
    /// The configured cities as a lookup table.
    pub fn city_table(&self) -> CityTable {
        CityTable::new(self.cities.clone())
    }

    /// Fill secrets from the environment. Values already present in the
    /// environment win over the config file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(key) = lookup(PRICING_KEY_ENV).filter(|v| !v.is_empty()) {
            self.pricing.api_key = Some(key);
        }
    }

    /// Both secrets, or the name of the first one missing.
    pub fn require_secrets(&self) -> Result<(&str, &str), ConfigError> {
        let token = self
            .telegram
            .bot_token
            .as_deref()
            .ok_or(ConfigError::MissingSecret(BOT_TOKEN_ENV))?;
        let key = self
            .pricing
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret(PRICING_KEY_ENV))?;
        Ok((token, key))
    }
}

/// Resolve the farewatch config directory (~/.farewatch/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".farewatch"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.farewatch/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path (or `path`), then apply
/// environment secrets.
pub fn load_config(path: Option<&Path>) -> Result<FarewatchConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    let mut config = load_config_from(&path)?;
    config.apply_env_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<FarewatchConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(FarewatchConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: FarewatchConfig = json5::from_str(&content)?;
    Ok(config)
}
