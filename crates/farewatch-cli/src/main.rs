mod health;
mod quote;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use farewatch_config::FarewatchConfig;
use farewatch_pricing::SerpApiClient;

#[derive(Parser)]
#[command(name = "farewatch", about = "Flight price alert bot")]
struct Cli {
    /// Config file (defaults to ~/.farewatch/config.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Telegram bot
    Run,
    /// Look up prices for one itinerary and print them
    Quote {
        /// Departure city
        #[arg(long)]
        from: String,

        /// Arrival city
        #[arg(long)]
        to: String,

        /// Outbound date (YYYY-MM-DD)
        #[arg(long)]
        outbound: String,

        /// Return date (YYYY-MM-DD)
        #[arg(long = "return")]
        return_date: String,

        /// Scan nearby dates when the itinerary has no price
        #[arg(long)]
        alternatives: bool,
    },
    /// Print the resolved configuration
    Health,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<(FarewatchConfig, PathBuf)> {
    let path = match path {
        Some(p) => p.clone(),
        None => farewatch_config::config_file_path()?,
    };
    let config = farewatch_config::load_config(Some(path.as_path()))
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    tracing::debug!(path = %path.display(), cities = config.cities.len(), "Configuration loaded");
    Ok((config, path))
}

async fn run_bot(config: FarewatchConfig) -> anyhow::Result<()> {
    let (_, api_key) = config.require_secrets()?;
    let pricing = Arc::new(SerpApiClient::new(api_key, &config.pricing)?);
    let channel = farewatch_channel_telegram::create_telegram_channel(&config)?;
    farewatch_bot::start_bot(&config, channel, pricing).await
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let (config, config_path) = load(cli.config.as_ref())?;

    match cli.command {
        Commands::Run => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_bot(config))?;
        }
        Commands::Quote {
            from,
            to,
            outbound,
            return_date,
            alternatives,
        } => {
            let query = quote::resolve_query(&config.city_table(), &from, &to, &outbound, &return_date)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(quote::run_quote(&config, query, alternatives))?;
        }
        Commands::Health => {
            println!("{}", health::health_report(&config, &config_path));
        }
    }

    Ok(())
}
