use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::market::alerts::Direction;

/// Interval between automatic refresh cycles.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Records per ticker page requested from the market data API.
pub const PAGE_SIZE: usize = 100;

pub const DEFAULT_BASE_URL: &str = "https://api.coinmarketcap.com";

/// Currency the market data is converted into before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayCurrency {
    Usd,
    Czk,
    Eur,
    Btc,
}

/// Which occurrence of a quote field belongs to the display currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Direct,
    Converted,
}

impl DisplayCurrency {
    pub const ALL: [DisplayCurrency; 4] = [
        DisplayCurrency::Usd,
        DisplayCurrency::Czk,
        DisplayCurrency::Eur,
        DisplayCurrency::Btc,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            DisplayCurrency::Usd => "USD",
            DisplayCurrency::Czk => "CZK",
            DisplayCurrency::Eur => "EUR",
            DisplayCurrency::Btc => "BTC",
        }
    }

    /// USD and CZK quotes are read from the first occurrence of each field,
    /// EUR and BTC from the second.
    pub fn extraction_mode(&self) -> ExtractionMode {
        match self {
            DisplayCurrency::Usd | DisplayCurrency::Czk => ExtractionMode::Direct,
            DisplayCurrency::Eur | DisplayCurrency::Btc => ExtractionMode::Converted,
        }
    }

    pub fn next(&self) -> DisplayCurrency {
        match self {
            DisplayCurrency::Usd => DisplayCurrency::Czk,
            DisplayCurrency::Czk => DisplayCurrency::Eur,
            DisplayCurrency::Eur => DisplayCurrency::Btc,
            DisplayCurrency::Btc => DisplayCurrency::Usd,
        }
    }
}

impl fmt::Display for DisplayCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Parser, Debug)]
#[command(name = "coinwatch")]
#[command(about = "Cryptocurrency market table with a one-shot price watch", long_about = None)]
pub struct Cli {
    /// Currency the market data is converted into
    #[arg(short, long, value_enum, default_value_t = DisplayCurrency::Usd)]
    pub currency: DisplayCurrency,

    /// Base URL of the market data API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Name of the currency to watch (enables the watch)
    #[arg(short, long)]
    pub watch: Option<String>,

    /// Target price for the watched currency
    #[arg(short, long, default_value = "")]
    pub target: String,

    /// Alert when the price rises above or falls below the target
    #[arg(short, long, value_enum, default_value_t = Direction::Increase)]
    pub direction: Direction,

    /// Run without the terminal dashboard
    #[arg(long)]
    pub headless: bool,

    /// Print every snapshot and alert as a JSON line (headless only)
    #[arg(long)]
    pub json: bool,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Per-request timeout; requests wait indefinitely when unset
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging for this crate
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn is_headless(&self) -> bool {
        self.headless || self.once
    }
}
