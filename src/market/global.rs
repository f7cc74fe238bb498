//! Aggregate market figures from the global endpoint.
//!
//! `total_market_cap` is a quote field, so it follows the same direct/converted routing as the
//! ticker quotes: EUR and BTC read its second occurrence instead of the USD figure.

use log::debug;
use serde::Serialize;

use crate::config::{DisplayCurrency, ExtractionMode, PAGE_SIZE};
use crate::market::scanner::{extract_converted, extract_direct};
use crate::error::CoinWatchError;

const CURRENCIES_MARKER: (&str, usize) = ("cryptocurrencies", 19);
const MARKETS_MARKER: (&str, usize) = ("markets", 10);
const MARKET_CAP_MARKER: (&str, usize) = ("total_market_cap", 19);
const BTC_SHARE_MARKER: (&str, usize) = ("of_market_cap", 16);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_currencies: u64,
    pub total_markets: u64,
    pub total_market_cap: String,
    pub btc_market_share: String,
}

impl GlobalStats {
    /// Ticker pages needed to list every currency.
    pub fn pages_total(&self) -> usize {
        (self.total_currencies as usize).div_ceil(PAGE_SIZE)
    }

    pub fn summary(&self, currency: DisplayCurrency) -> SummaryLines {
        SummaryLines {
            total_currencies: format!("Total Currencies: {}", self.total_currencies),
            markets_active: format!("Markets Active: {}", self.total_markets),
            total_volume: format!("Total volume ({}): {}", currency.code(), self.total_market_cap),
            btc_share: format!("BTC Market Share (%): {}", self.btc_market_share),
        }
    }
}

/// Display strings shown above the market table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLines {
    pub total_currencies: String,
    pub markets_active: String,
    pub total_volume: String,
    pub btc_share: String,
}

impl SummaryLines {
    pub fn as_array(&self) -> [&str; 4] {
        [
            &self.total_currencies,
            &self.markets_active,
            &self.total_volume,
            &self.btc_share,
        ]
    }
}

/// Reads the aggregate market figures from a global endpoint response.
pub fn extract_global(text: &str, currency: DisplayCurrency) -> Result<GlobalStats, CoinWatchError> {
    let (marker, offset) = CURRENCIES_MARKER;
    let total_currencies = parse_count("total_currencies", extract_direct(text, marker, offset)?)?;

    let (marker, offset) = MARKETS_MARKER;
    let total_markets = parse_count("total_markets", extract_direct(text, marker, offset)?)?;

    let (marker, offset) = MARKET_CAP_MARKER;
    let total_market_cap = match currency.extraction_mode() {
        ExtractionMode::Direct => extract_direct(text, marker, offset)?,
        ExtractionMode::Converted => extract_converted(text, marker, offset)?,
    };

    let (marker, offset) = BTC_SHARE_MARKER;
    let btc_market_share = extract_direct(text, marker, offset)?;

    let stats = GlobalStats {
        total_currencies,
        total_markets,
        total_market_cap: total_market_cap.to_string(),
        btc_market_share: btc_market_share.to_string(),
    };
    debug!(
        "Global stats: {} currencies, {} markets, {} pages",
        stats.total_currencies,
        stats.total_markets,
        stats.pages_total()
    );
    Ok(stats)
}

fn parse_count(field: &'static str, value: &str) -> Result<u64, CoinWatchError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| CoinWatchError::MalformedNumeric {
            field,
            value: value.to_string(),
        })
}
