use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::market::table::CurrencyTable;
use crate::error::CoinWatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn toggle(&self) -> Direction {
        match self {
            Direction::Increase => Direction::Decrease,
            Direction::Decrease => Direction::Increase,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Direction::Increase => ">",
            Direction::Decrease => "<",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Increase => f.write_str("increase"),
            Direction::Decrease => f.write_str("decrease"),
        }
    }
}

/// Price watch on a single currency, read once per refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchConfig {
    pub currency_name: String,
    pub target_value: i64,
    pub direction: Direction,
    pub enabled: bool,
}

impl WatchConfig {
    /// Builds the cycle's watch from the raw user input. A target that is not an
    /// integer leaves the watch disabled.
    pub fn from_input(currency_name: &str, target_text: &str, direction: Direction, enabled: bool) -> Self {
        let target = target_text.trim().parse::<i64>();
        if enabled && target.is_err() {
            debug!("Watch target '{}' is not an integer, watch disabled", target_text);
        }
        Self {
            currency_name: currency_name.to_string(),
            target_value: target.as_ref().copied().unwrap_or_default(),
            direction,
            enabled: enabled && target.is_ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub currency_name: String,
    pub price: String,
    pub target_value: i64,
    pub direction: Direction,
    pub message: String,
}

/// Integer part of a price string. The price must contain a decimal point.
pub fn integer_price(price: &str) -> Result<i64, CoinWatchError> {
    let malformed = || CoinWatchError::MalformedNumeric {
        field: "price",
        value: price.to_string(),
    };
    let whole = price.find('.').map(|dot| &price[..dot]).ok_or_else(malformed)?;
    whole.trim().parse::<i64>().map_err(|_| malformed())
}

/// Decides whether the watched currency crossed its target in this table.
pub fn evaluate(table: &CurrencyTable, watch: &WatchConfig) -> Option<Alert> {
    if !watch.enabled {
        return None;
    }

    let record = table.get(&watch.currency_name)?;

    let price = match integer_price(&record.price) {
        Ok(p) => p,
        Err(e) => {
            debug!("Skipping watch on {}: {}", watch.currency_name, e);
            return None;
        }
    };

    let crossed = match watch.direction {
        Direction::Increase => price > watch.target_value,
        Direction::Decrease => price < watch.target_value,
    };

    crossed.then(|| Alert {
        currency_name: watch.currency_name.clone(),
        price: record.price.clone(),
        target_value: watch.target_value,
        direction: watch.direction,
        message: format!("{} has reached the watch value!", watch.currency_name),
    })
}
