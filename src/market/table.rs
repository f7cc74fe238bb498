use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::config::DisplayCurrency;
use crate::error::CoinWatchError;

/// Literal the API returns for absent market data.
pub const NULL_MARKER: &str = "null";

/// Suffix appended to a currency name that repeats within one refresh.
pub const DUPLICATE_SUFFIX: &str = "_1";

/// One row of the market table. Numeric fields keep the raw text read from the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyRecord {
    pub name: String,
    pub price: String,
    pub market_cap: String,
    pub total_supply: String,
    pub change_24h: String,
    pub volume_24h: String,
}

impl CurrencyRecord {
    /// Replaces a null market cap, supply or volume with "0". Price and change pass through.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.market_cap,
            &mut self.total_supply,
            &mut self.volume_24h,
        ] {
            if field.trim() == NULL_MARKER {
                *field = "0".to_string();
            }
        }
    }

    pub fn cells(&self) -> [&str; 6] {
        [
            &self.name,
            &self.price,
            &self.market_cap,
            &self.total_supply,
            &self.change_24h,
            &self.volume_24h,
        ]
    }
}

pub fn column_headers(currency: DisplayCurrency) -> [String; 6] {
    let code = currency.code();
    [
        "Currency".to_string(),
        format!("Price ({})", code),
        format!("Market Cap ({})", code),
        "Total Tokens".to_string(),
        format!("Change in % (24h) ({})", code),
        format!("Trade volume (24h) ({})", code),
    ]
}

/// Market table keyed by currency name, kept in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CurrencyTable {
    rows: Vec<CurrencyRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CurrencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes and stores `record`, returning the key it was stored under.
    ///
    /// A repeated name is stored once more under the suffixed key. A name whose
    /// suffixed key is also taken is rejected with [`CoinWatchError::DuplicateKey`].
    pub fn insert(&mut self, mut record: CurrencyRecord) -> Result<&str, CoinWatchError> {
        record.normalize();

        if self.index.contains_key(&record.name) {
            let renamed = format!("{}{}", record.name, DUPLICATE_SUFFIX);
            if self.index.contains_key(&renamed) {
                warn!("Currency {} repeated more than twice, dropping record", record.name);
                return Err(CoinWatchError::DuplicateKey(record.name));
            }
            debug!("Duplicate currency {}, storing as {}", record.name, renamed);
            record.name = renamed;
        }

        let position = self.rows.len();
        self.index.insert(record.name.clone(), position);
        self.rows.push(record);
        Ok(&self.rows[position].name)
    }

    pub fn get(&self, name: &str) -> Option<&CurrencyRecord> {
        self.index.get(name).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[CurrencyRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, price: &str) -> CurrencyRecord {
        CurrencyRecord {
            name: name.to_string(),
            price: price.to_string(),
            market_cap: "1000".to_string(),
            total_supply: "50".to_string(),
            change_24h: "0.5".to_string(),
            volume_24h: "20".to_string(),
        }
    }

    #[test]
    fn test_duplicate_name_gets_suffix() {
        let mut table = CurrencyTable::new();
        assert_eq!(table.insert(record("Token", "1.0")).unwrap(), "Token");
        assert_eq!(table.insert(record("Token", "2.0")).unwrap(), "Token_1");

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Token").unwrap().price, "1.0");
        assert_eq!(table.get("Token_1").unwrap().price, "2.0");
    }

    #[test]
    fn test_third_duplicate_is_rejected() {
        let mut table = CurrencyTable::new();
        table.insert(record("Token", "1.0")).unwrap();
        table.insert(record("Token", "2.0")).unwrap();

        let err = table.insert(record("Token", "3.0")).unwrap_err();
        assert!(matches!(err, CoinWatchError::DuplicateKey(name) if name == "Token"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Token_1").unwrap().price, "2.0");
    }

    #[test]
    fn test_null_fields_normalized() {
        let mut table = CurrencyTable::new();
        let mut rec = record("Nullcoin", "null");
        rec.market_cap = "null".to_string();
        rec.total_supply = " null".to_string();
        rec.volume_24h = "null".to_string();
        rec.change_24h = "null".to_string();
        table.insert(rec).unwrap();

        let stored = table.get("Nullcoin").unwrap();
        assert_eq!(stored.market_cap, "0");
        assert_eq!(stored.total_supply, "0");
        assert_eq!(stored.volume_24h, "0");
        assert_eq!(stored.price, "null");
        assert_eq!(stored.change_24h, "null");
    }

    #[test]
    fn test_rows_keep_insertion_order() {
        let mut table = CurrencyTable::new();
        for name in ["Zeta", "Alpha", "Mid"] {
            table.insert(record(name, "1.0")).unwrap();
        }
        let names: Vec<&str> = table.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
        assert!(table.get("Missing").is_none());
    }

    #[test]
    fn test_column_headers_name_currency() {
        let headers = column_headers(DisplayCurrency::Eur);
        assert_eq!(headers[0], "Currency");
        assert_eq!(headers[1], "Price (EUR)");
        assert_eq!(headers[3], "Total Tokens");
        assert_eq!(headers[5], "Trade volume (24h) (EUR)");
    }
}
