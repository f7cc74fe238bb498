use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::coinmarketcap::Fetcher;
use crate::market::alerts::Alert;
use crate::market::refresh::{DisplaySink, MarketSnapshot};
use crate::error::CoinWatchError;

/// In-memory fetcher serving canned bodies by URL and recording every request.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: impl Into<String>, body: impl Into<String>) {
        self.responses.lock().insert(url.into(), body.into());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CoinWatchError> {
        self.requests.lock().push(url.to_string());
        self.responses
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| CoinWatchError::Network(format!("no route to {}", url)))
    }
}

/// Sink that keeps everything it receives, in order.
#[derive(Default)]
pub struct RecordingSink {
    snapshots: Mutex<Vec<Arc<MarketSnapshot>>>,
    alerts: Mutex<Vec<Alert>>,
    events: Mutex<Vec<&'static str>>,
}

impl RecordingSink {
    pub fn last_snapshot(&self) -> Option<Arc<MarketSnapshot>> {
        self.snapshots.lock().last().cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }
}

impl DisplaySink for RecordingSink {
    fn publish(&self, snapshot: Arc<MarketSnapshot>) {
        self.events.lock().push("publish");
        self.snapshots.lock().push(snapshot);
    }

    fn alert(&self, alert: &Alert) {
        self.events.lock().push("alert");
        self.alerts.lock().push(alert.clone());
    }
}

fn quote(price: &str, volume: &str, market_cap: &str, change: &str) -> String {
    format!(
        r#"{{"price": {}, "volume_24h": {}, "market_cap": {}, "percent_change_1h": 0.1, "percent_change_24h": {}, "percent_change_7d": 2.0}}"#,
        price, volume, market_cap, change
    )
}

/// One ticker record. A converted quote is added for every currency but USD.
pub fn ticker_record(id: usize, name: &str, code: &str) -> String {
    let usd = quote(&format!("{}.5", id), "100.0", &format!("{}000.0", id), "1.0");
    let quotes = if code == "USD" {
        format!(r#""USD": {}"#, usd)
    } else {
        let converted = quote(&format!("{}.25", id), "90.0", &format!("{}900.0", id), "0.9");
        format!(r#""USD": {}, "{}": {}"#, usd, code, converted)
    };
    format!(
        r#""{id}": {{"id": {id}, "name": "{name}", "symbol": "C{id}", "website_slug": "coin-{id}", "rank": {id}, "circulating_supply": 1000.0, "total_supply": 2000.0, "max_supply": null, "quotes": {{{quotes}}}, "last_updated": 1530000000}}"#,
        id = id,
        name = name,
        quotes = quotes
    )
}

pub fn ticker_page(records: &[String]) -> String {
    format!(
        r#"{{"data": {{{}}}, "metadata": {{"timestamp": 1530000000, "error": null}}}}"#,
        records.join(", ")
    )
}

/// Ticker page with records `first..first + count` named "Coin {id}".
pub fn numbered_page(first: usize, count: usize, code: &str) -> String {
    let records: Vec<String> = (first..first + count)
        .map(|id| ticker_record(id, &format!("Coin {}", id), code))
        .collect();
    ticker_page(&records)
}

pub fn global_body(currencies: u64, code: &str) -> String {
    format!(
        r#"{{"data": {{"active_cryptocurrencies": {}, "active_markets": 15210, "bitcoin_percentage_of_market_cap": 53.82, "quotes": {{"USD": {{"total_market_cap": 250000000000.0, "total_volume_24h": 12000000000.0}}, "{}": {{"total_market_cap": 215000000000.0, "total_volume_24h": 10000000000.0}}}}, "last_updated": 1530000000}}, "metadata": {{"timestamp": 1530000000, "error": null}}}}"#,
        currencies, code
    )
}
