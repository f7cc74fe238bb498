use crate::error::CoinWatchError;
use crate::market::alerts::Alert;
use crate::market::refresh::{DisplaySink, MarketSnapshot};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ConsoleEvent<'a> {
    Snapshot(&'a MarketSnapshot),
    Alert(&'a Alert),
}

fn json_line(event: &ConsoleEvent<'_>) -> Result<String, CoinWatchError> {
    Ok(serde_json::to_string(event)?)
}

/// Sink for headless runs. Logs each cycle and optionally prints one JSON object per line on stdout.
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit(&self, event: ConsoleEvent<'_>) {
        match json_line(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to encode console event: {}", e),
        }
    }
}

impl DisplaySink for ConsoleSink {
    fn publish(&self, snapshot: Arc<MarketSnapshot>) {
        if self.json {
            self.emit(ConsoleEvent::Snapshot(&snapshot));
        }

        info!(
            "{} currencies in {} at {}",
            snapshot.table.len(),
            snapshot.currency,
            snapshot.fetched_at.format("%H:%M:%S")
        );
        for line in snapshot.summary.as_array() {
            info!("  {}", line);
        }
        if let Some(top) = snapshot.table.rows().first() {
            info!("  First row: {} @ {}", top.name, top.price);
        }
    }

    fn alert(&self, alert: &Alert) {
        if self.json {
            self.emit(ConsoleEvent::Alert(alert));
        }
        warn!("{} (price {})", alert.message, alert.price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::alerts::Direction;
    use serde_json::Value;

    #[test]
    fn test_alert_line_is_tagged() {
        let alert = Alert {
            currency_name: "Bitcoin".to_string(),
            price: "105.30".to_string(),
            target_value: 100,
            direction: Direction::Increase,
            message: "Bitcoin has reached the watch value!".to_string(),
        };
        let line = json_line(&ConsoleEvent::Alert(&alert)).unwrap();
        assert!(!line.contains('\n'));

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["currency_name"], "Bitcoin");
        assert_eq!(value["direction"], "increase");
        assert_eq!(value["target_value"], 100);
    }
}
