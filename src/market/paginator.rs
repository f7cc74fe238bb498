//! Walks the paged ticker listing and streams every record into a [`CurrencyTable`].

use log::{debug, info};
use serde::Serialize;

use crate::api::coinmarketcap::{Endpoints, Fetcher};
use crate::config::{DisplayCurrency, ExtractionMode, PAGE_SIZE};
use crate::market::scanner::{FieldScanner, ScanError};
use crate::market::table::{CurrencyRecord, CurrencyTable};
use crate::error::CoinWatchError;

const NAME: (&str, usize) = ("\"name\"", 9);
const TOTAL_SUPPLY: (&str, usize) = ("\"total_supply\"", 15);
const PRICE: (&str, usize) = ("\"price\"", 9);
const VOLUME_24H: (&str, usize) = ("volume_24h", 13);
const MARKET_CAP: (&str, usize) = ("\"market_cap\"", 14);
const CHANGE_24H: (&str, usize) = ("change_24h", 13);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PaginationState {
    pub pages_total: usize,
    pub cursor: usize,
    pub end_reached: bool,
}

impl PaginationState {
    pub fn new(pages_total: usize) -> Self {
        Self {
            pages_total,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.end_reached = false;
    }
}

enum Step {
    Fetching,
    Scanning(String),
    Done,
}

pub struct Paginator<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    endpoints: &'a Endpoints,
    currency: DisplayCurrency,
    state: PaginationState,
}

impl<'a, F: Fetcher + ?Sized> Paginator<'a, F> {
    pub fn new(
        fetcher: &'a F,
        endpoints: &'a Endpoints,
        currency: DisplayCurrency,
        pages_total: usize,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            currency,
            state: PaginationState::new(pages_total),
        }
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    /// Fetches and scans pages until the listing ends, returning the number of
    /// records stored. The cursor is reset on every exit path.
    pub async fn run(&mut self, table: &mut CurrencyTable) -> Result<usize, CoinWatchError> {
        let result = self.walk(table).await;
        self.state.reset();
        result
    }

    async fn walk(&mut self, table: &mut CurrencyTable) -> Result<usize, CoinWatchError> {
        let mut stored = 0;
        let mut step = if self.state.pages_total == 0 {
            Step::Done
        } else {
            Step::Fetching
        };

        loop {
            step = match step {
                Step::Fetching => {
                    let url = self.endpoints.ticker(self.state.cursor, self.currency);
                    Step::Scanning(self.fetcher.fetch(&url).await?)
                }
                Step::Scanning(body) => {
                    stored += self.scan_page(&body, table)?;
                    if self.state.end_reached {
                        Step::Done
                    } else {
                        self.state.cursor += 1;
                        if self.state.cursor >= self.state.pages_total {
                            Step::Done
                        } else {
                            Step::Fetching
                        }
                    }
                }
                Step::Done => break,
            };
        }

        info!(
            "Listed {} currencies from {} of {} pages",
            stored,
            self.state.cursor + usize::from(self.state.end_reached),
            self.state.pages_total
        );
        Ok(stored)
    }

    fn scan_page(&mut self, body: &str, table: &mut CurrencyTable) -> Result<usize, CoinWatchError> {
        let mode = self.currency.extraction_mode();
        let mut scanner = FieldScanner::new(body);
        let mut stored = 0;

        for _ in 0..PAGE_SIZE {
            if !scanner.has_marker(NAME.0) {
                debug!("No more records on page {}", self.state.cursor);
                self.state.end_reached = true;
                break;
            }

            let record = read_record(&mut scanner, mode)?;
            match table.insert(record) {
                Ok(_) => stored += 1,
                Err(CoinWatchError::DuplicateKey(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(stored)
    }
}

fn read_record(
    scanner: &mut FieldScanner<'_>,
    mode: ExtractionMode,
) -> Result<CurrencyRecord, ScanError> {
    let name = scanner.name(NAME.0, NAME.1)?;
    let total_supply = scanner.direct(TOTAL_SUPPLY.0, TOTAL_SUPPLY.1)?;
    let price = scanner.extract(PRICE.0, PRICE.1, mode)?;
    let volume_24h = scanner.extract(VOLUME_24H.0, VOLUME_24H.1, mode)?;
    let market_cap = scanner.extract(MARKET_CAP.0, MARKET_CAP.1, mode)?;
    let change_24h = scanner.extract(CHANGE_24H.0, CHANGE_24H.1, mode)?;

    Ok(CurrencyRecord {
        name: name.to_string(),
        price: price.to_string(),
        market_cap: market_cap.to_string(),
        total_supply: total_supply.to_string(),
        change_24h: change_24h.to_string(),
        volume_24h: volume_24h.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::{numbered_page, ticker_page, ticker_record, ScriptedFetcher};

    const BASE: &str = "https://cmc.test";

    fn endpoints() -> Endpoints {
        Endpoints::new(BASE)
    }

    #[tokio::test]
    async fn test_two_page_walk_stops_at_missing_name() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Usd), numbered_page(1, 100, "USD"));
        fetcher.respond(endpoints.ticker(1, DisplayCurrency::Usd), numbered_page(101, 50, "USD"));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 2);
        let stored = paginator.run(&mut table).await.unwrap();

        assert_eq!(stored, 150);
        assert_eq!(table.len(), 150);
        assert_eq!(paginator.state(), PaginationState::new(2));
        assert_eq!(fetcher.requests().len(), 2);

        let first = table.get("Coin 1").unwrap();
        assert_eq!(first.price, "1.5");
        assert_eq!(first.market_cap, "1000.0");
        assert_eq!(first.total_supply, " 2000.0");
        assert_eq!(first.volume_24h, "100.0");
        assert_eq!(first.change_24h, "1.0");
        assert_eq!(table.rows()[149].name, "Coin 150");
    }

    #[tokio::test]
    async fn test_early_end_skips_remaining_pages() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Usd), numbered_page(1, 100, "USD"));
        fetcher.respond(endpoints.ticker(1, DisplayCurrency::Usd), numbered_page(101, 30, "USD"));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 4);
        assert_eq!(paginator.run(&mut table).await.unwrap(), 130);
        assert_eq!(fetcher.requests().len(), 2);
        assert_eq!(paginator.state(), PaginationState::new(4));
    }

    #[tokio::test]
    async fn test_at_most_one_page_of_records_per_request() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Usd), numbered_page(1, 120, "USD"));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 1);
        assert_eq!(paginator.run(&mut table).await.unwrap(), PAGE_SIZE);
        assert!(table.get("Coin 101").is_none());
    }

    #[tokio::test]
    async fn test_converted_currency_reads_second_quote() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Eur), numbered_page(1, 3, "EUR"));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Eur, 1);
        paginator.run(&mut table).await.unwrap();

        let record = table.get("Coin 2").unwrap();
        assert_eq!(record.price, "2.25");
        assert_eq!(record.market_cap, "2900.0");
        assert_eq!(record.volume_24h, "90.0");
        assert_eq!(record.change_24h, "0.9");
        assert_eq!(record.total_supply, " 2000.0");
    }

    #[tokio::test]
    async fn test_native_currency_reads_first_quote() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        // CZK is read directly, so the USD quote listed first wins
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Czk), numbered_page(1, 2, "CZK"));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Czk, 1);
        paginator.run(&mut table).await.unwrap();
        assert_eq!(table.get("Coin 2").unwrap().price, "2.5");
    }

    #[tokio::test]
    async fn test_duplicates_suffixed_and_extra_dropped() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        let records = vec![
            ticker_record(1, "Token", "USD"),
            ticker_record(2, "Token", "USD"),
            ticker_record(3, "Token", "USD"),
            ticker_record(4, "Other", "USD"),
        ];
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Usd), ticker_page(&records));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 1);
        assert_eq!(paginator.run(&mut table).await.unwrap(), 3);
        assert_eq!(table.get("Token").unwrap().price, "1.5");
        assert_eq!(table.get("Token_1").unwrap().price, "2.5");
        assert!(table.get("Other").is_some());
    }

    #[tokio::test]
    async fn test_null_market_data_normalized() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        let record = ticker_record(7, "Ghost", "USD")
            .replace("\"total_supply\": 2000.0", "\"total_supply\": null")
            .replace("\"market_cap\": 7000.0", "\"market_cap\": null")
            .replace("\"price\": 7.5", "\"price\": null");
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Usd), ticker_page(&[record]));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 1);
        paginator.run(&mut table).await.unwrap();

        let ghost = table.get("Ghost").unwrap();
        assert_eq!(ghost.total_supply, "0");
        assert_eq!(ghost.market_cap, "0");
        assert_eq!(ghost.price, "null");
    }

    #[tokio::test]
    async fn test_fetch_failure_resets_state() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(endpoints.ticker(0, DisplayCurrency::Usd), numbered_page(1, 100, "USD"));

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 3);
        let err = paginator.run(&mut table).await.unwrap_err();

        assert!(matches!(err, CoinWatchError::Network(_)));
        assert_eq!(paginator.state(), PaginationState::new(3));
    }

    #[tokio::test]
    async fn test_no_pages_issues_no_requests() {
        let endpoints = endpoints();
        let fetcher = ScriptedFetcher::new();
        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(&fetcher, &endpoints, DisplayCurrency::Usd, 0);
        assert_eq!(paginator.run(&mut table).await.unwrap(), 0);
        assert!(fetcher.requests().is_empty());
    }
}
