//! Refresh cycle sequencing and scheduling.
//!
//! A cycle fetches the global figures, walks the ticker listing into a fresh table,
//! hands the finished snapshot to the display sink and then checks the price watch.
//! At most one cycle runs at a time: a trigger that finds a cycle in flight is dropped.

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::coinmarketcap::{Endpoints, Fetcher};
use crate::config::DisplayCurrency;
use crate::market::alerts::{self, Alert, Direction, WatchConfig};
use crate::market::global::{extract_global, GlobalStats, SummaryLines};
use crate::market::paginator::Paginator;
use crate::market::table::{column_headers, CurrencyTable};
use crate::error::CoinWatchError;

/// Receiver of finished refresh results.
pub trait DisplaySink: Send + Sync {
    fn publish(&self, snapshot: Arc<MarketSnapshot>);
    fn alert(&self, alert: &Alert);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    Startup,
    Timer,
    Manual,
    CurrencyChanged,
}

/// Inputs owned by the user interface, read once at the start of each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSelection {
    pub currency: DisplayCurrency,
    pub watch_enabled: bool,
    pub watch_currency: String,
    pub target_text: String,
    pub direction: Direction,
}

impl Default for UserSelection {
    fn default() -> Self {
        Self {
            currency: DisplayCurrency::Usd,
            watch_enabled: false,
            watch_currency: String::new(),
            target_text: String::new(),
            direction: Direction::Increase,
        }
    }
}

impl UserSelection {
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::from_input(
            &self.watch_currency,
            &self.target_text,
            self.direction,
            self.watch_enabled,
        )
    }
}

pub type SharedSelection = Arc<Mutex<UserSelection>>;

#[derive(Debug, Serialize)]
pub struct MarketSnapshot {
    pub currency: DisplayCurrency,
    pub headers: [String; 6],
    pub stats: GlobalStats,
    pub summary: SummaryLines,
    pub table: CurrencyTable,
    pub fetched_at: DateTime<Local>,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Skipped,
    Completed { rows: usize, alert: Option<Alert> },
}

/// Holds the in-progress flag for the lifetime of one cycle.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn DisplaySink>,
    endpoints: Endpoints,
    selection: SharedSelection,
    in_progress: AtomicBool,
    cycle_started: watch::Sender<Instant>,
}

impl RefreshOrchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn DisplaySink>,
        endpoints: Endpoints,
        selection: SharedSelection,
    ) -> Self {
        let (cycle_started, _) = watch::channel(Instant::now());
        Self {
            fetcher,
            sink,
            endpoints,
            selection,
            in_progress: AtomicBool::new(false),
            cycle_started,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs one full cycle unless another is already in flight.
    pub async fn trigger_refresh(&self, trigger: Trigger) -> Result<RefreshOutcome, CoinWatchError> {
        let Some(_guard) = CycleGuard::try_acquire(&self.in_progress) else {
            debug!("Refresh ({:?}) dropped, a cycle is already running", trigger);
            return Ok(RefreshOutcome::Skipped);
        };

        self.cycle_started.send_replace(Instant::now());
        let selection = self.selection.lock().clone();
        info!("Refresh started ({:?}, {})", trigger, selection.currency);

        let snapshot = Arc::new(self.build_snapshot(selection.currency).await?);
        let rows = snapshot.table.len();
        self.sink.publish(Arc::clone(&snapshot));

        let alert = alerts::evaluate(&snapshot.table, &selection.watch_config());
        if let Some(alert) = &alert {
            warn!("ALERT: {} (price {})", alert.message, alert.price);
            self.sink.alert(alert);
        }

        info!("Refresh finished: {} currencies in {}", rows, selection.currency);
        Ok(RefreshOutcome::Completed { rows, alert })
    }

    async fn build_snapshot(&self, currency: DisplayCurrency) -> Result<MarketSnapshot, CoinWatchError> {
        let body = self.fetcher.fetch(&self.endpoints.global(currency)).await?;
        let stats = extract_global(&body, currency)?;

        let mut table = CurrencyTable::new();
        let mut paginator = Paginator::new(
            self.fetcher.as_ref(),
            &self.endpoints,
            currency,
            stats.pages_total(),
        );
        paginator.run(&mut table).await?;

        Ok(MarketSnapshot {
            currency,
            headers: column_headers(currency),
            summary: stats.summary(currency),
            stats,
            table,
            fetched_at: Local::now(),
        })
    }

    /// Runs a cycle on its own task; the outcome is only logged.
    pub fn spawn_refresh(self: &Arc<Self>, trigger: Trigger) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.trigger_refresh(trigger).await {
                Ok(_) => {}
                Err(e) => warn!("Refresh cycle aborted, keeping previous table: {}", e),
            }
        })
    }

    /// Refreshes at start-up, then on every `interval` tick and every received trigger.
    ///
    /// Each cycle start re-bases the next tick to one interval after it. Returns when
    /// the trigger channel closes.
    pub async fn run(self: Arc<Self>, interval: Duration, mut triggers: mpsc::Receiver<Trigger>) {
        let mut started = self.cycle_started.subscribe();
        let mut deadline = Instant::now() + interval;
        self.spawn_refresh(Trigger::Startup);

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    deadline += interval;
                    self.spawn_refresh(Trigger::Timer);
                }
                changed = started.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline = *started.borrow_and_update() + interval;
                }
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => {
                        self.spawn_refresh(trigger);
                    }
                    None => {
                        info!("Trigger channel closed, stopping scheduler");
                        break;
                    }
                },
            }
        }
    }
}
