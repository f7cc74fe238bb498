use clap::Parser;
use coinwatch::api::coinmarketcap::{Endpoints, Fetcher, HttpFetcher};
use coinwatch::config::{Cli, REFRESH_INTERVAL};
use coinwatch::market::refresh::{
    DisplaySink, RefreshOrchestrator, RefreshOutcome, SharedSelection, Trigger, UserSelection,
};
use coinwatch::ui::console::ConsoleSink;
use coinwatch::ui::dashboard::Dashboard;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use parking_lot::Mutex;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;

fn init_logger(cli: &Cli) -> Result<(), Box<dyn Error + Send + Sync>> {
    let crate_level = match (&cli.log_file, cli.is_headless(), cli.verbose) {
        // stderr would tear the dashboard
        (None, false, _) => LevelFilter::Off,
        (_, _, true) => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };

    let mut builder = Builder::new();
    builder
        .filter_level(crate_level.min(LevelFilter::Warn))
        .filter_module("coinwatch", crate_level)
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        });

    match &cli.log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .target(env_logger::Target::Pipe(Box::new(file)))
                .write_style(env_logger::WriteStyle::Never);
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }

    builder.init();
    Ok(())
}

fn initial_selection(cli: &Cli) -> SharedSelection {
    Arc::new(Mutex::new(UserSelection {
        currency: cli.currency,
        watch_enabled: cli.watch.is_some(),
        watch_currency: cli.watch.clone().unwrap_or_default(),
        target_text: cli.target.clone(),
        direction: cli.direction,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    init_logger(&cli)?;

    info!("Starting Coinwatch ({} via {})", cli.currency, cli.base_url);

    let selection = initial_selection(&cli);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(cli.request_timeout())?);
    let endpoints = Endpoints::new(&cli.base_url);

    if cli.is_headless() {
        let sink: Arc<dyn DisplaySink> = Arc::new(ConsoleSink::new(cli.json));
        let orchestrator = Arc::new(RefreshOrchestrator::new(fetcher, sink, endpoints, selection));

        if cli.once {
            if let RefreshOutcome::Completed { rows, .. } =
                orchestrator.trigger_refresh(Trigger::Startup).await?
            {
                info!("Single refresh done, {} currencies", rows);
            }
            return Ok(());
        }

        // keep the sender alive so the scheduler runs until Ctrl-C
        let (_trigger_tx, trigger_rx) = tokio::sync::mpsc::channel(8);
        tokio::select! {
            _ = orchestrator.run(REFRESH_INTERVAL, trigger_rx) => {},
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        };
    } else {
        let (trigger_tx, trigger_rx) = tokio::sync::mpsc::channel(8);
        let dashboard = Dashboard::new(Arc::clone(&selection), trigger_tx);
        let sink: Arc<dyn DisplaySink> = Arc::new(dashboard.clone());
        let orchestrator = Arc::new(RefreshOrchestrator::new(fetcher, sink, endpoints, selection));

        let scheduler = tokio::spawn(orchestrator.run(REFRESH_INTERVAL, trigger_rx));

        let ui = tokio::task::spawn_blocking(move || dashboard.run()).await?;
        scheduler.abort();
        if let Err(e) = ui {
            error!("Dashboard error: {}", e);
            return Err(e.into());
        }
    }

    info!("Shutdown complete");
    Ok(())
}
