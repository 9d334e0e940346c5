use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use price_sentinel::config::{self, AppConfig};
use price_sentinel::error::StoreError;
use price_sentinel::evaluator::Evaluator;
use price_sentinel::feed::PriceFeed;
use price_sentinel::feed::random_walk::RandomWalkFeed;
use price_sentinel::notifier::{Dispatcher, NotificationSink};
use price_sentinel::notifier::terminal::TerminalSink;
use price_sentinel::scheduler::Scheduler;
use price_sentinel::store::sqlite::SqliteStorage;
use price_sentinel::store::{AlertStore, Storage};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "price-sentinel", about = "Price alert monitoring engine")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    // ── Storage ───────────────────────────────────────────────────────────────
    let data_dir = &config.general.data_dir;
    std::fs::create_dir_all(data_dir)
        .change_context(AppError::Storage)
        .attach_with(|| format!("data_dir: {data_dir}"))?;

    let db_path = format!("{data_dir}/price-sentinel.db");
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::open(Path::new(&db_path))
            .await
            .change_context(AppError::Storage)?,
    );

    let store = Arc::new(
        AlertStore::open(storage)
            .await
            .change_context(AppError::Storage)?,
    );

    seed_alerts(&store, &config).await?;

    // ── Engine ────────────────────────────────────────────────────────────────
    let feed = RandomWalkFeed::new(config.feed.volatility, config.watch.start_price);
    feed.seed(&config.watch.symbol, config.watch.start_price)
        .await;

    let sink: Arc<dyn NotificationSink> = Arc::new(TerminalSink::new());
    let dispatcher = Arc::new(Dispatcher::new(sink));
    let evaluator = Arc::new(Evaluator::new(
        Arc::clone(&store),
        Arc::new(feed) as Arc<dyn PriceFeed>,
        dispatcher,
    ));
    let scheduler = Scheduler::new(evaluator);

    let interval = Duration::from_millis(config.watch.tick_interval_ms);
    scheduler.start(&config.watch.symbol, interval).await;

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("ctrl+c received, shutting down");
    if tokio::time::timeout(Duration::from_secs(5), scheduler.stop())
        .await
        .is_err()
    {
        tracing::warn!("watch task did not stop within 5s");
    }

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

/// Create configured alerts that are not already in the store. Matching is
/// on (symbol, target price, condition) so a restart does not duplicate
/// previously seeded rules.
async fn seed_alerts(store: &AlertStore, config: &AppConfig) -> Result<(), Report<AppError>> {
    let existing = store.list().await;

    for seed in &config.alerts {
        let duplicate = existing.iter().any(|a| {
            a.symbol == seed.symbol
                && a.target_price == seed.target_price
                && a.condition == seed.condition
        });
        if duplicate {
            continue;
        }

        match store
            .create(
                &seed.symbol,
                seed.target_price,
                seed.condition,
                seed.note.clone(),
            )
            .await
        {
            Ok(alert) => {
                if !seed.active {
                    store
                        .set_active(&alert.id, false)
                        .await
                        .change_context(AppError::Storage)?;
                }
                info!(
                    id = %alert.id,
                    symbol = %alert.symbol,
                    target = alert.target_price,
                    condition = %alert.condition,
                    "seeded alert from config"
                );
            }
            Err(e) if matches!(e.current_context(), StoreError::Persistence) => {
                tracing::warn!(error = ?e, "seeded alert kept in memory; durable write failed");
            }
            Err(e) => return Err(e.change_context(AppError::Config)),
        }
    }

    Ok(())
}
