use std::sync::Arc;

use backend::{
    auction::service::AuctionService,
    clock::SystemClock,
    config::AppConfig,
    db::Db,
    events::bus::EventBus,
    finalizer::RosterMaterializer,
    locks::LockManager,
    monitor::DeadlineMonitor,
};

/// Initializes the database, runs migrations and reports any deadlines that
/// expired while the process was down; the first monitor scan settles them
/// through the normal path.
async fn init_db(cfg: &AppConfig) -> anyhow::Result<Db> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let stale: i64 = sqlx::query_scalar(
        r#"
SELECT COUNT(*)
FROM auction_lots
WHERE status = 'active' AND bid_deadline_ms IS NOT NULL AND bid_deadline_ms <= ?;
"#,
    )
    .bind(now)
    .fetch_one(&*db.pool)
    .await?;

    if stale > 0 {
        tracing::info!(lots = stale, "expired lots found at startup; monitor will settle them");
    }

    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    common::logger::init_logger("auction-backend");

    tracing::info!("Starting fast auction backend...");

    let cfg = AppConfig::from_env();
    let db = init_db(&cfg).await?;

    let bus = Arc::new(EventBus::new().with_panic_hook(|kind| {
        tracing::error!(kind = ?kind, "event handler panicked");
    }));

    // The transport layer subscribes its websocket fan-out here; the default
    // process just logs domain events.
    bus.subscribe_all(Arc::new(|event| {
        tracing::debug!(event = ?event, "auction event");
    }));

    let service = Arc::new(AuctionService::new(
        (*db.pool).clone(),
        Arc::new(LockManager::new()),
        Arc::new(SystemClock),
        bus,
        Arc::new(RosterMaterializer),
    ));

    let monitor = Arc::new(DeadlineMonitor::new(Arc::clone(&service), &cfg));
    let monitor_handle = monitor.spawn();

    tracing::info!("Backend started; waiting for shutdown signal");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    monitor_handle.abort();

    Ok(())
}
