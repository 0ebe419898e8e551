// # Matchgate Server
//
// Main entry point for the order-processing engine. Builds the runtime,
// waits for a shutdown signal, then drains and stops.

use matchgate::{EngineConfig, Result, Runtime, VERSION};
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    info!("Matchgate {VERSION} starting");

    let mut config = EngineConfig::default();
    if let Ok(data_dir) = std::env::var("MATCHGATE_DATA_DIR") {
        config.data_dir = data_dir;
    }
    if let Ok(url) = std::env::var("MATCHGATE_POSTGRES_URL") {
        config.postgres_url = Some(url);
    }
    if let Ok(workers) = std::env::var("MATCHGATE_WORKERS") {
        match workers.parse::<usize>() {
            Ok(count) if count > 0 => {
                config.event_workers = count;
                config.transaction_workers = count;
            }
            _ => error!(%workers, "ignoring invalid MATCHGATE_WORKERS"),
        }
    }

    info!(
        session_date = config.session_date,
        event_workers = config.event_workers,
        transaction_workers = config.transaction_workers,
        data_dir = %config.data_dir,
        mirror = config.postgres_url.is_some(),
        "configuration loaded"
    );

    let runtime = Runtime::start(config)?;
    info!("engine ready; press Ctrl-C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "signal wait failed; shutting down");
    }

    info!("shutdown requested; draining in-flight work");
    if !runtime.wait_until_idle(Duration::from_secs(30)) {
        error!("drain timed out; some transactions may be unexecuted");
    }
    let processing = runtime.processing_counters();
    info!(
        events = processing.events_ingested,
        executed = processing.transactions_executed,
        outputs = processing.outputs(),
        "processing counters at shutdown"
    );
    if let Some(counters) = runtime.persistence_counters() {
        info!(
            written = counters.written,
            errors = counters.errors,
            in_flight = counters.in_flight,
            "mirror counters at shutdown"
        );
    }
    runtime.shutdown();
    info!("shutdown complete");
    Ok(())
}
