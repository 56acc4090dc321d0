use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lotto_sync::api::routes::router;
use lotto_sync::config::Config;
use lotto_sync::context::AppContext;
use lotto_sync::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        dataset = %cfg.dataset_url,
        cache = %cfg.dataset_cache_path.display(),
        interval_secs = cfg.sync_interval.as_secs(),
        min_update_hours = cfg.update_min_interval.as_secs() / 3_600,
        "Starting lotto-sync",
    );

    // --- Shared context ---
    let ctx = AppContext::build(cfg).await?;

    // Downstream consumers subscribe here; the service itself only logs.
    ctx.notifier.subscribe(|success| {
        if success {
            info!(event = "SYNC_UPDATE", success, "Draw data updated");
        } else {
            warn!(event = "SYNC_UPDATE", success, "Draw data update failed");
        }
        Ok(())
    });

    // --- Shutdown signal ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so the service keeps running.
                error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    });

    // --- Scheduler (background, every SYNC_INTERVAL_SECS) ---
    let scheduler = tokio::spawn(Arc::clone(&ctx.pipeline).run(shutdown_rx.clone()));

    // --- HTTP API server ---
    let app = router(Arc::clone(&ctx));
    let bind_addr = format!("0.0.0.0:{}", ctx.config.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let mut api_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = api_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    if let Err(e) = scheduler.await {
        warn!("Scheduler task ended abnormally: {e}");
    }
    info!("Shutdown complete");
    Ok(())
}
