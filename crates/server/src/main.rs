//! civic-desk entry point.
//!
//! Loads the store, runs the background tasks until a shutdown signal
//! arrives, then saves every collection.

use std::sync::Arc;
use std::time::Duration;

use civic_common::Config;
use civic_core::{
    DashboardRefresher, DashboardService, EscalationPolicy, EscalationService, StoreFlushTask,
    TaskHandle, spawn_periodic,
};
use civic_db::SharedStore;
use civic_db::repositories::ReportRepository;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between retries of failed store writes.
const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn spawn_background_tasks(config: &Config, store: &SharedStore) -> Vec<TaskHandle> {
    let mut tasks = Vec::new();

    if config.escalation.enabled {
        let escalation = EscalationService::new(
            Arc::clone(store),
            EscalationPolicy::from_config(&config.escalation),
        );
        tasks.push(spawn_periodic(
            Arc::new(escalation),
            config.escalation.initial_delay(),
            config.escalation.sweep_interval(),
        ));
    } else {
        info!("Escalation sweep disabled");
    }

    let dashboard = DashboardService::new(
        Arc::clone(store),
        config.dashboard.clone(),
        config.escalation.auto_escalate_days,
    );
    let refresh = config.dashboard.refresh_interval();
    tasks.push(spawn_periodic(
        Arc::new(DashboardRefresher::new(dashboard)),
        Duration::ZERO,
        refresh,
    ));

    tasks.push(spawn_periodic(
        Arc::new(StoreFlushTask::new(Arc::clone(store))),
        FLUSH_INTERVAL,
        FLUSH_INTERVAL,
    ));

    tasks
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "civic_desk=info,civic_core=info,civic_db=info".into()),
        )
        .init();

    info!("Starting civic-desk...");

    let config = Config::load()?;
    let store = civic_db::init(&config)?;
    {
        let store = store.lock().await;
        let stats = store.reports_stats(store.now());
        info!(
            data_dir = %config.storage.data_dir.display(),
            reports = stats.total,
            needs_escalation = stats.needs_escalation,
            "Store ready"
        );
    }

    let tasks = spawn_background_tasks(&config, &store);
    info!(tasks = tasks.len(), "Background tasks started");

    shutdown_signal().await;

    for task in &tasks {
        task.cancel();
    }
    for task in tasks {
        task.join().await;
    }

    let mut store = store.lock().await;
    if let Some(e) = store.take_persist_error() {
        warn!(error = %e, "Store write failed before shutdown");
    }
    store.save_all()?;

    info!("Shutdown complete");
    Ok(())
}
