use std::sync::Arc;

use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use atelier_api as api;
use api::services::payments::OfflinePaymentProvider;
use api::workers::{PiReconcileWorker, StuckOrderWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let db_config = api::db::DbConfig::from(&cfg);
    let db = Arc::new(
        api::db::establish_connection(&db_config)
            .await
            .context("failed to connect to the database")?,
    );
    if cfg.auto_migrate {
        api::migrator::Migrator::up(db.as_ref(), None)
            .await
            .map_err(|e| {
                error!(err = %e, "failed running migrations");
                e
            })?;
    }

    let cache = Arc::new(
        api::cache::DictionaryCache::load(Arc::clone(&db), cfg.base_currency.clone()).await?,
    );

    let (event_sender, event_task) = api::events::spawn_event_processor(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = api::AppState::build(
        Arc::clone(&db),
        cfg.clone(),
        cache,
        event_sender,
        Arc::new(OfflinePaymentProvider),
        shutdown_rx.clone(),
    );

    let sweeper_handle = state
        .pi_sessions
        .spawn_sweeper(cfg.pi_sweep_interval(), shutdown_rx.clone());

    let order_worker = Arc::new(StuckOrderWorker::new(
        state.orders.clone(),
        cfg.order_cleanup_interval(),
        cfg.placed_threshold(),
    ));
    order_worker.start(shutdown_rx.clone()).await?;

    // No provider-side cleaners in the offline configuration; the worker
    // still runs so wiring one in is a registration, not a code change.
    let pi_worker = Arc::new(PiReconcileWorker::new(
        Vec::new(),
        cfg.pi_reconcile_interval(),
        cfg.pre_order_threshold(),
    ));
    pi_worker.start(shutdown_rx).await?;

    info!("atelier order core running; press ctrl-c to stop");
    shutdown_signal().await;

    info!("shutting down");
    shutdown_tx.send(true)?;
    order_worker.stop().await?;
    pi_worker.stop().await?;
    let _ = sweeper_handle.await;

    // Dropping the last event sender lets the consumer drain and exit.
    drop(order_worker);
    drop(pi_worker);
    drop(state);
    let _ = event_task.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(err = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(err = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
