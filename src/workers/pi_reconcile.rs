use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::services::payments::PreOrderCleaner;

/// Periodic reconciler for orphaned pre-order payment intents: intents that
/// were created during checkout but whose order never materialized (client
/// abandoned, process restarted). Each registered cleaner cancels its own
/// provider-side orphans older than the threshold.
pub struct PiReconcileWorker {
    cleaners: Vec<Arc<dyn PreOrderCleaner>>,
    interval: Duration,
    pre_order_threshold: chrono::Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PiReconcileWorker {
    pub fn new(
        cleaners: Vec<Arc<dyn PreOrderCleaner>>,
        interval: Duration,
        pre_order_threshold: chrono::Duration,
    ) -> Self {
        Self {
            cleaners,
            interval,
            pre_order_threshold,
            handle: Mutex::new(None),
        }
    }

    pub async fn start(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServiceError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Err(ServiceError::InvalidOperation(
                "payment-intent reconciler already started".to_string(),
            ));
        }

        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(
                interval = ?worker.interval,
                cleaners = worker.cleaners.len(),
                "payment-intent reconciler started"
            );
            let mut ticker = tokio::time::interval(worker.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => worker.tick().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("payment-intent reconciler stopping");
                            break;
                        }
                    }
                }
            }
        });
        *guard = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ServiceError> {
        let handle = self
            .handle
            .lock()
            .await
            .take()
            .ok_or_else(|| {
                ServiceError::InvalidOperation(
                    "payment-intent reconciler was never started".to_string(),
                )
            })?;
        handle.await.map_err(|e| {
            ServiceError::InternalError(format!("payment-intent reconciler panicked: {e}"))
        })
    }

    /// One pass over every cleaner. A failing cleaner is logged and the
    /// rest still run; the next tick retries it.
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let older_than = Utc::now() - self.pre_order_threshold;
        for cleaner in &self.cleaners {
            match cleaner.cleanup(older_than).await {
                Ok(0) => {}
                Ok(cancelled) => {
                    info!(cleaner = cleaner.name(), cancelled, "cancelled orphaned intents");
                }
                Err(err) => {
                    warn!(cleaner = cleaner.name(), err = %err, "pre-order cleanup failed");
                }
            }
        }
    }
}
