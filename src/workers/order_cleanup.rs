use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::services::orders::OrderService;

/// Periodic reconciler for orders that left the happy path:
/// `AwaitingPayment` orders past their deadline are expired, and orders
/// stuck in `Placed` beyond the threshold are cancelled. Both release the
/// stock reservation.
pub struct StuckOrderWorker {
    orders: OrderService,
    interval: Duration,
    placed_threshold: chrono::Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StuckOrderWorker {
    pub fn new(
        orders: OrderService,
        interval: Duration,
        placed_threshold: chrono::Duration,
    ) -> Self {
        Self {
            orders,
            interval,
            placed_threshold,
            handle: Mutex::new(None),
        }
    }

    /// Starts the periodic task. Starting an already-running worker is an
    /// error.
    pub async fn start(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServiceError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Err(ServiceError::InvalidOperation(
                "stuck-order worker already started".to_string(),
            ));
        }

        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(interval = ?worker.interval, "stuck-order worker started");
            let mut ticker = tokio::time::interval(worker.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => worker.tick().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("stuck-order worker stopping");
                            break;
                        }
                    }
                }
            }
        });
        *guard = Some(handle);
        Ok(())
    }

    /// Waits for the task to finish. The shutdown signal must be flipped
    /// first; stopping a worker that was never started is an error.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let handle = self
            .handle
            .lock()
            .await
            .take()
            .ok_or_else(|| {
                ServiceError::InvalidOperation("stuck-order worker was never started".to_string())
            })?;
        handle
            .await
            .map_err(|e| ServiceError::InternalError(format!("stuck-order worker panicked: {e}")))
    }

    /// One reconciliation pass. Each order moves in its own transaction; a
    /// failure on one order is logged and the pass continues.
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let now = Utc::now();

        match self.orders.find_awaiting_expired(now).await {
            Ok(found) => {
                for (order_id, order_uuid) in found {
                    if let Err(err) = self.orders.expire(order_uuid).await {
                        warn!(order_id, %order_uuid, err = %err, "failed to expire order");
                    }
                }
            }
            Err(err) => error!(err = %err, "failed to list payment-expired orders"),
        }

        let stuck_before = now - self.placed_threshold;
        match self.orders.find_stuck_placed(stuck_before).await {
            Ok(found) => {
                for (order_id, order_uuid) in found {
                    if let Err(err) = self.orders.cancel(order_uuid).await {
                        warn!(order_id, %order_uuid, err = %err, "failed to cancel stuck order");
                    }
                }
            }
            Err(err) => error!(err = %err, "failed to list stuck orders"),
        }
    }
}
