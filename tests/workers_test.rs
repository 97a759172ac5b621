mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use tokio::sync::watch;

use atelier_api::errors::ServiceError;
use atelier_api::services::payments::PreOrderCleaner;
use atelier_api::services::status::OrderStatus;
use atelier_api::workers::{PiReconcileWorker, StuckOrderWorker};
use common::{place_request, TestApp};

fn order_worker(app: &TestApp) -> Arc<StuckOrderWorker> {
    Arc::new(StuckOrderWorker::new(
        app.state.orders.clone(),
        Duration::from_secs(900),
        ChronoDuration::days(1),
    ))
}

#[tokio::test]
async fn tick_expires_orders_past_their_payment_deadline() {
    let app = TestApp::new().await;

    let order_uuid = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 2)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;
    app.state
        .orders
        .begin_payment(order_uuid, "pi_1".into())
        .await
        .unwrap();
    assert_eq!(app.stock_of(1, 1).await, 3);

    // Push the deadline into the past and reconcile.
    app.force_expires_at(order_uuid, ChronoDuration::minutes(5)).await;
    order_worker(&app).tick().await;

    assert_eq!(app.order_status(order_uuid).await, OrderStatus::Expired);
    assert_eq!(app.stock_of(1, 1).await, 5);
    assert_eq!(
        app.history_of(order_uuid).await,
        vec!["Placed", "AwaitingPayment", "Expired"]
    );
}

#[tokio::test]
async fn expired_lookup_reports_both_order_identifiers() {
    let app = TestApp::new().await;

    let details = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 1)], "EUR", None))
        .await
        .unwrap();
    app.state
        .orders
        .begin_payment(details.order.uuid, "pi_1".into())
        .await
        .unwrap();
    app.force_expires_at(details.order.uuid, ChronoDuration::minutes(5))
        .await;

    // The worker logs both keys per failed order, so the lookup carries
    // the internal id alongside the public uuid.
    let found = app
        .state
        .orders
        .find_awaiting_expired(Utc::now())
        .await
        .expect("lookup succeeds");
    assert_eq!(found, vec![(details.order.id, details.order.uuid)]);
}

#[tokio::test]
async fn tick_cancels_orders_stuck_in_placed() {
    let app = TestApp::new().await;

    let stuck = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 1)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;
    let fresh = app
        .state
        .orders
        .place_order(place_request(&[(2, 1, 1)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;

    app.force_placed_at(stuck, ChronoDuration::days(2)).await;
    order_worker(&app).tick().await;

    assert_eq!(app.order_status(stuck).await, OrderStatus::Cancelled);
    assert_eq!(app.order_status(fresh).await, OrderStatus::Placed);
    assert_eq!(app.stock_of(1, 1).await, 5);
    assert_eq!(app.stock_of(2, 1).await, 2);
}

#[tokio::test]
async fn tick_leaves_paid_orders_alone() {
    let app = TestApp::new().await;

    let order_uuid = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 1)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;
    app.state
        .orders
        .begin_payment(order_uuid, "pi_1".into())
        .await
        .unwrap();
    app.state
        .orders
        .confirm_payment(order_uuid, common::confirm_request(dec!(100.00), "EUR"))
        .await
        .unwrap();

    order_worker(&app).tick().await;
    assert_eq!(app.order_status(order_uuid).await, OrderStatus::Confirmed);
}

#[tokio::test]
async fn worker_lifecycle_rejects_double_start_and_orphan_stop() {
    let app = TestApp::new().await;
    let worker = order_worker(&app);
    let (tx, rx) = watch::channel(false);

    assert_matches!(
        worker.stop().await,
        Err(ServiceError::InvalidOperation(_)),
        "stop before start must fail"
    );

    worker.start(rx.clone()).await.expect("first start succeeds");
    assert_matches!(
        worker.start(rx).await,
        Err(ServiceError::InvalidOperation(_)),
        "second start must fail"
    );

    tx.send(true).expect("signal shutdown");
    worker.stop().await.expect("stop after shutdown succeeds");
}

struct RecordingCleaner {
    calls: AtomicU32,
    fail: bool,
}

#[async_trait]
impl PreOrderCleaner for RecordingCleaner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn cleanup(&self, _older_than: DateTime<Utc>) -> Result<u64, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ServiceError::TransientExternal(
                "provider unavailable".to_string(),
            ))
        } else {
            Ok(2)
        }
    }
}

#[tokio::test]
async fn reconciler_runs_every_cleaner_even_when_one_fails() {
    let failing = Arc::new(RecordingCleaner {
        calls: AtomicU32::new(0),
        fail: true,
    });
    let healthy = Arc::new(RecordingCleaner {
        calls: AtomicU32::new(0),
        fail: false,
    });

    let cleaners: Vec<Arc<dyn PreOrderCleaner>> = vec![failing.clone(), healthy.clone()];
    let worker = PiReconcileWorker::new(
        cleaners,
        Duration::from_secs(900),
        ChronoDuration::hours(24),
    );
    worker.tick().await;

    assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reconciler_stops_on_shutdown_signal() {
    let worker = Arc::new(PiReconcileWorker::new(
        Vec::new(),
        Duration::from_millis(10),
        ChronoDuration::hours(24),
    ));
    let (tx, rx) = watch::channel(false);
    worker.start(rx).await.expect("start succeeds");
    tx.send(true).expect("signal shutdown");
    tokio::time::timeout(Duration::from_secs(1), worker.stop())
        .await
        .expect("worker should stop promptly")
        .expect("stop should succeed");
}
