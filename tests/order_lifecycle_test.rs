mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use atelier_api::errors::ServiceError;
use atelier_api::services::status::OrderStatus;
use common::{confirm_request, place_request, TestApp};

#[tokio::test]
async fn full_happy_path_from_placement_to_delivery() {
    let app = TestApp::new().await;

    let details = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 1)], "EUR", None))
        .await
        .expect("placement should succeed");
    let order_uuid = details.order.uuid;

    // 90.00 item + 10.00 shipping.
    assert_eq!(details.order.total_price, dec!(100.00));
    assert_eq!(details.order.currency, "EUR");
    assert_eq!(details.order.status, "Placed");
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].unit_base_price, dec!(90.00));
    assert_eq!(app.stock_of(1, 1).await, 4);

    let awaiting = app
        .state
        .orders
        .begin_payment(order_uuid, "pi_live_1".into())
        .await
        .expect("begin_payment should succeed");
    assert_eq!(awaiting.status, "AwaitingPayment");
    assert!(awaiting.expires_at.is_some());

    let confirmed = app
        .state
        .orders
        .confirm_payment(order_uuid, confirm_request(dec!(100.00), "EUR"))
        .await
        .expect("confirmation should succeed");
    assert_eq!(confirmed.status, "Confirmed");
    assert!(confirmed.expires_at.is_none());

    let shipped = app
        .state
        .orders
        .mark_shipped(order_uuid, Some("TRK123".into()))
        .await
        .expect("shipping should succeed");
    assert_eq!(shipped.status, "Shipped");

    let delivered = app
        .state
        .orders
        .mark_delivered(order_uuid)
        .await
        .expect("delivery should succeed");
    assert_eq!(delivered.status, "Delivered");

    assert_eq!(
        app.history_of(order_uuid).await,
        vec!["Placed", "AwaitingPayment", "Confirmed", "Shipped", "Delivered"]
    );
}

#[tokio::test]
async fn underpayment_is_rejected_without_side_effects() {
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

    let err = app
        .state
        .orders
        .confirm_payment(order_uuid, confirm_request(dec!(99.99), "EUR"))
        .await
        .expect_err("one cent short must be rejected");
    assert_matches!(
        err,
        ServiceError::AmountBelowTotal { expected, received }
            if expected == dec!(100.00) && received == dec!(99.99)
    );
    assert_eq!(app.order_status(order_uuid).await, OrderStatus::AwaitingPayment);

    // A correct retry still goes through.
    app.state
        .orders
        .confirm_payment(order_uuid, confirm_request(dec!(100.00), "EUR"))
        .await
        .expect("exact amount should confirm");
    assert_eq!(app.order_status(order_uuid).await, OrderStatus::Confirmed);
}

#[tokio::test]
async fn overpayment_is_accepted() {
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

    let confirmed = app
        .state
        .orders
        .confirm_payment(order_uuid, confirm_request(dec!(120.00), "EUR"))
        .await
        .expect("overpayment should confirm");
    assert_eq!(confirmed.status, "Confirmed");
    // The recorded total stays the authoritative one, not the amount paid.
    assert_eq!(confirmed.total_price, dec!(100.00));
}

#[tokio::test]
async fn currency_mismatch_fails_the_payment() {
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

    let err = app
        .state
        .orders
        .confirm_payment(order_uuid, confirm_request(dec!(110.00), "USD"))
        .await
        .expect_err("USD payment against an EUR order must fail");
    assert_matches!(err, ServiceError::PaymentFailed(_));
    assert_eq!(app.order_status(order_uuid).await, OrderStatus::AwaitingPayment);
}

#[tokio::test]
async fn redelivered_confirmation_is_idempotent() {
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

    let request = confirm_request(dec!(100.00), "EUR");
    app.state
        .orders
        .confirm_payment(order_uuid, request.clone())
        .await
        .expect("first delivery confirms");
    let second = app
        .state
        .orders
        .confirm_payment(order_uuid, request)
        .await
        .expect("same intent re-delivered is a no-op");
    assert_eq!(second.status, "Confirmed");

    // Exactly one Confirmed entry in the history.
    let confirmed_entries = app
        .history_of(order_uuid)
        .await
        .into_iter()
        .filter(|s| s == "Confirmed")
        .count();
    assert_eq!(confirmed_entries, 1);
}

#[tokio::test]
async fn late_redelivery_after_shipping_is_still_idempotent() {
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

    let request = confirm_request(dec!(100.00), "EUR");
    app.state
        .orders
        .confirm_payment(order_uuid, request.clone())
        .await
        .expect("first delivery confirms");
    app.state
        .orders
        .mark_shipped(order_uuid, Some("TRK999".into()))
        .await
        .unwrap();

    // Providers re-deliver on their own schedule; a repeat of the settled
    // intent must not disturb an order that has since moved on.
    let replayed = app
        .state
        .orders
        .confirm_payment(order_uuid, request)
        .await
        .expect("settled intent re-delivered is a no-op");
    assert_eq!(replayed.status, "Shipped");
    assert_eq!(app.order_status(order_uuid).await, OrderStatus::Shipped);

    let confirmed_entries = app
        .history_of(order_uuid)
        .await
        .into_iter()
        .filter(|s| s == "Confirmed")
        .count();
    assert_eq!(confirmed_entries, 1);
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let app = TestApp::new().await;

    let order_uuid = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 1)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;

    // Cannot deliver or refund an order that was only placed.
    assert_matches!(
        app.state.orders.mark_delivered(order_uuid).await,
        Err(ServiceError::InvalidTransition { .. })
    );
    assert_matches!(
        app.state.orders.refund(order_uuid).await,
        Err(ServiceError::InvalidTransition { .. })
    );

    // Once confirmed, cancellation is no longer possible.
    app.state
        .orders
        .begin_payment(order_uuid, "pi_1".into())
        .await
        .unwrap();
    app.state
        .orders
        .confirm_payment(order_uuid, confirm_request(dec!(100.00), "EUR"))
        .await
        .unwrap();
    assert_matches!(
        app.state.orders.cancel(order_uuid).await,
        Err(ServiceError::InvalidTransition { .. })
    );
}

#[tokio::test]
async fn refund_is_full_and_terminal() {
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
        .confirm_payment(order_uuid, confirm_request(dec!(100.00), "EUR"))
        .await
        .unwrap();

    let refunded = app
        .state
        .orders
        .refund(order_uuid)
        .await
        .expect("refund of a confirmed order should succeed");
    assert_eq!(refunded.status, "Refunded");
    assert_eq!(refunded.refunded_amount, refunded.total_price);

    // Terminal: nothing moves an order out of Refunded.
    assert_matches!(
        app.state.orders.mark_shipped(order_uuid, None).await,
        Err(ServiceError::InvalidTransition { .. })
    );
    assert_matches!(
        app.state.orders.cancel(order_uuid).await,
        Err(ServiceError::InvalidTransition { .. })
    );
    assert_matches!(
        app.state.orders.refund(order_uuid).await,
        Err(ServiceError::InvalidTransition { .. })
    );
}

#[tokio::test]
async fn cancelling_releases_stock() {
    let app = TestApp::new().await;

    let order_uuid = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 2)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;
    assert_eq!(app.stock_of(1, 1).await, 3);

    let cancelled = app
        .state
        .orders
        .cancel(order_uuid)
        .await
        .expect("cancelling a placed order should succeed");
    assert_eq!(cancelled.status, "Cancelled");
    assert_eq!(app.stock_of(1, 1).await, 5);
    assert_eq!(app.history_of(order_uuid).await, vec!["Placed", "Cancelled"]);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state.orders.get_order(Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state.orders.cancel(Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn listing_filters_by_status_and_paginates() {
    let app = TestApp::new().await;

    let first = app
        .state
        .orders
        .place_order(place_request(&[(1, 1, 1)], "EUR", None))
        .await
        .unwrap()
        .order
        .uuid;
    app.state
        .orders
        .place_order(place_request(&[(2, 1, 1)], "EUR", None))
        .await
        .unwrap();
    app.state.orders.cancel(first).await.unwrap();

    let placed = app
        .state
        .orders
        .list_orders(Some(OrderStatus::Placed), 1, 10)
        .await
        .unwrap();
    assert_eq!(placed.total, 1);
    assert_eq!(placed.orders.len(), 1);

    let all = app.state.orders.list_orders(None, 1, 1).await.unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.orders.len(), 1);
}
