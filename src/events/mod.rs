use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::status::OrderStatus;

/// Domain events emitted after a transaction commits. Delivery is
/// best-effort and in-process; a full send failure is logged, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: i32,
        order_uuid: Uuid,
    },
    OrderStatusChanged {
        order_id: i32,
        order_uuid: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentConfirmed {
        order_id: i32,
        order_uuid: Uuid,
        amount: rust_decimal::Decimal,
    },
    OrderCancelled {
        order_id: i32,
        order_uuid: Uuid,
    },
    OrderExpired {
        order_id: i32,
        order_uuid: Uuid,
    },
    PromoApplied {
        order_id: i32,
        promo_id: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(err = %e, "failed to send domain event");
        }
    }
}

/// Creates the event channel and spawns the logging consumer. Subscriber
/// surfaces (mailing, analytics) attach here in the full application and
/// receive the same JSON payload the consumer logs.
pub fn spawn_event_processor(buffer: usize) -> (EventSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(buffer);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => match &event {
                    Event::OrderStatusChanged {
                        order_id,
                        order_uuid,
                        from,
                        to,
                    } => {
                        info!(order_id, %order_uuid, %from, %to, %payload, "order status changed");
                    }
                    _ => info!(%payload, "domain event"),
                },
                Err(e) => warn!(err = %e, event = ?event, "failed to serialize domain event"),
            }
        }
    });
    (EventSender::new(tx), handle)
}
