use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::cache::DictionaryCache;
use crate::db::TxRunner;
use crate::entities::{
    address, buyer, order, order_item, order_status_history, payment, promo_code, shipment,
};
use crate::entities::order::Entity as OrderEntity;
use crate::entities::order_item::Entity as OrderItemEntity;
use crate::entities::order_status_history::Entity as HistoryEntity;
use crate::errors::{classify_db_err, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::pricing::{CapturedItem, PricingService};
use crate::services::promos::{PromoModifier, PromoService};
use crate::services::status::OrderStatus;
use crate::services::stock::{StockLine, StockService};

/// One line of an incoming cart.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CartItem {
    pub product_id: i32,
    pub size_id: i32,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BuyerDetails {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(email(message = "email must be well-formed"))]
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub receive_promo_emails: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressDetails {
    pub street: String,
    pub house_number: String,
    pub apartment_number: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<CartItem>,
    #[validate]
    pub buyer: BuyerDetails,
    pub billing_address: AddressDetails,
    pub shipping_address: AddressDetails,
    #[validate(length(min = 3, max = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,
    pub carrier_id: i32,
    pub payment_method: String,
    pub promo_code: Option<String>,
}

/// Payment data delivered by the provider webhook / confirmation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub provider_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payer: Option<String>,
    pub payee: Option<String>,
}

/// Order aggregate as read back for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub history: Vec<order_status_history::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// The order state machine and its surrounding lifecycle operations.
///
/// Every mutating operation runs as a single serializable transaction via
/// `TxRunner`; the status column and its history row always move together,
/// so an order can never disagree with its own history.
#[derive(Clone)]
pub struct OrderService {
    tx: TxRunner,
    cache: Arc<DictionaryCache>,
    pricing: PricingService,
    promos: PromoService,
    stock: StockService,
    events: EventSender,
    awaiting_payment_ttl: chrono::Duration,
}

impl OrderService {
    pub fn new(
        tx: TxRunner,
        cache: Arc<DictionaryCache>,
        pricing: PricingService,
        promos: PromoService,
        stock: StockService,
        events: EventSender,
        awaiting_payment_ttl: chrono::Duration,
    ) -> Self {
        Self {
            tx,
            cache,
            pricing,
            promos,
            stock,
            events,
            awaiting_payment_ttl,
        }
    }

    /// Places a new order: reserves stock, captures item economics, prices
    /// the cart, and writes the whole aggregate in `Placed`.
    #[instrument(skip(self, request), fields(currency = %request.currency, carrier_id = request.carrier_id))]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let carrier = self
            .cache
            .carrier_by_id(request.carrier_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown carrier {}", request.carrier_id))
            })?;
        if !carrier.allowed {
            return Err(ServiceError::ValidationError(format!(
                "carrier {} is not available",
                carrier.name
            )));
        }

        let method_allowed = self
            .cache
            .payment_methods()
            .iter()
            .any(|m| m.name == request.payment_method && m.allowed);
        if !method_allowed {
            return Err(ServiceError::ValidationError(format!(
                "payment method {} is not available",
                request.payment_method
            )));
        }

        let order_uuid = Uuid::new_v4();

        let (order_model, items) = self
            .tx
            .within_tx(|txn, now| {
                // Clone per attempt so the future owns everything but `txn`.
                let svc = self.clone();
                let req = request.clone();
                Box::pin(async move {
                    let promo = match &req.promo_code {
                        Some(code) => Some(svc.promos.resolve(code, now)?),
                        None => None,
                    };

                    let lines: Vec<StockLine> = req
                        .items
                        .iter()
                        .map(|i| StockLine {
                            product_id: i.product_id,
                            size_id: i.size_id,
                            quantity: i.quantity,
                        })
                        .collect();
                    svc.stock.reserve(txn, &lines).await?;

                    let captured = svc
                        .capture_items(txn, &req.items, &req.currency)
                        .await?;

                    let total = svc
                        .pricing
                        .order_total(&captured, req.carrier_id, &req.currency, promo.as_ref())
                        .await?;

                    let billing = insert_address(txn, &req.billing_address).await?;
                    let shipping = insert_address(txn, &req.shipping_address).await?;

                    let buyer_row = buyer::ActiveModel {
                        first_name: Set(req.buyer.first_name.clone()),
                        last_name: Set(req.buyer.last_name.clone()),
                        email: Set(req.buyer.email.clone()),
                        phone: Set(req.buyer.phone.clone()),
                        billing_address_id: Set(billing.id),
                        shipping_address_id: Set(shipping.id),
                        receive_promo_emails: Set(req.buyer.receive_promo_emails),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(classify_db_err)?;

                    let payment_row = payment::ActiveModel {
                        method: Set(req.payment_method.clone()),
                        currency: Set(req.currency.clone()),
                        provider_intent_id: Set(None),
                        transaction_amount: Set(None),
                        payer: Set(None),
                        payee: Set(None),
                        done: Set(false),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(classify_db_err)?;

                    let shipment_row = shipment::ActiveModel {
                        carrier_id: Set(req.carrier_id),
                        tracking_code: Set(None),
                        shipping_date: Set(None),
                        estimated_arrival_date: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(classify_db_err)?;

                    let order_model = order::ActiveModel {
                        uuid: Set(order_uuid),
                        placed_at: Set(now),
                        status: Set(OrderStatus::Placed.to_string()),
                        total_price: Set(total),
                        currency: Set(req.currency.clone()),
                        refunded_amount: Set(Decimal::ZERO),
                        promo_id: Set(promo.map(|p| p.promo_id)),
                        payment_id: Set(payment_row.id),
                        shipment_id: Set(shipment_row.id),
                        buyer_id: Set(buyer_row.id),
                        expires_at: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(classify_db_err)?;

                    let mut items = Vec::with_capacity(captured.len());
                    for (cart, econ) in req.items.iter().zip(captured.iter()) {
                        let item = order_item::ActiveModel {
                            order_id: Set(order_model.id),
                            product_id: Set(cart.product_id),
                            size_id: Set(cart.size_id),
                            quantity: Set(cart.quantity),
                            unit_base_price: Set(econ.unit_base_price),
                            sale_percentage: Set(econ.sale_percentage),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(classify_db_err)?;
                        items.push(item);
                    }

                    append_history(txn, order_model.id, OrderStatus::Placed, now).await?;

                    Ok((order_model, items))
                })
            })
            .await?;

        info!(order_id = order_model.id, %order_uuid, total = %order_model.total_price, "order placed");
        self.events
            .send(Event::OrderPlaced {
                order_id: order_model.id,
                order_uuid,
            })
            .await;

        let history = self.load_history(order_model.id).await?;
        Ok(OrderDetails {
            order: order_model,
            items,
            history,
        })
    }

    /// `Placed -> AwaitingPayment`: stamps the payment deadline and records
    /// the provider intent on the payment row.
    #[instrument(skip(self), fields(%order_uuid))]
    pub async fn begin_payment(
        &self,
        order_uuid: Uuid,
        provider_intent_id: String,
    ) -> Result<order::Model, ServiceError> {
        let ttl = self.awaiting_payment_ttl;

        let (updated, from) = self
            .tx
            .within_tx(|txn, now| {
                let intent = provider_intent_id.clone();
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let from = OrderStatus::parse(&order_model.status)?;
                    from.ensure_transition(OrderStatus::AwaitingPayment)?;

                    let payment_row = load_payment(txn, order_model.payment_id).await?;
                    let mut payment_active: payment::ActiveModel = payment_row.into();
                    payment_active.provider_intent_id = Set(Some(intent));
                    payment_active
                        .update(txn)
                        .await
                        .map_err(classify_db_err)?;

                    let mut order_active: order::ActiveModel = order_model.into();
                    order_active.status = Set(OrderStatus::AwaitingPayment.to_string());
                    order_active.expires_at = Set(Some(now + ttl));
                    let updated = order_active.update(txn).await.map_err(classify_db_err)?;

                    append_history(txn, updated.id, OrderStatus::AwaitingPayment, now).await?;
                    Ok((updated, from))
                })
            })
            .await?;

        self.emit_status_change(&updated, from, OrderStatus::AwaitingPayment)
            .await;
        Ok(updated)
    }

    /// Confirms payment after recomputing the authoritative total.
    ///
    /// Idempotent on provider re-delivery: once the payment is settled, a
    /// repeat call carrying the same intent id is a no-op no matter how far
    /// the order has moved since (shipped, delivered, refunded).
    #[instrument(skip(self, data), fields(%order_uuid, amount = %data.amount))]
    pub async fn confirm_payment(
        &self,
        order_uuid: Uuid,
        data: ConfirmPaymentRequest,
    ) -> Result<order::Model, ServiceError> {
        let (updated, newly_confirmed) = self
            .tx
            .within_tx(|txn, now| {
                let pricing = self.pricing.clone();
                let req = data.clone();
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let status = OrderStatus::parse(&order_model.status)?;
                    let payment_row = load_payment(txn, order_model.payment_id).await?;

                    if payment_row.done
                        && payment_row.provider_intent_id.as_deref()
                            == Some(req.provider_intent_id.as_str())
                    {
                        return Ok((order_model, false));
                    }

                    status.ensure_transition(OrderStatus::Confirmed)?;

                    if req.currency != order_model.currency {
                        return Err(ServiceError::PaymentFailed(format!(
                            "payment currency {} does not match order currency {}",
                            req.currency, order_model.currency
                        )));
                    }

                    let items = load_items(txn, order_model.id).await?;
                    let promo =
                        load_promo_modifier(txn, order_model.promo_id).await?;
                    let total = pricing
                        .order_total(
                            &items_to_captured(&items),
                            carrier_of(txn, &order_model).await?,
                            &order_model.currency,
                            promo.as_ref(),
                        )
                        .await?;

                    if req.amount < total {
                        return Err(ServiceError::AmountBelowTotal {
                            expected: total,
                            received: req.amount,
                        });
                    }

                    let mut payment_active: payment::ActiveModel = payment_row.into();
                    payment_active.provider_intent_id =
                        Set(Some(req.provider_intent_id.clone()));
                    payment_active.transaction_amount = Set(Some(req.amount));
                    payment_active.payer = Set(req.payer.clone());
                    payment_active.payee = Set(req.payee.clone());
                    payment_active.done = Set(true);
                    payment_active
                        .update(txn)
                        .await
                        .map_err(classify_db_err)?;

                    let mut order_active: order::ActiveModel = order_model.into();
                    order_active.status = Set(OrderStatus::Confirmed.to_string());
                    order_active.total_price = Set(total);
                    order_active.expires_at = Set(None);
                    let updated = order_active.update(txn).await.map_err(classify_db_err)?;

                    append_history(txn, updated.id, OrderStatus::Confirmed, now).await?;
                    Ok((updated, true))
                })
            })
            .await?;

        if newly_confirmed {
            info!(order_id = updated.id, %order_uuid, "payment confirmed");
            self.events
                .send(Event::PaymentConfirmed {
                    order_id: updated.id,
                    order_uuid,
                    amount: data.amount,
                })
                .await;
        }
        Ok(updated)
    }

    /// `Confirmed -> Shipped`, stamping the shipment.
    #[instrument(skip(self), fields(%order_uuid))]
    pub async fn mark_shipped(
        &self,
        order_uuid: Uuid,
        tracking_code: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let (updated, from) = self
            .tx
            .within_tx(|txn, now| {
                let tracking = tracking_code.clone();
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let from = OrderStatus::parse(&order_model.status)?;
                    from.ensure_transition(OrderStatus::Shipped)?;

                    let shipment_row = shipment::Entity::find_by_id(order_model.shipment_id)
                        .one(txn)
                        .await
                        .map_err(classify_db_err)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "shipment {} not found",
                                order_model.shipment_id
                            ))
                        })?;
                    let mut shipment_active: shipment::ActiveModel = shipment_row.into();
                    if let Some(code) = tracking {
                        shipment_active.tracking_code = Set(Some(code));
                    }
                    shipment_active.shipping_date = Set(Some(now));
                    shipment_active
                        .update(txn)
                        .await
                        .map_err(classify_db_err)?;

                    let updated =
                        set_status(txn, order_model, OrderStatus::Shipped, now).await?;
                    Ok((updated, from))
                })
            })
            .await?;

        self.emit_status_change(&updated, from, OrderStatus::Shipped)
            .await;
        Ok(updated)
    }

    /// `Shipped -> Delivered`.
    #[instrument(skip(self), fields(%order_uuid))]
    pub async fn mark_delivered(&self, order_uuid: Uuid) -> Result<order::Model, ServiceError> {
        let (updated, from) = self
            .tx
            .within_tx(|txn, now| {
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let from = OrderStatus::parse(&order_model.status)?;
                    from.ensure_transition(OrderStatus::Delivered)?;
                    let updated =
                        set_status(txn, order_model, OrderStatus::Delivered, now).await?;
                    Ok((updated, from))
                })
            })
            .await?;

        self.emit_status_change(&updated, from, OrderStatus::Delivered)
            .await;
        Ok(updated)
    }

    /// Full refund of a confirmed/shipped/delivered order. Terminal.
    #[instrument(skip(self), fields(%order_uuid))]
    pub async fn refund(&self, order_uuid: Uuid) -> Result<order::Model, ServiceError> {
        let (updated, from) = self
            .tx
            .within_tx(|txn, now| {
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let from = OrderStatus::parse(&order_model.status)?;
                    from.ensure_transition(OrderStatus::Refunded)?;

                    let total = order_model.total_price;
                    let mut order_active: order::ActiveModel = order_model.into();
                    order_active.status = Set(OrderStatus::Refunded.to_string());
                    order_active.refunded_amount = Set(total);
                    let updated = order_active.update(txn).await.map_err(classify_db_err)?;

                    append_history(txn, updated.id, OrderStatus::Refunded, now).await?;
                    Ok((updated, from))
                })
            })
            .await?;

        self.emit_status_change(&updated, from, OrderStatus::Refunded)
            .await;
        Ok(updated)
    }

    /// Cancels an order that has not been paid, releasing its reservation.
    #[instrument(skip(self), fields(%order_uuid))]
    pub async fn cancel(&self, order_uuid: Uuid) -> Result<order::Model, ServiceError> {
        let updated = self
            .release_to(order_uuid, OrderStatus::Cancelled)
            .await?;
        self.events
            .send(Event::OrderCancelled {
                order_id: updated.id,
                order_uuid,
            })
            .await;
        Ok(updated)
    }

    /// Expires an order whose payment deadline passed, releasing its
    /// reservation.
    #[instrument(skip(self), fields(%order_uuid))]
    pub async fn expire(&self, order_uuid: Uuid) -> Result<order::Model, ServiceError> {
        let updated = self.release_to(order_uuid, OrderStatus::Expired).await?;
        self.events
            .send(Event::OrderExpired {
                order_id: updated.id,
                order_uuid,
            })
            .await;
        Ok(updated)
    }

    async fn release_to(
        &self,
        order_uuid: Uuid,
        target: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let (updated, _from) = self
            .tx
            .within_tx(|txn, now| {
                let stock = self.stock.clone();
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let from = OrderStatus::parse(&order_model.status)?;
                    from.ensure_transition(target)?;

                    let items = load_items(txn, order_model.id).await?;
                    stock.restore(txn, &items_to_lines(&items)).await?;

                    let updated = set_status(txn, order_model, target, now).await?;
                    Ok((updated, from))
                })
            })
            .await?;
        Ok(updated)
    }

    /// Applies (or clears) a promo on a not-yet-confirmed order.
    ///
    /// An invalid or expired code clears any existing promo and re-totals
    /// without one; that cleared state is persisted and the validation
    /// error is still returned to the caller.
    #[instrument(skip(self), fields(%order_uuid, code = %code))]
    pub async fn apply_promo(
        &self,
        order_uuid: Uuid,
        code: &str,
    ) -> Result<order::Model, ServiceError> {
        let (updated, applied, rejection) = self
            .tx
            .within_tx(|txn, now| {
                let promos = self.promos.clone();
                let pricing = self.pricing.clone();
                let code = code.to_string();
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let status = OrderStatus::parse(&order_model.status)?;
                    if !status.is_pre_confirmation() {
                        return Err(ServiceError::InvalidOperation(format!(
                            "promo cannot be changed once the order is {status}"
                        )));
                    }

                    let (modifier, rejection) = match promos.resolve(&code, now) {
                        Ok(m) => (Some(m), None),
                        Err(e @ (ServiceError::PromoInvalid(_) | ServiceError::PromoExpired(_))) => {
                            (None, Some(e))
                        }
                        Err(other) => return Err(other),
                    };

                    let items = load_items(txn, order_model.id).await?;
                    let total = pricing
                        .order_total(
                            &items_to_captured(&items),
                            carrier_of(txn, &order_model).await?,
                            &order_model.currency,
                            modifier.as_ref(),
                        )
                        .await?;

                    let mut order_active: order::ActiveModel = order_model.into();
                    order_active.promo_id = Set(modifier.map(|m| m.promo_id));
                    order_active.total_price = Set(total);
                    let updated = order_active.update(txn).await.map_err(classify_db_err)?;

                    Ok((updated, modifier, rejection))
                })
            })
            .await?;

        if let Some(err) = rejection {
            warn!(order_id = updated.id, %order_uuid, err = %err, "promo rejected; cleared and re-totaled");
            return Err(err);
        }

        if let Some(modifier) = applied {
            self.events
                .send(Event::PromoApplied {
                    order_id: updated.id,
                    promo_id: modifier.promo_id,
                })
                .await;
        }
        Ok(updated)
    }

    /// Replaces the items of a `Placed` order atomically: the old
    /// reservation is restored and the new one taken in the same
    /// transaction, so the net stock delta applies or nothing does.
    #[instrument(skip(self, items), fields(%order_uuid))]
    pub async fn update_items(
        &self,
        order_uuid: Uuid,
        items: Vec<CartItem>,
    ) -> Result<OrderDetails, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one item".to_string(),
            ));
        }
        for item in &items {
            item.validate()?;
        }

        let (updated, inserted) = self
            .tx
            .within_tx(|txn, _now| {
                let svc = self.clone();
                let new_items = items.clone();
                Box::pin(async move {
                    let order_model = load_order_by_uuid(txn, order_uuid).await?;
                    let status = OrderStatus::parse(&order_model.status)?;
                    if status != OrderStatus::Placed {
                        return Err(ServiceError::InvalidOperation(format!(
                            "items can only be changed while the order is Placed, not {status}"
                        )));
                    }

                    let old_items = load_items(txn, order_model.id).await?;
                    svc.stock.restore(txn, &items_to_lines(&old_items)).await?;
                    OrderItemEntity::delete_many()
                        .filter(order_item::Column::OrderId.eq(order_model.id))
                        .exec(txn)
                        .await
                        .map_err(classify_db_err)?;

                    let lines: Vec<StockLine> = new_items
                        .iter()
                        .map(|i| StockLine {
                            product_id: i.product_id,
                            size_id: i.size_id,
                            quantity: i.quantity,
                        })
                        .collect();
                    svc.stock.reserve(txn, &lines).await?;

                    let captured = svc
                        .capture_items(txn, &new_items, &order_model.currency)
                        .await?;

                    let promo =
                        load_promo_modifier(txn, order_model.promo_id).await?;
                    let total = svc
                        .pricing
                        .order_total(
                            &captured,
                            carrier_of(txn, &order_model).await?,
                            &order_model.currency,
                            promo.as_ref(),
                        )
                        .await?;

                    let mut inserted = Vec::with_capacity(new_items.len());
                    for (cart, econ) in new_items.iter().zip(captured.iter()) {
                        let item = order_item::ActiveModel {
                            order_id: Set(order_model.id),
                            product_id: Set(cart.product_id),
                            size_id: Set(cart.size_id),
                            quantity: Set(cart.quantity),
                            unit_base_price: Set(econ.unit_base_price),
                            sale_percentage: Set(econ.sale_percentage),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(classify_db_err)?;
                        inserted.push(item);
                    }

                    let mut order_active: order::ActiveModel = order_model.into();
                    order_active.total_price = Set(total);
                    let updated = order_active.update(txn).await.map_err(classify_db_err)?;

                    Ok((updated, inserted))
                })
            })
            .await?;

        let history = self.load_history(updated.id).await?;
        Ok(OrderDetails {
            order: updated,
            items: inserted,
            history,
        })
    }

    /// Reads the full order aggregate.
    pub async fn get_order(&self, order_uuid: Uuid) -> Result<OrderDetails, ServiceError> {
        let db = self.tx.connection();
        let order_model = OrderEntity::find()
            .filter(order::Column::Uuid.eq(order_uuid))
            .one(db)
            .await
            .map_err(classify_db_err)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_uuid} not found")))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .all(db)
            .await
            .map_err(classify_db_err)?;
        let history = self.load_history(order_model.id).await?;

        Ok(OrderDetails {
            order: order_model,
            items,
            history,
        })
    }

    /// Reads the aggregate by internal id (admin console paths).
    pub async fn get_order_by_id(&self, order_id: i32) -> Result<OrderDetails, ServiceError> {
        let order_model = OrderEntity::find_by_id(order_id)
            .one(self.tx.connection())
            .await
            .map_err(classify_db_err)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;
        self.get_order(order_model.uuid).await
    }

    /// Paginated admin listing, newest first.
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let db = self.tx.connection();
        let mut query = OrderEntity::find().order_by_desc(order::Column::PlacedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }
        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator.num_items().await.map_err(classify_db_err)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(classify_db_err)?;
        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Orders still `Placed` since before `older_than` (stuck carts), as
    /// `(order_id, order_uuid)` pairs for the worker's log context.
    pub async fn find_stuck_placed(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<(i32, Uuid)>, ServiceError> {
        let db = self.tx.connection();
        Ok(OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Placed.to_string()))
            .filter(order::Column::PlacedAt.lt(older_than))
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|o| (o.id, o.uuid))
            .collect())
    }

    /// Orders in `AwaitingPayment` whose deadline has passed.
    pub async fn find_awaiting_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(i32, Uuid)>, ServiceError> {
        let db = self.tx.connection();
        Ok(OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::AwaitingPayment.to_string()))
            .filter(order::Column::ExpiresAt.lt(now))
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|o| (o.id, o.uuid))
            .collect())
    }

    async fn load_history(
        &self,
        order_id: i32,
    ) -> Result<Vec<order_status_history::Model>, ServiceError> {
        HistoryEntity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::Id)
            .all(self.tx.connection())
            .await
            .map_err(classify_db_err)
    }

    async fn emit_status_change(&self, updated: &order::Model, from: OrderStatus, to: OrderStatus) {
        self.events
            .send(Event::OrderStatusChanged {
                order_id: updated.id,
                order_uuid: updated.uuid,
                from,
                to,
            })
            .await;
    }

    /// Captures per-item economics at this instant: the resolved unit price
    /// in the order currency and the product's current sale percentage.
    async fn capture_items<C: ConnectionTrait>(
        &self,
        txn: &C,
        items: &[CartItem],
        currency: &str,
    ) -> Result<Vec<CapturedItem>, ServiceError> {
        use crate::entities::product::Entity as ProductEntity;

        let mut captured = Vec::with_capacity(items.len());
        for item in items {
            let product = ProductEntity::find_by_id(item.product_id)
                .one(txn)
                .await
                .map_err(classify_db_err)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("product {} not found", item.product_id))
                })?;
            let unit_price = self
                .pricing
                .resolve_unit_price(txn, item.product_id, currency)
                .await?;
            captured.push(CapturedItem {
                unit_base_price: unit_price,
                sale_percentage: product.sale_percentage,
                quantity: item.quantity,
            });
        }
        Ok(captured)
    }
}

async fn load_order_by_uuid<C: ConnectionTrait>(
    txn: &C,
    order_uuid: Uuid,
) -> Result<order::Model, ServiceError> {
    OrderEntity::find()
        .filter(order::Column::Uuid.eq(order_uuid))
        .one(txn)
        .await
        .map_err(classify_db_err)?
        .ok_or_else(|| ServiceError::NotFound(format!("order {order_uuid} not found")))
}

async fn load_payment<C: ConnectionTrait>(
    txn: &C,
    payment_id: i32,
) -> Result<payment::Model, ServiceError> {
    payment::Entity::find_by_id(payment_id)
        .one(txn)
        .await
        .map_err(classify_db_err)?
        .ok_or_else(|| ServiceError::NotFound(format!("payment {payment_id} not found")))
}

async fn load_items<C: ConnectionTrait>(
    txn: &C,
    order_id: i32,
) -> Result<Vec<order_item::Model>, ServiceError> {
    OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(txn)
        .await
        .map_err(classify_db_err)
}

async fn load_promo_modifier<C: ConnectionTrait>(
    txn: &C,
    promo_id: Option<i32>,
) -> Result<Option<PromoModifier>, ServiceError> {
    let Some(promo_id) = promo_id else {
        return Ok(None);
    };
    let promo = promo_code::Entity::find_by_id(promo_id)
        .one(txn)
        .await
        .map_err(classify_db_err)?
        .ok_or_else(|| ServiceError::NotFound(format!("promo {promo_id} not found")))?;
    Ok(Some(PromoModifier {
        promo_id: promo.id,
        discount_percent: promo.discount_percent,
        free_shipping: promo.free_shipping,
    }))
}

async fn carrier_of<C: ConnectionTrait>(
    txn: &C,
    order_model: &order::Model,
) -> Result<i32, ServiceError> {
    let shipment_row = shipment::Entity::find_by_id(order_model.shipment_id)
        .one(txn)
        .await
        .map_err(classify_db_err)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("shipment {} not found", order_model.shipment_id))
        })?;
    Ok(shipment_row.carrier_id)
}

async fn insert_address<C: ConnectionTrait>(
    txn: &C,
    details: &AddressDetails,
) -> Result<address::Model, ServiceError> {
    address::ActiveModel {
        street: Set(details.street.clone()),
        house_number: Set(details.house_number.clone()),
        apartment_number: Set(details.apartment_number.clone()),
        city: Set(details.city.clone()),
        state: Set(details.state.clone()),
        country: Set(details.country.clone()),
        postal_code: Set(details.postal_code.clone()),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(classify_db_err)
}

async fn append_history<C: ConnectionTrait>(
    txn: &C,
    order_id: i32,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    order_status_history::ActiveModel {
        order_id: Set(order_id),
        status: Set(status.to_string()),
        changed_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(classify_db_err)?;
    Ok(())
}

/// Updates the status column and appends the matching history row; the two
/// never move independently.
async fn set_status<C: ConnectionTrait>(
    txn: &C,
    order_model: order::Model,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<order::Model, ServiceError> {
    let mut order_active: order::ActiveModel = order_model.into();
    order_active.status = Set(to.to_string());
    let updated = order_active.update(txn).await.map_err(classify_db_err)?;
    append_history(txn, updated.id, to, now).await?;
    Ok(updated)
}

fn items_to_lines(items: &[order_item::Model]) -> Vec<StockLine> {
    items
        .iter()
        .map(|i| StockLine {
            product_id: i.product_id,
            size_id: i.size_id,
            quantity: i.quantity,
        })
        .collect()
}

fn items_to_captured(items: &[order_item::Model]) -> Vec<CapturedItem> {
    items
        .iter()
        .map(|i| CapturedItem {
            unit_base_price: i.unit_base_price,
            sale_percentage: i.sale_percentage,
            quantity: i.quantity,
        })
        .collect()
}
