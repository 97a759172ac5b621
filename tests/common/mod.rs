// Shared across several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use strum::IntoEnumIterator;
use tokio::sync::watch;
use uuid::Uuid;

use atelier_api::cache::DictionaryCache;
use atelier_api::config::AtelierConfig;
use atelier_api::db::{establish_connection, DbConfig};
use atelier_api::entities::{
    currency_rate, order, payment_method, product, product_price, product_size, promo_code,
    shipment_carrier, shipment_carrier_price, size,
};
use atelier_api::entities::order_status as order_status_entity;
use atelier_api::events;
use atelier_api::migrator::Migrator;
use atelier_api::services::orders::{
    AddressDetails, BuyerDetails, CartItem, ConfirmPaymentRequest, PlaceOrderRequest,
};
use atelier_api::services::payments::OfflinePaymentProvider;
use atelier_api::services::status::OrderStatus;
use atelier_api::AppState;

/// Harness over an in-memory SQLite database seeded with a small catalog:
/// product 1 ("Linen Dress", 90.00 EUR, no sale) and product 2 ("Silk
/// Scarf", 40.00 EUR, 10% sale), carrier 1 shipping at 10.00 EUR / 11.00
/// USD, promos SALE10 / FREESHIP / EXPIRED / BLOCKED, USD rate 1.10.
pub struct TestApp {
    pub state: AppState,
    pub shutdown_tx: watch::Sender<bool>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AtelierConfig) -> Self {
        // One pooled connection: every pooled connection to an in-memory
        // SQLite URL would otherwise open its own empty database.
        let db_config = DbConfig {
            url: config.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..DbConfig::default()
        };
        let db = Arc::new(
            establish_connection(&db_config)
                .await
                .expect("failed to open test database"),
        );
        Migrator::up(db.as_ref(), None)
            .await
            .expect("failed to migrate test database");

        seed(db.as_ref()).await;

        let cache = Arc::new(
            DictionaryCache::load(Arc::clone(&db), config.base_currency.clone())
                .await
                .expect("failed to load dictionary cache"),
        );

        let (event_sender, event_task) = events::spawn_event_processor(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = AppState::build(
            db,
            config,
            cache,
            event_sender,
            Arc::new(OfflinePaymentProvider),
            shutdown_rx,
        );

        Self {
            state,
            shutdown_tx,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.state.db.as_ref()
    }

    /// Remaining stock for a (product, size) pair.
    pub async fn stock_of(&self, product_id: i32, size_id: i32) -> i32 {
        product_size::Entity::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .filter(product_size::Column::SizeId.eq(size_id))
            .one(self.db())
            .await
            .expect("stock query failed")
            .expect("stock row missing")
            .quantity
    }

    pub async fn order_status(&self, order_uuid: Uuid) -> OrderStatus {
        let details = self
            .state
            .orders
            .get_order(order_uuid)
            .await
            .expect("order should exist");
        OrderStatus::parse(&details.order.status).expect("status should parse")
    }

    /// Statuses recorded in the history, oldest first.
    pub async fn history_of(&self, order_uuid: Uuid) -> Vec<String> {
        self.state
            .orders
            .get_order(order_uuid)
            .await
            .expect("order should exist")
            .history
            .into_iter()
            .map(|h| h.status)
            .collect()
    }

    pub async fn force_placed_at(&self, order_uuid: Uuid, ago: ChronoDuration) {
        let row = order::Entity::find()
            .filter(order::Column::Uuid.eq(order_uuid))
            .one(self.db())
            .await
            .expect("order query failed")
            .expect("order missing");
        let mut active: order::ActiveModel = row.into();
        active.placed_at = Set(Utc::now() - ago);
        active.update(self.db()).await.expect("update failed");
    }

    pub async fn force_expires_at(&self, order_uuid: Uuid, ago: ChronoDuration) {
        let row = order::Entity::find()
            .filter(order::Column::Uuid.eq(order_uuid))
            .one(self.db())
            .await
            .expect("order query failed")
            .expect("order missing");
        let mut active: order::ActiveModel = row.into();
        active.expires_at = Set(Some(Utc::now() - ago));
        active.update(self.db()).await.expect("update failed");
    }
}

pub fn test_config() -> AtelierConfig {
    let mut config = AtelierConfig::for_database("sqlite::memory:");
    config.base_currency = "EUR".to_string();
    config
}

pub fn cart(items: &[(i32, i32, i32)]) -> Vec<CartItem> {
    items
        .iter()
        .map(|&(product_id, size_id, quantity)| CartItem {
            product_id,
            size_id,
            quantity,
        })
        .collect()
}

pub fn place_request(
    items: &[(i32, i32, i32)],
    currency: &str,
    promo_code: Option<&str>,
) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: cart(items),
        buyer: BuyerDetails {
            first_name: "Nora".into(),
            last_name: "Lindqvist".into(),
            email: "nora@example.com".into(),
            phone: "+46701234567".into(),
            receive_promo_emails: false,
        },
        billing_address: test_address(),
        shipping_address: test_address(),
        currency: currency.to_string(),
        carrier_id: 1,
        payment_method: "card".into(),
        promo_code: promo_code.map(str::to_string),
    }
}

pub fn confirm_request(amount: rust_decimal::Decimal, currency: &str) -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        provider_intent_id: format!("pi_test_{}", Uuid::new_v4()),
        amount,
        currency: currency.to_string(),
        payer: Some("nora@example.com".into()),
        payee: None,
    }
}

fn test_address() -> AddressDetails {
    AddressDetails {
        street: "Drottninggatan".into(),
        house_number: "12".into(),
        apartment_number: None,
        city: "Stockholm".into(),
        state: "Stockholm".into(),
        country: "SE".into(),
        postal_code: "11151".into(),
    }
}

async fn seed(db: &DatabaseConnection) {
    let now = Utc::now();

    for status in OrderStatus::iter() {
        order_status_entity::ActiveModel {
            name: Set(status.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed order_status");
    }

    for name in ["S", "M"] {
        size::ActiveModel {
            name: Set(name.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed size");
    }

    currency_rate::ActiveModel {
        currency: Set("USD".into()),
        rate: Set(dec!(1.10)),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed currency_rate");

    // Product 1: 90.00 EUR, no sale. Product 2: 40.00 EUR, 10% sale.
    for (name, sale) in [("Linen Dress", dec!(0)), ("Silk Scarf", dec!(10))] {
        product::ActiveModel {
            name: Set(name.into()),
            sale_percentage: Set(sale),
            hidden: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed product");
    }
    for (product_id, price) in [(1, dec!(90.00)), (2, dec!(40.00))] {
        product_price::ActiveModel {
            product_id: Set(product_id),
            currency: Set("EUR".into()),
            price: Set(price),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed product_price");
    }
    for (product_id, size_id, quantity) in [(1, 1, 5), (1, 2, 1), (2, 1, 3)] {
        product_size::ActiveModel {
            product_id: Set(product_id),
            size_id: Set(size_id),
            quantity: Set(quantity),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed product_size");
    }

    shipment_carrier::ActiveModel {
        name: Set("PostNord".into()),
        allowed: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed carrier");
    for (currency, price) in [("EUR", dec!(10.00)), ("USD", dec!(11.00))] {
        shipment_carrier_price::ActiveModel {
            carrier_id: Set(1),
            currency: Set(currency.into()),
            price: Set(price),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed carrier price");
    }

    for (name, allowed) in [("card", true), ("invoice", false)] {
        payment_method::ActiveModel {
            name: Set(name.into()),
            allowed: Set(allowed),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed payment_method");
    }

    let in_a_year = now + ChronoDuration::days(365);
    let promos = [
        ("SALE10", dec!(10), false, in_a_year, true),
        ("FREESHIP", dec!(0), true, in_a_year, true),
        ("EXPIRED", dec!(50), false, now - ChronoDuration::days(1), true),
        ("BLOCKED", dec!(50), false, in_a_year, false),
    ];
    for (code, discount, free_shipping, expiration, allowed) in promos {
        promo_code::ActiveModel {
            code: Set(code.into()),
            free_shipping: Set(free_shipping),
            discount_percent: Set(discount),
            expiration: Set(expiration),
            allowed: Set(allowed),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed promo");
    }
}
