//! Atelier API Library
//!
//! Order and payment lifecycle core for the Atelier storefront: the order
//! state machine, stock reservation, multi-currency pricing with promo
//! codes, pre-order payment-intent sessions, and the background
//! reconcilers that keep all of it consistent.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;
pub mod workers;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::watch;

use crate::cache::DictionaryCache;
use crate::config::AtelierConfig;
use crate::db::TxRunner;
use crate::events::EventSender;
use crate::services::orders::OrderService;
use crate::services::payments::{CheckoutService, PaymentProvider};
use crate::services::pi_sessions::PiSessionStore;
use crate::services::pricing::PricingService;
use crate::services::promos::PromoService;
use crate::services::rates::DbRatesProvider;
use crate::services::stock::StockService;

/// Shared application state handed to the transport layer and the workers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AtelierConfig,
    pub cache: Arc<DictionaryCache>,
    pub event_sender: EventSender,
    pub orders: OrderService,
    pub checkout: CheckoutService,
    pub pi_sessions: Arc<PiSessionStore>,
}

impl AppState {
    /// Wires the full service graph over an established pool and a loaded
    /// dictionary cache.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: AtelierConfig,
        cache: Arc<DictionaryCache>,
        event_sender: EventSender,
        payment_provider: Arc<dyn PaymentProvider>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let tx = TxRunner::new(Arc::clone(&db)).with_shutdown(shutdown);
        let rates = Arc::new(DbRatesProvider::new(Arc::clone(&db)));
        let pricing = PricingService::new(Arc::clone(&cache), rates);
        let promos = PromoService::new(Arc::clone(&cache));
        let stock = StockService::new();

        let orders = OrderService::new(
            tx,
            Arc::clone(&cache),
            pricing,
            promos,
            stock,
            event_sender.clone(),
            config.awaiting_payment_ttl(),
        );

        let pi_sessions = Arc::new(PiSessionStore::new(config.pi_session_ttl()));
        let checkout = CheckoutService::new(Arc::clone(&pi_sessions), payment_provider);

        Self {
            db,
            config,
            cache,
            event_sender,
            orders,
            checkout,
            pi_sessions,
        }
    }
}
