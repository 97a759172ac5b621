use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{info, instrument};

use crate::entities::{
    category, payment_method, promo_code, shipment_carrier, shipment_carrier_price, size,
};
use crate::entities::order_status as order_status_entity;
use crate::errors::{classify_db_err, ServiceError};

/// Immutable snapshot of the slow-changing reference data. Readers hold an
/// `Arc` to a snapshot; invalidators build a new snapshot and swap the
/// pointer, so a reader never observes a half-updated dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    pub base_currency: String,
    pub sizes: HashMap<i32, size::Model>,
    pub categories: HashMap<i32, category::Model>,
    pub carriers: HashMap<i32, shipment_carrier::Model>,
    pub carrier_prices: HashMap<(i32, String), Decimal>,
    pub payment_methods: Vec<payment_method::Model>,
    pub order_status_ids: HashMap<String, i32>,
    pub promos: HashMap<String, promo_code::Model>,
    pub site_available: bool,
}

/// Read-through cache over the reference tables, loaded once at startup and
/// refreshed slice-by-slice when the settings collaborators mutate the
/// underlying rows (persist first, then invalidate).
pub struct DictionaryCache {
    db: Arc<DatabaseConnection>,
    snapshot: RwLock<Arc<Dictionary>>,
}

impl DictionaryCache {
    /// Loads every slice from the database. Startup fails if this fails.
    #[instrument(skip(db))]
    pub async fn load(
        db: Arc<DatabaseConnection>,
        base_currency: String,
    ) -> Result<Self, ServiceError> {
        let dictionary = Self::build_dictionary(&db, base_currency, true).await?;
        info!(
            sizes = dictionary.sizes.len(),
            carriers = dictionary.carriers.len(),
            promos = dictionary.promos.len(),
            "dictionary cache loaded"
        );
        Ok(Self {
            db,
            snapshot: RwLock::new(Arc::new(dictionary)),
        })
    }

    async fn build_dictionary(
        db: &DatabaseConnection,
        base_currency: String,
        site_available: bool,
    ) -> Result<Dictionary, ServiceError> {
        let sizes = size::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let categories = category::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let carriers = shipment_carrier::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let carrier_prices = shipment_carrier_price::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| ((m.carrier_id, m.currency), m.price))
            .collect();

        let payment_methods = payment_method::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?;

        let order_status_ids = order_status_entity::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.name, m.id))
            .collect();

        let promos = Self::load_promos(db).await?;

        Ok(Dictionary {
            base_currency,
            sizes,
            categories,
            carriers,
            carrier_prices,
            payment_methods,
            order_status_ids,
            promos,
            site_available,
        })
    }

    async fn load_promos(
        db: &DatabaseConnection,
    ) -> Result<HashMap<String, promo_code::Model>, ServiceError> {
        Ok(promo_code::Entity::find()
            .all(db)
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.code.clone(), m))
            .collect())
    }

    /// Current snapshot; cheap to call, safe to hold across awaits.
    ///
    /// The lock only ever guards a pointer swap, so a poisoned lock is
    /// recovered: the snapshot behind it is always whole.
    pub fn snapshot(&self) -> Arc<Dictionary> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Dictionary),
    {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        mutate(&mut next);
        *guard = Arc::new(next);
    }

    pub fn base_currency(&self) -> String {
        self.snapshot().base_currency.clone()
    }

    pub fn size_by_id(&self, id: i32) -> Option<size::Model> {
        self.snapshot().sizes.get(&id).cloned()
    }

    pub fn carrier_by_id(&self, id: i32) -> Option<shipment_carrier::Model> {
        self.snapshot().carriers.get(&id).cloned()
    }

    pub fn payment_methods(&self) -> Vec<payment_method::Model> {
        self.snapshot().payment_methods.clone()
    }

    pub fn order_status_id(&self, name: &str) -> Option<i32> {
        self.snapshot().order_status_ids.get(name).copied()
    }

    pub fn promo_by_code(&self, code: &str) -> Option<promo_code::Model> {
        self.snapshot().promos.get(code).cloned()
    }

    pub fn shipment_carrier_price(&self, carrier_id: i32, currency: &str) -> Option<Decimal> {
        self.snapshot()
            .carrier_prices
            .get(&(carrier_id, currency.to_string()))
            .copied()
    }

    pub fn site_available(&self) -> bool {
        self.snapshot().site_available
    }

    /// Re-reads the promo slice. Called after a promo row is inserted,
    /// deleted, or disallowed by the settings collaborators.
    pub async fn refresh_promos(&self) -> Result<(), ServiceError> {
        let promos = Self::load_promos(&self.db).await?;
        self.swap(|d| d.promos = promos);
        Ok(())
    }

    /// Re-reads carriers and their per-currency prices.
    pub async fn refresh_carriers(&self) -> Result<(), ServiceError> {
        let carriers: HashMap<i32, shipment_carrier::Model> = shipment_carrier::Entity::find()
            .all(self.db.as_ref())
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        let carrier_prices: HashMap<(i32, String), Decimal> =
            shipment_carrier_price::Entity::find()
                .all(self.db.as_ref())
                .await
                .map_err(classify_db_err)?
                .into_iter()
                .map(|m| ((m.carrier_id, m.currency), m.price))
                .collect();
        self.swap(|d| {
            d.carriers = carriers;
            d.carrier_prices = carrier_prices;
        });
        Ok(())
    }

    /// Re-reads the payment-method slice after an allowance change.
    pub async fn refresh_payment_methods(&self) -> Result<(), ServiceError> {
        let methods = payment_method::Entity::find()
            .all(self.db.as_ref())
            .await
            .map_err(classify_db_err)?;
        self.swap(|d| d.payment_methods = methods);
        Ok(())
    }

    /// Flips the storefront availability flag (maintenance mode).
    pub fn set_site_available(&self, available: bool) {
        self.swap(|d| d.site_available = available);
    }
}
