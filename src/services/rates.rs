use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entities::currency_rate;
use crate::errors::{classify_db_err, ServiceError};

/// Source of conversion factors relative to the base currency. Rates are
/// refreshed out-of-band; the pricing engine always reads the latest
/// snapshot.
#[async_trait]
pub trait RatesProvider: Send + Sync {
    async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ServiceError>;

    async fn rate(&self, currency: &str) -> Result<Decimal, ServiceError> {
        self.latest_rates()
            .await?
            .get(currency)
            .copied()
            .ok_or_else(|| {
                ServiceError::TransientExternal(format!("no conversion rate for {currency}"))
            })
    }
}

/// Rates read from the `currency_rate` table, which an external refresher
/// keeps current.
pub struct DbRatesProvider {
    db: Arc<DatabaseConnection>,
}

impl DbRatesProvider {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RatesProvider for DbRatesProvider {
    async fn latest_rates(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        Ok(currency_rate::Entity::find()
            .all(self.db.as_ref())
            .await
            .map_err(classify_db_err)?
            .into_iter()
            .map(|m| (m.currency, m.rate))
            .collect())
    }
}
