use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;

use crate::cache::DictionaryCache;
use crate::entities::product_price::{self, Entity as ProductPriceEntity};
use crate::errors::{classify_db_err, ServiceError};
use crate::services::promos::PromoModifier;
use crate::services::rates::RatesProvider;

const HUNDRED: Decimal = dec!(100);

/// Rounds a final monetary amount to two fractional digits. Applied once,
/// on assignment to a total; intermediate products keep full precision.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Item economics captured at reservation time. Re-totals of an existing
/// order always go through these values, never the live catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedItem {
    pub unit_base_price: Decimal,
    pub sale_percentage: Decimal,
    pub quantity: i32,
}

/// Computes order totals in the order's currency from captured item
/// economics, the carrier's per-currency shipping price, and an optional
/// promo modifier.
#[derive(Clone)]
pub struct PricingService {
    cache: Arc<DictionaryCache>,
    rates: Arc<dyn RatesProvider>,
}

impl PricingService {
    pub fn new(cache: Arc<DictionaryCache>, rates: Arc<dyn RatesProvider>) -> Self {
        Self { cache, rates }
    }

    /// Resolves a product's undiscounted unit price in `currency`.
    ///
    /// Reads `product_price` for the exact currency; when the row is
    /// missing, falls back deterministically to the base-currency price
    /// multiplied by the latest conversion rate.
    pub async fn resolve_unit_price<C: ConnectionTrait>(
        &self,
        txn: &C,
        product_id: i32,
        currency: &str,
    ) -> Result<Decimal, ServiceError> {
        if let Some(row) = self.find_price(txn, product_id, currency).await? {
            return Ok(row);
        }

        let base_currency = self.cache.base_currency();
        if currency == base_currency {
            return Err(ServiceError::NotFound(format!(
                "no price for product {product_id} in base currency {base_currency}"
            )));
        }

        let base_price = self
            .find_price(txn, product_id, &base_currency)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no price for product {product_id} in {currency} or {base_currency}"
                ))
            })?;

        let rate = self.rates.rate(currency).await?;
        debug!(product_id, currency, %rate, "converting base price via rate");
        Ok(base_price * rate)
    }

    async fn find_price<C: ConnectionTrait>(
        &self,
        txn: &C,
        product_id: i32,
        currency: &str,
    ) -> Result<Option<Decimal>, ServiceError> {
        Ok(ProductPriceEntity::find()
            .filter(product_price::Column::ProductId.eq(product_id))
            .filter(product_price::Column::Currency.eq(currency))
            .one(txn)
            .await
            .map_err(classify_db_err)?
            .map(|m| m.price))
    }

    /// Resolves the carrier's shipping price in `currency`, falling back to
    /// the base-currency price converted via the latest rate.
    pub async fn resolve_shipping_price(
        &self,
        carrier_id: i32,
        currency: &str,
    ) -> Result<Decimal, ServiceError> {
        if let Some(price) = self.cache.shipment_carrier_price(carrier_id, currency) {
            return Ok(price);
        }

        let base_currency = self.cache.base_currency();
        let base_price = self
            .cache
            .shipment_carrier_price(carrier_id, &base_currency)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no shipping price for carrier {carrier_id} in {currency} or {base_currency}"
                ))
            })?;

        if currency == base_currency {
            return Ok(base_price);
        }

        let rate = self.rates.rate(currency).await?;
        Ok(base_price * rate)
    }

    /// Total for an order: discounted item sum plus shipping, rounded to
    /// two digits only at the end.
    pub async fn order_total(
        &self,
        items: &[CapturedItem],
        carrier_id: i32,
        currency: &str,
        promo: Option<&PromoModifier>,
    ) -> Result<Decimal, ServiceError> {
        let items_sum = Self::items_subtotal(items);

        let items_discounted = match promo {
            Some(p) => items_sum * (Decimal::ONE - p.discount_percent / HUNDRED),
            None => items_sum,
        };

        let shipping = match promo {
            Some(p) if p.free_shipping => Decimal::ZERO,
            _ => self.resolve_shipping_price(carrier_id, currency).await?,
        };

        Ok(round_money(items_discounted + shipping))
    }

    /// Undiscounted-by-promo item sum: unit price net of the per-item sale
    /// percentage, times quantity.
    pub fn items_subtotal(items: &[CapturedItem]) -> Decimal {
        items
            .iter()
            .map(|item| {
                item.unit_base_price
                    * (Decimal::ONE - item.sale_percentage / HUNDRED)
                    * Decimal::from(item.quantity)
            })
            .sum()
    }
}
