use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::cache::DictionaryCache;
use crate::errors::ServiceError;

/// Effective modifier a resolved promo contributes to pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoModifier {
    pub promo_id: i32,
    pub discount_percent: Decimal,
    pub free_shipping: bool,
}

/// Validates promo codes against the dictionary cache snapshot.
/// Resolution is pure over the snapshot taken at call time; a promo
/// disabled mid-flight is picked up on the next call.
#[derive(Clone)]
pub struct PromoService {
    cache: Arc<DictionaryCache>,
}

impl PromoService {
    pub fn new(cache: Arc<DictionaryCache>) -> Self {
        Self { cache }
    }

    /// A code resolves iff it exists, is allowed, and `now` is strictly
    /// before its expiration.
    pub fn resolve(&self, code: &str, now: DateTime<Utc>) -> Result<PromoModifier, ServiceError> {
        let promo = self
            .cache
            .promo_by_code(code)
            .ok_or_else(|| ServiceError::PromoInvalid(code.to_string()))?;

        if !promo.allowed {
            debug!(code, "promo code disallowed");
            return Err(ServiceError::PromoInvalid(code.to_string()));
        }

        if now >= promo.expiration {
            debug!(code, expiration = %promo.expiration, "promo code expired");
            return Err(ServiceError::PromoExpired(code.to_string()));
        }

        Ok(PromoModifier {
            promo_id: promo.id,
            discount_percent: promo.discount_percent,
            free_shipping: promo.free_shipping,
        })
    }
}
