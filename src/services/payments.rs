use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::pi_sessions::PiSessionStore;

/// Intent handle returned by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Port to the payment provider. The concrete implementation (HTTP client,
/// API keys) lives outside the core.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<ProviderIntent, ServiceError>;
}

/// A provider-side cleaner of orphaned pre-order intents. The reconciler
/// worker calls every registered cleaner each tick; the cleaner lists
/// intents older than the threshold that never became orders and cancels
/// them, returning the count.
#[async_trait]
pub trait PreOrderCleaner: Send + Sync {
    fn name(&self) -> &str;

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64, ServiceError>;
}

/// Fallback provider for development deployments without provider
/// credentials: mints local intent handles that no real charge backs.
#[derive(Debug, Default)]
pub struct OfflinePaymentProvider;

#[async_trait]
impl PaymentProvider for OfflinePaymentProvider {
    async fn create_intent(
        &self,
        _amount: Decimal,
        _currency: &str,
        idempotency_key: &str,
    ) -> Result<ProviderIntent, ServiceError> {
        Ok(ProviderIntent {
            intent_id: format!("pi_offline_{idempotency_key}"),
            client_secret: format!("cs_offline_{}", Uuid::new_v4()),
        })
    }
}

/// Deterministic fingerprint over the cart contents used as idempotency
/// input for intent creation. Item order does not matter.
pub fn cart_fingerprint(
    items: &[(i32, i32, i32)],
    currency: &str,
    carrier_id: i32,
    promo_code: Option<&str>,
) -> String {
    let mut sorted: Vec<_> = items.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for (product_id, size_id, quantity) in &sorted {
        hasher.update(product_id.to_le_bytes());
        hasher.update(size_id.to_le_bytes());
        hasher.update(quantity.to_le_bytes());
    }
    hasher.update(currency.as_bytes());
    hasher.update(carrier_id.to_le_bytes());
    if let Some(code) = promo_code {
        hasher.update(code.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Result of starting (or resuming) a checkout payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub key: Uuid,
    pub intent_id: String,
    pub client_secret: String,
}

/// Glue between the PI session store and the payment provider: a retried
/// client submission with the same key and an unchanged cart resolves to
/// the existing intent; a changed cart (different fingerprint) gets a new
/// one.
#[derive(Clone)]
pub struct CheckoutService {
    sessions: Arc<PiSessionStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl CheckoutService {
    pub fn new(sessions: Arc<PiSessionStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { sessions, provider }
    }

    #[instrument(skip(self, fingerprint), fields(currency = %currency))]
    pub async fn begin_payment_session(
        &self,
        key: Option<Uuid>,
        amount: Decimal,
        currency: &str,
        fingerprint: String,
    ) -> Result<PaymentSession, ServiceError> {
        if let Some(key) = key {
            if let Some(session) = self.sessions.get(&key) {
                if session.cart_fingerprint == fingerprint {
                    return Ok(PaymentSession {
                        key,
                        intent_id: session.payment_intent_id,
                        client_secret: session.client_secret,
                    });
                }
                // Cart changed under the same key: the old intent is left to
                // the reconciler and a fresh one is created below.
                self.sessions.delete(&key);
            }
        }

        let key = key.unwrap_or_else(Uuid::new_v4);
        let intent = self
            .provider
            .create_intent(amount, currency, &key.to_string())
            .await?;

        self.sessions.put(
            Some(key),
            intent.intent_id.clone(),
            intent.client_secret.clone(),
            fingerprint,
        );

        info!(%key, intent_id = %intent.intent_id, "payment intent session created");

        Ok(PaymentSession {
            key,
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
        })
    }

    /// Drops the session once its order has been placed and payment begun.
    pub fn finish_session(&self, key: &Uuid) {
        self.sessions.delete(key);
    }
}
