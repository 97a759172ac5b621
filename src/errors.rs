use rust_decimal::Decimal;
use sea_orm::error::{DbErr, SqlErr};

use crate::services::status::OrderStatus;

/// Unified error type for the order core.
///
/// `SerializationConflict` never escapes `within_tx`; it exists so the retry
/// loop can recognize it after classification. Everything else is surfaced to
/// callers as-is.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock for product {product_id} size {size_id}")]
    InsufficientStock { product_id: i32, size_id: i32 },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Promo code invalid: {0}")]
    PromoInvalid(String),

    #[error("Promo code expired: {0}")]
    PromoExpired(String),

    #[error("Payment amount {received} is below order total {expected}")]
    AmountBelowTotal { expected: Decimal, received: Decimal },

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Transaction serialization conflict")]
    SerializationConflict,

    #[error("Transient external error: {0}")]
    TransientExternal(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// True for errors the transaction runner may retry from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::SerializationConflict)
    }
}

/// Maps a database error onto the domain error taxonomy.
///
/// Unique violations are surfaced as `UniqueViolation` so callers can
/// distinguish them (duplicate promo codes, duplicate order items).
/// Serialization failures (Postgres SQLSTATE 40001, SQLite "database is
/// locked" under its serializable default) become `SerializationConflict`
/// and are consumed by the retry loop in `db::TxRunner`.
pub fn classify_db_err(err: DbErr) -> ServiceError {
    if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
        return ServiceError::UniqueViolation(msg);
    }

    let msg = err.to_string();
    if msg.contains("40001")
        || msg.contains("could not serialize access")
        || msg.contains("database is locked")
        || msg.contains("deadlock detected")
    {
        return ServiceError::SerializationConflict;
    }

    ServiceError::DatabaseError(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failure_is_classified_retryable() {
        let err = DbErr::Custom("could not serialize access due to concurrent update".into());
        let classified = classify_db_err(err);
        assert!(classified.is_retryable());
    }

    #[test]
    fn sqlite_busy_is_classified_retryable() {
        let err = DbErr::Custom("database is locked".into());
        assert!(classify_db_err(err).is_retryable());
    }

    #[test]
    fn other_db_errors_pass_through() {
        let err = DbErr::Custom("syntax error near SELECT".into());
        let classified = classify_db_err(err);
        assert!(!classified.is_retryable());
        assert!(matches!(classified, ServiceError::DatabaseError(_)));
    }

    #[test]
    fn validation_errors_convert() {
        use validator::ValidationErrors;
        let errs = ValidationErrors::new();
        let service_err: ServiceError = errs.into();
        assert!(matches!(service_err, ServiceError::ValidationError(_)));
    }
}
