use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::debug;

use crate::entities::product_size::{self, Entity as ProductSizeEntity};
use crate::errors::{classify_db_err, ServiceError};

/// One reservation line: how many units of a (product, size) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: i32,
    pub size_id: i32,
    pub quantity: i32,
}

/// Transactional stock ledger over `product_size`.
///
/// Both operations run on a caller-supplied transaction so the whole order
/// mutation commits or rolls back as one unit. Contention between concurrent
/// reservations is settled by the serializable transaction; callers retry
/// through `TxRunner`.
#[derive(Clone, Default)]
pub struct StockService;

impl StockService {
    pub fn new() -> Self {
        Self
    }

    /// Decrements stock for every line, failing with `InsufficientStock` if
    /// any resulting quantity would go negative. All-or-nothing within the
    /// surrounding transaction.
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        txn: &C,
        lines: &[StockLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            self.adjust(txn, line.product_id, line.size_id, -line.quantity)
                .await?;
        }
        Ok(())
    }

    /// Increments stock by the same vector, used when an order is cancelled
    /// or expires.
    pub async fn restore<C: ConnectionTrait>(
        &self,
        txn: &C,
        lines: &[StockLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            self.adjust(txn, line.product_id, line.size_id, line.quantity)
                .await?;
        }
        Ok(())
    }

    async fn adjust<C: ConnectionTrait>(
        &self,
        txn: &C,
        product_id: i32,
        size_id: i32,
        delta: i32,
    ) -> Result<(), ServiceError> {
        let row = ProductSizeEntity::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .filter(product_size::Column::SizeId.eq(size_id))
            .one(txn)
            .await
            .map_err(classify_db_err)?
            .ok_or(ServiceError::InsufficientStock {
                product_id,
                size_id,
            })?;

        let new_quantity = row.quantity + delta;
        if new_quantity < 0 {
            return Err(ServiceError::InsufficientStock {
                product_id,
                size_id,
            });
        }

        debug!(
            product_id,
            size_id,
            from = row.quantity,
            to = new_quantity,
            "adjusting stock"
        );

        let mut active: product_size::ActiveModel = row.into();
        active.quantity = Set(new_quantity);
        active.update(txn).await.map_err(classify_db_err)?;
        Ok(())
    }
}
