//! Stock ledger primitives.
//!
//! The stock row is the single serialization point for inventory: both
//! operations lock it before reading, so arbitrary concurrent callers
//! racing on the same product serialize on the row lock and stock can
//! never go negative.

use chrono::Utc;
use common::ProductId;
use storage::StoreTx;

use crate::error::DomainError;

/// Audit tag recorded by the cancellation restock compensation.
pub const RESTOCK_ACTOR: &str = "system:cancelled-order";

/// Adds `quantity` units to a product's stock under the row lock.
///
/// Returns the new stock level. The lock is held until the enclosing
/// transaction commits.
pub async fn add<T: StoreTx>(
    tx: &mut T,
    product_id: ProductId,
    quantity: u32,
    actor: &str,
) -> Result<i64, DomainError> {
    if quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity });
    }

    let mut record = tx
        .lock_stock(product_id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "stock ledger",
            id: product_id.to_string(),
        })?;

    record.stock += quantity as i64;
    record.last_updated_by = actor.to_string();
    record.updated_at = Utc::now();
    tx.update_stock(&record).await?;

    Ok(record.stock)
}

/// Subtracts `quantity` units from a product's stock under the row lock.
///
/// Fails with [`DomainError::InsufficientStock`] if the locked row holds
/// fewer units than requested; the caller's transaction then rolls back.
pub async fn subtract<T: StoreTx>(
    tx: &mut T,
    product_id: ProductId,
    quantity: u32,
    actor: &str,
) -> Result<i64, DomainError> {
    if quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity });
    }

    let mut record = tx
        .lock_stock(product_id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "stock ledger",
            id: product_id.to_string(),
        })?;

    if quantity as i64 > record.stock {
        return Err(DomainError::InsufficientStock {
            product_id,
            available: record.stock,
        });
    }

    record.stock -= quantity as i64;
    record.last_updated_by = actor.to_string();
    record.updated_at = Utc::now();
    tx.update_stock(&record).await?;

    Ok(record.stock)
}
