//! Stock ledger: guarded decrements of `Variant::stock`.
//!
//! Outside of checkout, stock only changes through an admin variant update.

use uuid::Uuid;

use crate::error::{EcommerceError, Result};
use crate::store::StoreTx;

/// Removes `quantity` units of a variant inside the caller's transaction.
///
/// Fails with `InsufficientStock` when the guarded update touches no row,
/// i.e. the variant is archived, unknown, or has fewer than `quantity` units.
/// Stock is left untouched in that case.
#[tracing::instrument(skip(tx))]
pub async fn decrement_stock(tx: &mut dyn StoreTx, variant_id: Uuid, quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(EcommerceError::InvalidQuantity(quantity));
    }
    match tx.decrement_stock(variant_id, quantity).await? {
        0 => Err(EcommerceError::InsufficientStock { variant_id, requested: quantity }),
        _ => Ok(()),
    }
}
