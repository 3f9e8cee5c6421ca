//! Cart store: per-user pending line items.

use uuid::Uuid;

use crate::domain::aggregates::{CartItem, CountChange};
use crate::error::{EcommerceError, Result};
use crate::store::{Store, StoreTx};

/// Adds one unit of the variant, merging into the active row if present.
#[tracing::instrument(skip(store))]
pub async fn add_item(store: &dyn Store, user_id: Uuid, variant_id: Uuid) -> Result<CartItem> {
    let mut tx = store.begin().await?;
    if !tx.active_variant_exists(variant_id).await? {
        return Err(EcommerceError::VariantNotFound(variant_id));
    }
    let item = tx.upsert_cart_item(&CartItem::new(user_id, variant_id, 1)).await?;
    tx.commit().await?;
    Ok(item)
}

/// Moves the active row's quantity by one unit and returns the new quantity.
///
/// Quantity never drops below one; removing the line is `remove_item`.
#[tracing::instrument(skip(store))]
pub async fn update_count(store: &dyn Store, user_id: Uuid, variant_id: Uuid, change: CountChange) -> Result<i32> {
    let mut tx = store.begin().await?;
    let quantity = tx.adjust_cart_quantity(user_id, variant_id, change.delta()).await?
        .ok_or(EcommerceError::CartItemNotFound { variant_id })?;
    if quantity < 1 {
        return Err(EcommerceError::InvalidQuantity(quantity));
    }
    tx.commit().await?;
    Ok(quantity)
}

#[tracing::instrument(skip(store))]
pub async fn remove_item(store: &dyn Store, user_id: Uuid, variant_id: Uuid) -> Result<()> {
    let mut tx = store.begin().await?;
    if tx.archive_cart_item(user_id, variant_id).await? == 0 {
        return Err(EcommerceError::CartItemNotFound { variant_id });
    }
    tx.commit().await
}

pub async fn list_active(store: &dyn Store, user_id: Uuid) -> Result<Vec<CartItem>> {
    store.list_cart(user_id).await
}

/// Archives every active row of the user inside the caller's transaction.
pub async fn clear(tx: &mut dyn StoreTx, user_id: Uuid) -> Result<u64> {
    tx.archive_cart(user_id).await
}

/// Explicit cart deletion outside of checkout.
#[tracing::instrument(skip(store))]
pub async fn delete_cart(store: &dyn Store, user_id: Uuid) -> Result<u64> {
    let mut tx = store.begin().await?;
    let cleared = clear(tx.as_mut(), user_id).await?;
    tx.commit().await?;
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::seed_variant;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_add_twice_merges_into_one_row() {
        let store = MemoryStore::new();
        let variant = seed_variant(&store, "DAC", 300, 10).await;
        let user = Uuid::now_v7();

        add_item(&store, user, variant.id).await.unwrap();
        let item = add_item(&store, user, variant.id).await.unwrap();
        assert_eq!(item.quantity, 2);

        let items = list_active(&store, user).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_add_unknown_variant() {
        let store = MemoryStore::new();
        let err = add_item(&store, Uuid::now_v7(), Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, EcommerceError::VariantNotFound(_)));
    }

    #[tokio::test]
    async fn test_add_archived_variant() {
        let store = MemoryStore::new();
        let variant = seed_variant(&store, "DAC", 300, 10).await;
        crate::catalog::delete_variant(&store, variant.product_id, variant.id).await.unwrap();

        let err = add_item(&store, Uuid::now_v7(), variant.id).await.unwrap_err();
        assert!(matches!(err, EcommerceError::VariantNotFound(id) if id == variant.id));
    }

    #[tokio::test]
    async fn test_update_count_floor_at_one() {
        let store = MemoryStore::new();
        let variant = seed_variant(&store, "DAC", 300, 10).await;
        let user = Uuid::now_v7();
        add_item(&store, user, variant.id).await.unwrap();

        assert_eq!(update_count(&store, user, variant.id, CountChange::Increase).await.unwrap(), 2);
        assert_eq!(update_count(&store, user, variant.id, CountChange::Decrease).await.unwrap(), 1);
        let err = update_count(&store, user, variant.id, CountChange::Decrease).await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidQuantity(0)));
        // the failed decrement rolled back
        assert_eq!(list_active(&store, user).await.unwrap()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_update_count_missing_item() {
        let store = MemoryStore::new();
        let err = update_count(&store, Uuid::now_v7(), Uuid::now_v7(), CountChange::Increase).await.unwrap_err();
        assert!(matches!(err, EcommerceError::CartItemNotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_then_readd_starts_fresh() {
        let store = MemoryStore::new();
        let variant = seed_variant(&store, "DAC", 300, 10).await;
        let user = Uuid::now_v7();
        add_item(&store, user, variant.id).await.unwrap();
        add_item(&store, user, variant.id).await.unwrap();

        remove_item(&store, user, variant.id).await.unwrap();
        assert!(list_active(&store, user).await.unwrap().is_empty());
        assert!(matches!(remove_item(&store, user, variant.id).await, Err(EcommerceError::CartItemNotFound { .. })));

        assert_eq!(add_item(&store, user, variant.id).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_delete_cart_only_touches_owner() {
        let store = MemoryStore::new();
        let variant = seed_variant(&store, "DAC", 300, 10).await;
        let (alice, bob) = (Uuid::now_v7(), Uuid::now_v7());
        add_item(&store, alice, variant.id).await.unwrap();
        add_item(&store, bob, variant.id).await.unwrap();

        assert_eq!(delete_cart(&store, alice).await.unwrap(), 1);
        assert!(list_active(&store, alice).await.unwrap().is_empty());
        assert_eq!(list_active(&store, bob).await.unwrap().len(), 1);
    }
}
