//! Order assembler and order history.

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::Paginated;
use crate::domain::aggregates::{CartItem, DeliveryStatus, Order, OrderLineItem};
use crate::domain::value_objects::{CouponCode, Page};
use crate::error::Result;
use crate::pricing::PriceSheet;
use crate::store::{Store, StoreTx};

/// Inserts a new order, delivery status "on the way".
pub async fn create_order(
    tx: &mut dyn StoreTx,
    user_id: Uuid,
    address_id: Uuid,
    subtotal: i64,
    cost: i64,
    coupon: Option<&CouponCode>,
) -> Result<Order> {
    let order = Order::place(user_id, address_id, subtotal, cost, coupon.map(|c| c.as_str().to_string()));
    tx.insert_order(&order).await?;
    Ok(order)
}

/// One line per cart item, copying variant, quantity and the unit price used
/// to compute the order subtotal.
pub async fn add_line_items(tx: &mut dyn StoreTx, order_id: Uuid, items: &[CartItem], prices: &PriceSheet) -> Result<Vec<OrderLineItem>> {
    let lines: Vec<OrderLineItem> = items.iter()
        .map(|item| OrderLineItem {
            id: Uuid::now_v7(), order_id, variant_id: item.variant_id, quantity: item.quantity,
            unit_price: prices.unit_price(item.variant_id),
        })
        .collect();
    tx.insert_line_items(&lines).await?;
    Ok(lines)
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// A page of the user's orders in one delivery status, newest first, with
/// their line items. Page and total count are fetched concurrently.
#[tracing::instrument(skip(store))]
pub async fn list_orders(store: &dyn Store, user_id: Uuid, status: DeliveryStatus, page: Page) -> Result<Paginated<OrderWithItems>> {
    let (orders, total) = tokio::try_join!(store.list_orders(user_id, status, page), store.count_orders(user_id, status))?;
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut lines: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
    if !ids.is_empty() {
        for line in store.order_lines(&ids).await? {
            lines.entry(line.order_id).or_default().push(line);
        }
    }
    let data = orders.into_iter()
        .map(|order| { let items = lines.remove(&order.id).unwrap_or_default(); OrderWithItems { order, items } })
        .collect();
    Ok(Paginated { data, total, page: page.page() })
}
