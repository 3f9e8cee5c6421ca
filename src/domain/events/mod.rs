//! Domain events published after a checkout commits.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderLineItem};

pub const ORDER_PLACED_SUBJECT: &str = "orders.placed";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, cost: i64, items: Vec<PlacedItem> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlacedItem { pub variant_id: Uuid, pub quantity: i32 }

impl OrderEvent {
    pub fn placed(order: &Order, lines: &[OrderLineItem]) -> Self {
        Self::Placed {
            order_id: order.id, user_id: order.user_id, cost: order.cost,
            items: lines.iter().map(|l| PlacedItem { variant_id: l.variant_id, quantity: l.quantity }).collect(),
        }
    }

    pub fn subject(&self) -> &'static str {
        match self { Self::Placed { .. } => ORDER_PLACED_SUBJECT }
    }
}

/// Best-effort publish; the order is already committed, so failures are only logged.
pub async fn publish(nats: Option<&async_nats::Client>, event: &OrderEvent) {
    let Some(client) = nats else { return };
    let payload = match serde_json::to_vec(event) {
        Ok(p) => p,
        Err(e) => { tracing::warn!(error = %e, "failed to encode order event"); return; }
    };
    if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
        tracing::warn!(error = %e, subject = event.subject(), "failed to publish order event");
    }
}
