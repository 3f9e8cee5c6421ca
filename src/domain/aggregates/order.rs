//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_id: Uuid,
    /// Sum of `unit_price * quantity` over the line items.
    pub subtotal: i64,
    /// Amount charged after any coupon.
    pub cost: i64,
    pub coupon_code: Option<String>,
    #[sqlx(try_from = "String")]
    pub delivery_status: DeliveryStatus,
    pub ordered_at: DateTime<Utc>,
}

impl Order {
    pub fn place(user_id: Uuid, address_id: Uuid, subtotal: i64, cost: i64, coupon_code: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(), user_id, address_id, subtotal, cost, coupon_code,
            delivery_status: DeliveryStatus::OnTheWay, ordered_at: Utc::now(),
        }
    }
    pub fn discount(&self) -> i64 { self.subtotal - self.cost }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

impl OrderLineItem {
    pub fn total(&self) -> i64 { self.unit_price * i64::from(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus { #[default] OnTheWay, Delivered, Canceled, Return }

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTheWay => "on_the_way",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown delivery status: {0}")]
pub struct UnknownDeliveryStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownDeliveryStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_the_way" => Ok(Self::OnTheWay),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            "return" => Ok(Self::Return),
            other => Err(UnknownDeliveryStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for DeliveryStatus {
    type Error = UnknownDeliveryStatus;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

/// Delivery address owned by a user; the target of a checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub area: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub contact: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewAddress {
    #[validate(length(min = 1, max = 200))]
    pub area: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub zip_code: String,
    #[validate(length(min = 5, max = 20))]
    pub contact: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_new_order_is_on_the_way() {
        let order = Order::place(Uuid::now_v7(), Uuid::now_v7(), 100, 90, Some("SAVE10".into()));
        assert_eq!(order.delivery_status, DeliveryStatus::OnTheWay);
        assert_eq!(order.discount(), 10);
    }
    #[test]
    fn test_delivery_status_parse() {
        for status in [DeliveryStatus::OnTheWay, DeliveryStatus::Delivered, DeliveryStatus::Canceled, DeliveryStatus::Return] {
            assert_eq!(status.as_str().parse::<DeliveryStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<DeliveryStatus>().is_err());
    }
}
