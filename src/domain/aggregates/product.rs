//! Catalog records: brands, categories, products, variants and offers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Brand {
    pub id: Uuid,
    pub brand_name: String,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Brand {
    pub fn is_active(&self) -> bool { self.archived_at.is_none() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub category_name: String,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Category {
    pub fn is_active(&self) -> bool { self.archived_at.is_none() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub product_name: String,
    pub model_name: String,
    pub brand_id: Uuid,
    pub category_id: Uuid,
    pub return_days: i32,
    pub warranty_months: i32,
    pub wireless: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_active(&self) -> bool { self.archived_at.is_none() }
}

/// A purchasable configuration of a product with its own price and stock.
///
/// `stock` only ever moves through the stock ledger; `price` is read when an
/// order is priced and copied onto the order's line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub colour: String,
    pub price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Variant {
    pub fn is_active(&self) -> bool { self.archived_at.is_none() }
}

/// Coupon-backed discount rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub offer_name: String,
    pub percent: i32,
    pub max_discount: i64,
    pub coupon_code: String,
    pub validity: DateTime<Utc>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// A coupon is only usable strictly before its validity timestamp.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.validity <= now }
}

/// Flattened variant row returned by catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductListing {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub model_name: String,
    pub brand_name: String,
    pub category_name: String,
    pub colour: String,
    pub price: i64,
    pub stock: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBrand {
    #[validate(length(min = 1, max = 100))]
    pub brand_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100))]
    pub category_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewVariant {
    #[validate(length(min = 1, max = 50))]
    pub colour: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub stock: i32,
}

/// A product together with its first variant.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(length(min = 1, max = 200))]
    pub model_name: String,
    pub brand_id: Uuid,
    pub category_id: Uuid,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub return_days: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub warranty_months: i32,
    #[serde(default)]
    pub wireless: bool,
    #[validate]
    pub variant: NewVariant,
}

/// Editable product fields; brand and category are fixed at creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductChanges {
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(length(min = 1, max = 200))]
    pub model_name: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub return_days: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub warranty_months: i32,
    #[serde(default)]
    pub wireless: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOffer {
    #[validate(length(min = 1, max = 100))]
    pub offer_name: String,
    #[validate(range(min = 0, max = 100))]
    pub percent: i32,
    #[validate(range(min = 0))]
    pub max_discount: i64,
    #[validate(length(min = 1, max = 50))]
    pub coupon_code: String,
    pub validity: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}
