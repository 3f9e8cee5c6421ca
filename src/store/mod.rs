//! Storage seam.
//!
//! [`Store`] serves pool-level reads and opens transactions; every write and
//! every checkout step goes through a [`StoreTx`]. A transaction dropped
//! without [`StoreTx::commit`] is rolled back. Methods report raw outcomes
//! (affected rows, `Option`s) and leave their interpretation to the services.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::ProductFilter;
use crate::domain::aggregates::{
    Address, Brand, CartItem, Category, DeliveryStatus, NewVariant, Offer, Order, OrderLineItem, Product, ProductChanges,
    ProductListing, Variant,
};
use crate::domain::value_objects::Page;
use crate::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>>;
    async fn list_offers(&self) -> Result<Vec<Offer>>;
    async fn search_products(&self, filter: &ProductFilter, page: Page) -> Result<Vec<ProductListing>>;
    async fn count_products(&self, filter: &ProductFilter) -> Result<i64>;
    async fn list_orders(&self, user_id: Uuid, status: DeliveryStatus, page: Page) -> Result<Vec<Order>>;
    async fn count_orders(&self, user_id: Uuid, status: DeliveryStatus) -> Result<i64>;
    async fn order_lines(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLineItem>>;
    async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>>;

    /// Active product by id.
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>>;
    /// Active variants of a product, ordered by colour.
    async fn product_variants(&self, product_id: Uuid) -> Result<Vec<Variant>>;
    async fn list_brands(&self, page: Page) -> Result<Vec<Brand>>;
    async fn count_brands(&self) -> Result<i64>;
    async fn list_categories(&self, page: Page) -> Result<Vec<Category>>;
    async fn count_categories(&self) -> Result<i64>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn insert_brand(&mut self, brand: &Brand) -> Result<()>;
    async fn insert_category(&mut self, category: &Category) -> Result<()>;
    async fn insert_product(&mut self, product: &Product) -> Result<()>;
    async fn brand_exists(&mut self, brand_id: Uuid) -> Result<bool>;
    async fn category_exists(&mut self, category_id: Uuid) -> Result<bool>;
    async fn product_exists(&mut self, product_id: Uuid) -> Result<bool>;
    async fn insert_variant(&mut self, variant: &Variant) -> Result<()>;
    async fn active_variant_exists(&mut self, variant_id: Uuid) -> Result<bool>;

    // Catalog edits only touch active rows; `None` / 0 means no such row.
    async fn update_brand(&mut self, brand_id: Uuid, brand_name: &str) -> Result<Option<Brand>>;
    async fn update_category(&mut self, category_id: Uuid, category_name: &str) -> Result<Option<Category>>;
    async fn update_product(&mut self, product_id: Uuid, changes: &ProductChanges) -> Result<Option<Product>>;
    async fn update_variant(&mut self, product_id: Uuid, variant_id: Uuid, changes: &NewVariant) -> Result<Option<Variant>>;
    async fn archive_brand(&mut self, brand_id: Uuid) -> Result<u64>;
    async fn archive_category(&mut self, category_id: Uuid) -> Result<u64>;
    /// Archives the product and every active variant under it.
    async fn archive_product(&mut self, product_id: Uuid) -> Result<u64>;
    async fn archive_variant(&mut self, product_id: Uuid, variant_id: Uuid) -> Result<u64>;

    /// Fails with `CouponCodeTaken` when an active offer already uses the code.
    async fn insert_offer(&mut self, offer: &Offer) -> Result<()>;
    async fn find_offer(&mut self, coupon_code: &str) -> Result<Option<Offer>>;
    async fn insert_address(&mut self, address: &Address) -> Result<()>;
    async fn address_belongs_to(&mut self, address_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Inserts the item or, when an active row for the same user and variant
    /// exists, adds `item.quantity` to it. Returns the stored row.
    async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem>;
    /// Adds `delta` to the active row's quantity and returns the new value.
    async fn adjust_cart_quantity(&mut self, user_id: Uuid, variant_id: Uuid, delta: i32) -> Result<Option<i32>>;
    async fn archive_cart_item(&mut self, user_id: Uuid, variant_id: Uuid) -> Result<u64>;
    /// Active cart rows, locked for the rest of the transaction.
    async fn active_cart(&mut self, user_id: Uuid) -> Result<Vec<CartItem>>;
    async fn archive_cart(&mut self, user_id: Uuid) -> Result<u64>;

    /// Guarded `stock = stock - quantity` on an active variant with enough
    /// stock. Returns the affected row count (0 or 1).
    async fn decrement_stock(&mut self, variant_id: Uuid, quantity: i32) -> Result<u64>;
    async fn variant_prices(&mut self, variant_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>>;

    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
