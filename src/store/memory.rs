//! In-process backend.
//!
//! A transaction owns the store-wide lock for its whole lifetime and mutates a
//! copy of the state; commit swaps the copy in, drop discards it. Transactions
//! are therefore serialized, which is stronger than the row locks Postgres
//! takes for the same operations.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::catalog::ProductFilter;
use crate::domain::aggregates::{
    Address, Brand, CartItem, Category, DeliveryStatus, NewVariant, Offer, Order, OrderLineItem, Product, ProductChanges,
    ProductListing, Variant,
};
use crate::domain::value_objects::Page;
use crate::error::{EcommerceError, Result};

#[derive(Clone, Debug, Default)]
struct State {
    brands: HashMap<Uuid, Brand>,
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, Variant>,
    offers: Vec<Offer>,
    addresses: HashMap<Uuid, Address>,
    cart: Vec<CartItem>,
    orders: Vec<Order>,
    line_items: Vec<OrderLineItem>,
}

impl State {
    fn listings(&self, filter: &ProductFilter) -> Vec<ProductListing> {
        let mut rows: Vec<ProductListing> = self.variants.values()
            .filter(|v| v.is_active())
            .filter_map(|v| {
                let p = self.products.get(&v.product_id).filter(|p| p.is_active())?;
                let b = self.brands.get(&p.brand_id)?;
                let c = self.categories.get(&p.category_id)?;
                Some(ProductListing {
                    variant_id: v.id, product_id: p.id, product_name: p.product_name.clone(), model_name: p.model_name.clone(),
                    brand_name: b.brand_name.clone(), category_name: c.category_name.clone(),
                    colour: v.colour.clone(), price: v.price, stock: v.stock,
                })
            })
            .filter(|l| filter.matches(l))
            .collect();
        rows.sort_by(|a, b| (&a.product_name, &a.colour).cmp(&(&b.product_name, &b.colour)));
        rows
    }

    fn active_brands(&self) -> Vec<&Brand> {
        let mut brands: Vec<&Brand> = self.brands.values().filter(|b| b.is_active()).collect();
        brands.sort_by(|a, b| a.brand_name.cmp(&b.brand_name));
        brands
    }

    fn active_categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.categories.values().filter(|c| c.is_active()).collect();
        categories.sort_by(|a, b| a.category_name.cmp(&b.category_name));
        categories
    }

    fn user_orders(&self, user_id: Uuid, status: DeliveryStatus) -> impl Iterator<Item = &Order> {
        self.orders.iter().rev().filter(move |o| o.user_id == user_id && o.delivery_status == status)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore { state: Arc<Mutex<State>> }

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn window<T>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.offset() as usize).take(page.limit() as usize).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
        let state = self.state.lock().await;
        Ok(state.cart.iter().filter(|i| i.is_active() && i.user_id == user_id).cloned().collect())
    }

    async fn list_offers(&self) -> Result<Vec<Offer>> {
        let state = self.state.lock().await;
        let mut offers = state.offers.clone();
        offers.sort_by(|a, b| b.validity.cmp(&a.validity));
        Ok(offers)
    }

    async fn search_products(&self, filter: &ProductFilter, page: Page) -> Result<Vec<ProductListing>> {
        let state = self.state.lock().await;
        Ok(window(state.listings(filter).into_iter(), page))
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.listings(filter).len() as i64)
    }

    async fn list_orders(&self, user_id: Uuid, status: DeliveryStatus, page: Page) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(window(state.user_orders(user_id, status).cloned(), page))
    }

    async fn count_orders(&self, user_id: Uuid, status: DeliveryStatus) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.user_orders(user_id, status).count() as i64)
    }

    async fn order_lines(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLineItem>> {
        let state = self.state.lock().await;
        Ok(state.line_items.iter().filter(|l| order_ids.contains(&l.order_id)).cloned().collect())
    }

    async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> {
        let state = self.state.lock().await;
        Ok(state.variants.get(&variant_id).cloned())
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.get(&product_id).filter(|p| p.is_active()).cloned())
    }

    async fn product_variants(&self, product_id: Uuid) -> Result<Vec<Variant>> {
        let state = self.state.lock().await;
        let mut variants: Vec<Variant> = state.variants.values()
            .filter(|v| v.product_id == product_id && v.is_active())
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.colour.cmp(&b.colour));
        Ok(variants)
    }

    async fn list_brands(&self, page: Page) -> Result<Vec<Brand>> {
        let state = self.state.lock().await;
        Ok(window(state.active_brands().into_iter().cloned(), page))
    }

    async fn count_brands(&self) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.active_brands().len() as i64)
    }

    async fn list_categories(&self, page: Page) -> Result<Vec<Category>> {
        let state = self.state.lock().await;
        Ok(window(state.active_categories().into_iter().cloned(), page))
    }

    async fn count_categories(&self) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.active_categories().len() as i64)
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

impl MemoryTx {
    fn active_cart_item(&mut self, user_id: Uuid, variant_id: Uuid) -> Option<&mut CartItem> {
        self.working.cart.iter_mut().find(|i| i.is_active() && i.belongs_to(user_id, variant_id))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_brand(&mut self, brand: &Brand) -> Result<()> {
        self.working.brands.insert(brand.id, brand.clone());
        Ok(())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<()> {
        self.working.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn brand_exists(&mut self, brand_id: Uuid) -> Result<bool> {
        Ok(self.working.brands.get(&brand_id).is_some_and(Brand::is_active))
    }

    async fn category_exists(&mut self, category_id: Uuid) -> Result<bool> {
        Ok(self.working.categories.get(&category_id).is_some_and(Category::is_active))
    }

    async fn product_exists(&mut self, product_id: Uuid) -> Result<bool> {
        Ok(self.working.products.get(&product_id).is_some_and(Product::is_active))
    }

    async fn insert_variant(&mut self, variant: &Variant) -> Result<()> {
        self.working.variants.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn active_variant_exists(&mut self, variant_id: Uuid) -> Result<bool> {
        Ok(self.working.variants.get(&variant_id).is_some_and(Variant::is_active))
    }

    async fn update_brand(&mut self, brand_id: Uuid, brand_name: &str) -> Result<Option<Brand>> {
        Ok(self.working.brands.get_mut(&brand_id).filter(|b| b.is_active()).map(|b| {
            b.brand_name = brand_name.to_string();
            b.clone()
        }))
    }

    async fn update_category(&mut self, category_id: Uuid, category_name: &str) -> Result<Option<Category>> {
        Ok(self.working.categories.get_mut(&category_id).filter(|c| c.is_active()).map(|c| {
            c.category_name = category_name.to_string();
            c.clone()
        }))
    }

    async fn update_product(&mut self, product_id: Uuid, changes: &ProductChanges) -> Result<Option<Product>> {
        Ok(self.working.products.get_mut(&product_id).filter(|p| p.is_active()).map(|p| {
            p.product_name = changes.product_name.clone();
            p.model_name = changes.model_name.clone();
            p.return_days = changes.return_days;
            p.warranty_months = changes.warranty_months;
            p.wireless = changes.wireless;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn update_variant(&mut self, product_id: Uuid, variant_id: Uuid, changes: &NewVariant) -> Result<Option<Variant>> {
        Ok(self.working.variants.get_mut(&variant_id).filter(|v| v.is_active() && v.product_id == product_id).map(|v| {
            v.colour = changes.colour.clone();
            v.price = changes.price;
            v.stock = changes.stock;
            v.updated_at = Utc::now();
            v.clone()
        }))
    }

    async fn archive_brand(&mut self, brand_id: Uuid) -> Result<u64> {
        match self.working.brands.get_mut(&brand_id).filter(|b| b.is_active()) {
            Some(b) => { b.archived_at = Some(Utc::now()); Ok(1) }
            None => Ok(0),
        }
    }

    async fn archive_category(&mut self, category_id: Uuid) -> Result<u64> {
        match self.working.categories.get_mut(&category_id).filter(|c| c.is_active()) {
            Some(c) => { c.archived_at = Some(Utc::now()); Ok(1) }
            None => Ok(0),
        }
    }

    async fn archive_product(&mut self, product_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        match self.working.products.get_mut(&product_id).filter(|p| p.is_active()) {
            Some(p) => p.archived_at = Some(now),
            None => return Ok(0),
        }
        for v in self.working.variants.values_mut().filter(|v| v.product_id == product_id && v.is_active()) {
            v.archived_at = Some(now);
        }
        Ok(1)
    }

    async fn archive_variant(&mut self, product_id: Uuid, variant_id: Uuid) -> Result<u64> {
        match self.working.variants.get_mut(&variant_id).filter(|v| v.is_active() && v.product_id == product_id) {
            Some(v) => { v.archived_at = Some(Utc::now()); Ok(1) }
            None => Ok(0),
        }
    }

    async fn insert_offer(&mut self, offer: &Offer) -> Result<()> {
        if self.working.offers.iter().any(|o| o.coupon_code == offer.coupon_code) {
            return Err(EcommerceError::CouponCodeTaken { code: offer.coupon_code.clone() });
        }
        self.working.offers.push(offer.clone());
        Ok(())
    }

    async fn find_offer(&mut self, coupon_code: &str) -> Result<Option<Offer>> {
        Ok(self.working.offers.iter().find(|o| o.coupon_code == coupon_code).cloned())
    }

    async fn insert_address(&mut self, address: &Address) -> Result<()> {
        self.working.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn address_belongs_to(&mut self, address_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.working.addresses.get(&address_id).is_some_and(|a| a.user_id == user_id))
    }

    async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem> {
        if let Some(existing) = self.active_cart_item(item.user_id, item.variant_id) {
            existing.quantity += item.quantity;
            existing.updated_at = item.updated_at;
            return Ok(existing.clone());
        }
        self.working.cart.push(item.clone());
        Ok(item.clone())
    }

    async fn adjust_cart_quantity(&mut self, user_id: Uuid, variant_id: Uuid, delta: i32) -> Result<Option<i32>> {
        Ok(self.active_cart_item(user_id, variant_id).map(|item| {
            item.quantity += delta;
            item.updated_at = Utc::now();
            item.quantity
        }))
    }

    async fn archive_cart_item(&mut self, user_id: Uuid, variant_id: Uuid) -> Result<u64> {
        match self.active_cart_item(user_id, variant_id) {
            Some(item) => { item.archive(Utc::now()); Ok(1) }
            None => Ok(0),
        }
    }

    async fn active_cart(&mut self, user_id: Uuid) -> Result<Vec<CartItem>> {
        Ok(self.working.cart.iter().filter(|i| i.is_active() && i.user_id == user_id).cloned().collect())
    }

    async fn archive_cart(&mut self, user_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut archived = 0;
        for item in self.working.cart.iter_mut().filter(|i| i.is_active() && i.user_id == user_id) {
            item.archive(now);
            archived += 1;
        }
        Ok(archived)
    }

    async fn decrement_stock(&mut self, variant_id: Uuid, quantity: i32) -> Result<u64> {
        match self.working.variants.get_mut(&variant_id) {
            Some(v) if v.is_active() && v.stock >= quantity => {
                v.stock -= quantity;
                v.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn variant_prices(&mut self, variant_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        Ok(variant_ids.iter().filter_map(|id| self.working.variants.get(id).map(|v| (*id, v.price))).collect())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.push(order.clone());
        Ok(())
    }

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> {
        self.working.line_items.extend_from_slice(items);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
