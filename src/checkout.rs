//! Checkout: turns a user's cart into an order in one transaction.
//!
//! fetch -> reserve -> price -> discount -> materialize -> clear -> commit.
//! Every step runs on the same [`StoreTx`]; any failure drops it, which
//! rolls back stock decrements, the order, its lines and the cart clear.
//! Dropping the future mid-checkout (request deadline, client gone) drops the
//! transaction the same way.

use axum::{response::{IntoResponse, Response}, Json};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::cart;
use crate::domain::aggregates::{Order, OrderLineItem};
use crate::domain::value_objects::CouponCode;
use crate::error::EcommerceError;
use crate::orders;
use crate::pricing::{self, PriceSheet};
use crate::stock;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep { Fetch, Reserve, Price, Discount, Materialize, Clear, Commit }

impl CheckoutStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Reserve => "reserve",
            Self::Price => "price",
            Self::Discount => "discount",
            Self::Materialize => "materialize",
            Self::Clear => "clear",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Error)]
#[error("checkout failed at {step}: {error}")]
pub struct CheckoutFailure {
    pub step: CheckoutStep,
    #[source]
    pub error: EcommerceError,
}

fn at(step: CheckoutStep) -> impl FnOnce(EcommerceError) -> CheckoutFailure {
    move |error| CheckoutFailure { step, error }
}

impl IntoResponse for CheckoutFailure {
    fn into_response(self) -> Response {
        if let EcommerceError::Persistence(e) = &self.error {
            tracing::error!(error = %e, step = %self.step, "storage failure during checkout");
        }
        let body = serde_json::json!({
            "error": self.error.kind(),
            "step": self.step,
            "message": self.error.public_message(),
        });
        (self.error.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub coupon: Option<CouponCode>,
}

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

#[tracing::instrument(skip(store, req), fields(user_id = %req.user_id, address_id = %req.address_id))]
pub async fn checkout(store: &dyn Store, req: &CheckoutRequest) -> Result<Receipt, CheckoutFailure> {
    let outcome = run(store, req).await;
    match &outcome {
        Ok(receipt) => tracing::info!(order_id = %receipt.order.id, cost = receipt.order.cost, lines = receipt.items.len(), "order placed"),
        Err(failure) => tracing::warn!(step = %failure.step, error = %failure.error, "checkout aborted"),
    }
    outcome
}

async fn run(store: &dyn Store, req: &CheckoutRequest) -> Result<Receipt, CheckoutFailure> {
    let mut tx = store.begin().await.map_err(at(CheckoutStep::Fetch))?;

    if !tx.address_belongs_to(req.address_id, req.user_id).await.map_err(at(CheckoutStep::Fetch))? {
        return Err(at(CheckoutStep::Fetch)(EcommerceError::AddressNotFound(req.address_id)));
    }
    let mut items = tx.active_cart(req.user_id).await.map_err(at(CheckoutStep::Fetch))?;
    if items.is_empty() {
        return Err(at(CheckoutStep::Fetch)(EcommerceError::EmptyCart));
    }

    // Each decrement row-locks its variant until commit. Reserving in id order
    // keeps lock acquisition consistent across concurrent checkouts.
    items.sort_by_key(|item| item.variant_id);
    for item in &items {
        stock::decrement_stock(tx.as_mut(), item.variant_id, item.quantity).await.map_err(at(CheckoutStep::Reserve))?;
    }

    let prices = PriceSheet::load(tx.as_mut(), &items).await.map_err(at(CheckoutStep::Price))?;
    let subtotal = prices.total_cost(&items);

    let cost = match &req.coupon {
        Some(code) => pricing::apply_discount(tx.as_mut(), subtotal, code, Utc::now()).await.map_err(at(CheckoutStep::Discount))?,
        None => subtotal,
    };

    let order = orders::create_order(tx.as_mut(), req.user_id, req.address_id, subtotal, cost, req.coupon.as_ref())
        .await.map_err(at(CheckoutStep::Materialize))?;
    let lines = orders::add_line_items(tx.as_mut(), order.id, &items, &prices).await.map_err(at(CheckoutStep::Materialize))?;

    cart::clear(tx.as_mut(), req.user_id).await.map_err(at(CheckoutStep::Clear))?;

    tx.commit().await.map_err(at(CheckoutStep::Commit))?;
    Ok(Receipt { order, items: lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, tests::seed_variant, ProductFilter};
    use crate::domain::aggregates::{
        Address, Brand, CartItem, Category, DeliveryStatus, NewAddress, NewOffer, NewVariant, Offer, Product, ProductChanges,
        ProductListing, Variant,
    };
    use crate::domain::value_objects::Page;
    use crate::error::Result;
    use crate::store::{MemoryStore, StoreTx};
    use crate::address;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;

    async fn address_for(store: &MemoryStore, user_id: Uuid) -> Uuid {
        address::add_address(store, user_id, NewAddress {
            area: "12 Baker Street".into(), city: "London".into(), state: "Greater London".into(),
            zip_code: "NW16XE".into(), contact: "+447700900".into(),
        }).await.unwrap().id
    }

    async fn stock_of(store: &MemoryStore, variant: &Variant) -> i32 {
        store.find_variant(variant.id).await.unwrap().unwrap().stock
    }

    fn request(user_id: Uuid, address_id: Uuid, coupon: Option<&str>) -> CheckoutRequest {
        CheckoutRequest { user_id, address_id, coupon: coupon.map(|c| CouponCode::new(c).unwrap()) }
    }

    #[tokio::test]
    async fn test_single_item_checkout_without_coupon() {
        let store = MemoryStore::new();
        let v1 = seed_variant(&store, "Headphone", 100, 5).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        cart::add_item(&store, user, v1.id).await.unwrap();

        let receipt = checkout(&store, &request(user, addr, None)).await.unwrap();

        assert_eq!(receipt.order.cost, 100);
        assert_eq!(receipt.order.subtotal, 100);
        assert_eq!(receipt.order.delivery_status, DeliveryStatus::OnTheWay);
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(stock_of(&store, &v1).await, 4);
        assert!(cart::list_active(&store, user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_with_valid_coupon() {
        let store = MemoryStore::new();
        let v1 = seed_variant(&store, "Headphone", 100, 5).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        pricing::create_offer(&store, NewOffer {
            offer_name: "Ten off".into(), percent: 10, max_discount: 20, coupon_code: "TEN".into(),
            validity: Utc::now() + Duration::days(1), description: String::new(),
        }).await.unwrap();
        cart::add_item(&store, user, v1.id).await.unwrap();

        let receipt = checkout(&store, &request(user, addr, Some("TEN"))).await.unwrap();

        // 10% of 100 is 10, under the cap of 20
        assert_eq!(receipt.order.subtotal, 100);
        assert_eq!(receipt.order.cost, 90);
        assert_eq!(receipt.order.coupon_code.as_deref(), Some("TEN"));
        assert_eq!(stock_of(&store, &v1).await, 4);
    }

    #[tokio::test]
    async fn test_out_of_stock_leaves_everything_untouched() {
        let store = MemoryStore::new();
        let v2 = seed_variant(&store, "Sold out", 80, 0).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        cart::add_item(&store, user, v2.id).await.unwrap();

        let failure = checkout(&store, &request(user, addr, None)).await.unwrap_err();

        assert_eq!(failure.step, CheckoutStep::Reserve);
        assert!(matches!(failure.error, EcommerceError::InsufficientStock { .. }));
        assert_eq!(store.count_orders(user, DeliveryStatus::OnTheWay).await.unwrap(), 0);
        assert_eq!(cart::list_active(&store, user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_item_failure_rolls_back_first_decrement() {
        let store = MemoryStore::new();
        let a = seed_variant(&store, "Amp", 200, 3).await;
        let b = seed_variant(&store, "Cable", 10, 1).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        cart::add_item(&store, user, a.id).await.unwrap();
        cart::add_item(&store, user, b.id).await.unwrap();
        cart::update_count(&store, user, b.id, crate::domain::aggregates::CountChange::Increase).await.unwrap();

        let failure = checkout(&store, &request(user, addr, None)).await.unwrap_err();

        assert_eq!(failure.step, CheckoutStep::Reserve);
        assert_eq!(stock_of(&store, &a).await, 3);
        assert_eq!(stock_of(&store, &b).await, 1);
        assert_eq!(store.count_orders(user, DeliveryStatus::OnTheWay).await.unwrap(), 0);
        assert_eq!(cart::list_active(&store, user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expired_coupon_rolls_back_reservation() {
        let store = MemoryStore::new();
        let v1 = seed_variant(&store, "Headphone", 100, 5).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        pricing::create_offer(&store, NewOffer {
            offer_name: "Old".into(), percent: 50, max_discount: 1000, coupon_code: "OLD".into(),
            validity: Utc::now() - Duration::days(1), description: String::new(),
        }).await.unwrap();
        cart::add_item(&store, user, v1.id).await.unwrap();

        let failure = checkout(&store, &request(user, addr, Some("OLD"))).await.unwrap_err();
        assert_eq!(failure.step, CheckoutStep::Discount);
        assert!(matches!(failure.error, EcommerceError::CouponExpired { .. }));
        assert_eq!(stock_of(&store, &v1).await, 5);

        let failure = checkout(&store, &request(user, addr, Some("MISSING"))).await.unwrap_err();
        assert!(matches!(failure.error, EcommerceError::CouponLookupFailed { .. }));
        assert_eq!(stock_of(&store, &v1).await, 5);
        assert_eq!(cart::list_active(&store, user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cart_and_foreign_address_rejected() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;

        let failure = checkout(&store, &request(user, addr, None)).await.unwrap_err();
        assert!(matches!(failure.error, EcommerceError::EmptyCart));

        let stranger = Uuid::now_v7();
        let failure = checkout(&store, &request(stranger, addr, None)).await.unwrap_err();
        assert!(matches!(failure.error, EcommerceError::AddressNotFound(_)));
    }

    #[tokio::test]
    async fn test_subtotal_matches_line_items() {
        let store = MemoryStore::new();
        let a = seed_variant(&store, "Amp", 250, 10).await;
        let b = seed_variant(&store, "Cable", 15, 10).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        cart::add_item(&store, user, a.id).await.unwrap();
        cart::add_item(&store, user, b.id).await.unwrap();
        cart::add_item(&store, user, b.id).await.unwrap();

        let receipt = checkout(&store, &request(user, addr, None)).await.unwrap();

        let from_lines: i64 = receipt.items.iter().map(OrderLineItem::total).sum();
        assert_eq!(receipt.order.subtotal, 280);
        assert_eq!(from_lines, receipt.order.subtotal);
        assert_eq!(stock_of(&store, &b).await, 8);

        let history = orders::list_orders(&store, user, DeliveryStatus::OnTheWay, Page::default()).await.unwrap();
        assert_eq!(history.data[0].items.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_on_last_unit() {
        let store = MemoryStore::new();
        let last = seed_variant(&store, "Limited", 500, 1).await;
        let (alice, bob) = (Uuid::now_v7(), Uuid::now_v7());
        let (alice_addr, bob_addr) = (address_for(&store, alice).await, address_for(&store, bob).await);
        cart::add_item(&store, alice, last.id).await.unwrap();
        cart::add_item(&store, bob, last.id).await.unwrap();

        let (first, second) = (store.clone(), store.clone());
        let (ra, rb) = (request(alice, alice_addr, None), request(bob, bob_addr, None));
        let (a, b) = tokio::join!(
            tokio::spawn(async move { checkout(&first, &ra).await }),
            tokio::spawn(async move { checkout(&second, &rb).await }),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        let loser = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
        assert!(matches!(loser.error, EcommerceError::InsufficientStock { .. }));
        assert_eq!(stock_of(&store, &last).await, 0);
    }

    #[tokio::test]
    async fn test_archived_variant_in_cart_is_not_reserved() {
        let store = MemoryStore::new();
        let v1 = seed_variant(&store, "Headphone", 100, 5).await;
        let user = Uuid::now_v7();
        let addr = address_for(&store, user).await;
        cart::add_item(&store, user, v1.id).await.unwrap();
        catalog::delete_variant(&store, v1.product_id, v1.id).await.unwrap();

        let failure = checkout(&store, &request(user, addr, None)).await.unwrap_err();

        assert_eq!(failure.step, CheckoutStep::Reserve);
        assert!(matches!(failure.error, EcommerceError::InsufficientStock { .. }));
        assert_eq!(stock_of(&store, &v1).await, 5);
    }

    #[tokio::test]
    async fn test_failure_after_materialize_rolls_back_order_and_stock() {
        let store = FailingClear(MemoryStore::new());
        let a = seed_variant(&store, "Amp", 200, 3).await;
        let b = seed_variant(&store, "Cable", 10, 4).await;
        let user = Uuid::now_v7();
        let addr = address::add_address(&store, user, NewAddress {
            area: "1 Abbey Road".into(), city: "London".into(), state: "Greater London".into(),
            zip_code: "NW89AY".into(), contact: "+447700901".into(),
        }).await.unwrap().id;
        cart::add_item(&store, user, a.id).await.unwrap();
        cart::add_item(&store, user, b.id).await.unwrap();

        let failure = checkout(&store, &request(user, addr, None)).await.unwrap_err();

        assert_eq!(failure.step, CheckoutStep::Clear);
        assert!(matches!(failure.error, EcommerceError::Persistence(_)));
        assert_eq!(stock_of(&store.0, &a).await, 3);
        assert_eq!(stock_of(&store.0, &b).await, 4);
        assert_eq!(store.count_orders(user, DeliveryStatus::OnTheWay).await.unwrap(), 0);
        assert_eq!(cart::list_active(&store, user).await.unwrap().len(), 2);
    }

    /// Memory store whose transactions fail to clear the cart, i.e. after the
    /// order and its line items have been written.
    struct FailingClear(MemoryStore);

    struct FailingClearTx(Box<dyn StoreTx>);

    #[async_trait]
    impl Store for FailingClear {
        async fn begin(&self) -> Result<Box<dyn StoreTx>> { Ok(Box::new(FailingClearTx(self.0.begin().await?))) }
        async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>> { self.0.list_cart(user_id).await }
        async fn list_offers(&self) -> Result<Vec<Offer>> { self.0.list_offers().await }
        async fn search_products(&self, filter: &ProductFilter, page: Page) -> Result<Vec<ProductListing>> { self.0.search_products(filter, page).await }
        async fn count_products(&self, filter: &ProductFilter) -> Result<i64> { self.0.count_products(filter).await }
        async fn list_orders(&self, user_id: Uuid, status: DeliveryStatus, page: Page) -> Result<Vec<Order>> { self.0.list_orders(user_id, status, page).await }
        async fn count_orders(&self, user_id: Uuid, status: DeliveryStatus) -> Result<i64> { self.0.count_orders(user_id, status).await }
        async fn order_lines(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLineItem>> { self.0.order_lines(order_ids).await }
        async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> { self.0.find_variant(variant_id).await }
        async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> { self.0.find_product(product_id).await }
        async fn product_variants(&self, product_id: Uuid) -> Result<Vec<Variant>> { self.0.product_variants(product_id).await }
        async fn list_brands(&self, page: Page) -> Result<Vec<Brand>> { self.0.list_brands(page).await }
        async fn count_brands(&self) -> Result<i64> { self.0.count_brands().await }
        async fn list_categories(&self, page: Page) -> Result<Vec<Category>> { self.0.list_categories(page).await }
        async fn count_categories(&self) -> Result<i64> { self.0.count_categories().await }
    }

    #[async_trait]
    impl StoreTx for FailingClearTx {
        async fn archive_cart(&mut self, _user_id: Uuid) -> Result<u64> { Err(EcommerceError::Persistence(sqlx::Error::PoolTimedOut)) }

        async fn insert_brand(&mut self, brand: &Brand) -> Result<()> { self.0.insert_brand(brand).await }
        async fn insert_category(&mut self, category: &Category) -> Result<()> { self.0.insert_category(category).await }
        async fn insert_product(&mut self, product: &Product) -> Result<()> { self.0.insert_product(product).await }
        async fn brand_exists(&mut self, brand_id: Uuid) -> Result<bool> { self.0.brand_exists(brand_id).await }
        async fn category_exists(&mut self, category_id: Uuid) -> Result<bool> { self.0.category_exists(category_id).await }
        async fn product_exists(&mut self, product_id: Uuid) -> Result<bool> { self.0.product_exists(product_id).await }
        async fn insert_variant(&mut self, variant: &Variant) -> Result<()> { self.0.insert_variant(variant).await }
        async fn active_variant_exists(&mut self, variant_id: Uuid) -> Result<bool> { self.0.active_variant_exists(variant_id).await }
        async fn update_brand(&mut self, id: Uuid, name: &str) -> Result<Option<Brand>> { self.0.update_brand(id, name).await }
        async fn update_category(&mut self, id: Uuid, name: &str) -> Result<Option<Category>> { self.0.update_category(id, name).await }
        async fn update_product(&mut self, id: Uuid, changes: &ProductChanges) -> Result<Option<Product>> { self.0.update_product(id, changes).await }
        async fn update_variant(&mut self, product_id: Uuid, variant_id: Uuid, changes: &NewVariant) -> Result<Option<Variant>> {
            self.0.update_variant(product_id, variant_id, changes).await
        }
        async fn archive_brand(&mut self, id: Uuid) -> Result<u64> { self.0.archive_brand(id).await }
        async fn archive_category(&mut self, id: Uuid) -> Result<u64> { self.0.archive_category(id).await }
        async fn archive_product(&mut self, id: Uuid) -> Result<u64> { self.0.archive_product(id).await }
        async fn archive_variant(&mut self, product_id: Uuid, variant_id: Uuid) -> Result<u64> { self.0.archive_variant(product_id, variant_id).await }
        async fn insert_offer(&mut self, offer: &Offer) -> Result<()> { self.0.insert_offer(offer).await }
        async fn find_offer(&mut self, code: &str) -> Result<Option<Offer>> { self.0.find_offer(code).await }
        async fn insert_address(&mut self, address: &Address) -> Result<()> { self.0.insert_address(address).await }
        async fn address_belongs_to(&mut self, address_id: Uuid, user_id: Uuid) -> Result<bool> { self.0.address_belongs_to(address_id, user_id).await }
        async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem> { self.0.upsert_cart_item(item).await }
        async fn adjust_cart_quantity(&mut self, user_id: Uuid, variant_id: Uuid, delta: i32) -> Result<Option<i32>> {
            self.0.adjust_cart_quantity(user_id, variant_id, delta).await
        }
        async fn archive_cart_item(&mut self, user_id: Uuid, variant_id: Uuid) -> Result<u64> { self.0.archive_cart_item(user_id, variant_id).await }
        async fn active_cart(&mut self, user_id: Uuid) -> Result<Vec<CartItem>> { self.0.active_cart(user_id).await }
        async fn decrement_stock(&mut self, variant_id: Uuid, quantity: i32) -> Result<u64> { self.0.decrement_stock(variant_id, quantity).await }
        async fn variant_prices(&mut self, ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> { self.0.variant_prices(ids).await }
        async fn insert_order(&mut self, order: &Order) -> Result<()> { self.0.insert_order(order).await }
        async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> { self.0.insert_line_items(items).await }
        async fn commit(self: Box<Self>) -> Result<()> { self.0.commit().await }
    }
}
