//! Postgres backend.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::catalog::ProductFilter;
use crate::domain::aggregates::{
    Address, Brand, CartItem, Category, DeliveryStatus, NewVariant, Offer, Order, OrderLineItem, Product, ProductChanges,
    ProductListing, Variant,
};
use crate::domain::value_objects::Page;
use crate::error::{EcommerceError, Result};

const LISTING_FROM: &str = "FROM variants v \
    JOIN products p ON p.id = v.product_id \
    JOIN brands b ON b.id = p.brand_id \
    JOIN categories c ON c.id = p.category_id \
    WHERE v.archived_at IS NULL AND p.archived_at IS NULL";

#[derive(Clone, Debug)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

const OFFER_COLUMNS: &str = "id, offer_name, percent, max_discount, coupon_code, validity, description, created_at";

/// Escapes `LIKE` metacharacters so user input only ever matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    e.as_database_error().and_then(|db| db.constraint()) == Some(constraint)
}

/// Appends the optional filters to a query that already has a `WHERE` clause.
/// Each call works on a builder owned by the current request.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(search) = filter.search() {
        qb.push(" AND p.product_name ILIKE ").push_bind(format!("%{}%", escape_like(search))).push(" ESCAPE '\\'");
    }
    if let Some(category) = filter.category() {
        qb.push(" AND c.category_name = ").push_bind(category.to_string());
    }
    if let Some(brand) = filter.brand() {
        qb.push(" AND b.brand_name = ").push_bind(brand.to_string());
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(PgTx { tx: self.pool.begin().await? }))
    }

    async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1 AND archived_at IS NULL ORDER BY created_at")
            .bind(user_id).fetch_all(&self.pool).await?;
        Ok(items)
    }

    async fn list_offers(&self) -> Result<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE archived_at IS NULL ORDER BY validity DESC"))
            .fetch_all(&self.pool).await?;
        Ok(offers)
    }

    async fn search_products(&self, filter: &ProductFilter, page: Page) -> Result<Vec<ProductListing>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT v.id AS variant_id, p.id AS product_id, p.product_name, p.model_name, b.brand_name, c.category_name, v.colour, v.price, v.stock ",
        );
        qb.push(LISTING_FROM);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY p.product_name, v.colour LIMIT ").push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ").push_bind(page.offset() as i64);
        let rows = qb.build_query_as::<ProductListing>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) ");
        qb.push(LISTING_FROM);
        push_filters(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn list_orders(&self, user_id: Uuid, status: DeliveryStatus, page: Page) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 AND delivery_status = $2 ORDER BY ordered_at DESC LIMIT $3 OFFSET $4")
            .bind(user_id).bind(status.as_str()).bind(i64::from(page.limit())).bind(page.offset() as i64)
            .fetch_all(&self.pool).await?;
        Ok(orders)
    }

    async fn count_orders(&self, user_id: Uuid, status: DeliveryStatus) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1 AND delivery_status = $2")
            .bind(user_id).bind(status.as_str()).fetch_one(&self.pool).await?;
        Ok(total.0)
    }

    async fn order_lines(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLineItem>> {
        let lines = sqlx::query_as::<_, OrderLineItem>("SELECT * FROM order_line_items WHERE order_id = ANY($1)")
            .bind(order_ids.to_vec()).fetch_all(&self.pool).await?;
        Ok(lines)
    }

    async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>("SELECT * FROM variants WHERE id = $1")
            .bind(variant_id).fetch_optional(&self.pool).await?;
        Ok(variant)
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND archived_at IS NULL")
            .bind(product_id).fetch_optional(&self.pool).await?;
        Ok(product)
    }

    async fn product_variants(&self, product_id: Uuid) -> Result<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>("SELECT * FROM variants WHERE product_id = $1 AND archived_at IS NULL ORDER BY colour")
            .bind(product_id).fetch_all(&self.pool).await?;
        Ok(variants)
    }

    async fn list_brands(&self, page: Page) -> Result<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE archived_at IS NULL ORDER BY brand_name LIMIT $1 OFFSET $2")
            .bind(i64::from(page.limit())).bind(page.offset() as i64)
            .fetch_all(&self.pool).await?;
        Ok(brands)
    }

    async fn count_brands(&self) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM brands WHERE archived_at IS NULL").fetch_one(&self.pool).await?;
        Ok(total.0)
    }

    async fn list_categories(&self, page: Page) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE archived_at IS NULL ORDER BY category_name LIMIT $1 OFFSET $2")
            .bind(i64::from(page.limit())).bind(page.offset() as i64)
            .fetch_all(&self.pool).await?;
        Ok(categories)
    }

    async fn count_categories(&self) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories WHERE archived_at IS NULL").fetch_one(&self.pool).await?;
        Ok(total.0)
    }
}

pub struct PgTx { tx: Transaction<'static, Postgres> }

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_brand(&mut self, brand: &Brand) -> Result<()> {
        sqlx::query("INSERT INTO brands (id, brand_name, created_at) VALUES ($1, $2, $3)")
            .bind(brand.id).bind(&brand.brand_name).bind(brand.created_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, category_name, created_at) VALUES ($1, $2, $3)")
            .bind(category.id).bind(&category.category_name).bind(category.created_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_product(&mut self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, product_name, model_name, brand_id, category_id, return_days, warranty_months, wireless, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)")
            .bind(p.id).bind(&p.product_name).bind(&p.model_name).bind(p.brand_id).bind(p.category_id)
            .bind(p.return_days).bind(p.warranty_months).bind(p.wireless).bind(p.created_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn brand_exists(&mut self, brand_id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM brands WHERE id = $1 AND archived_at IS NULL")
            .bind(brand_id).fetch_optional(&mut *self.tx).await?;
        Ok(found.is_some())
    }

    async fn category_exists(&mut self, category_id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1 AND archived_at IS NULL")
            .bind(category_id).fetch_optional(&mut *self.tx).await?;
        Ok(found.is_some())
    }

    async fn product_exists(&mut self, product_id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 AND archived_at IS NULL")
            .bind(product_id).fetch_optional(&mut *self.tx).await?;
        Ok(found.is_some())
    }

    async fn insert_variant(&mut self, v: &Variant) -> Result<()> {
        sqlx::query("INSERT INTO variants (id, product_id, colour, price, stock, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(v.id).bind(v.product_id).bind(&v.colour).bind(v.price).bind(v.stock).bind(v.created_at).bind(v.updated_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn active_variant_exists(&mut self, variant_id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM variants WHERE id = $1 AND archived_at IS NULL")
            .bind(variant_id).fetch_optional(&mut *self.tx).await?;
        Ok(found.is_some())
    }

    async fn update_brand(&mut self, brand_id: Uuid, brand_name: &str) -> Result<Option<Brand>> {
        let brand = sqlx::query_as::<_, Brand>("UPDATE brands SET brand_name = $2 WHERE id = $1 AND archived_at IS NULL RETURNING *")
            .bind(brand_id).bind(brand_name).fetch_optional(&mut *self.tx).await?;
        Ok(brand)
    }

    async fn update_category(&mut self, category_id: Uuid, category_name: &str) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("UPDATE categories SET category_name = $2 WHERE id = $1 AND archived_at IS NULL RETURNING *")
            .bind(category_id).bind(category_name).fetch_optional(&mut *self.tx).await?;
        Ok(category)
    }

    async fn update_product(&mut self, product_id: Uuid, c: &ProductChanges) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET product_name = $2, model_name = $3, return_days = $4, warranty_months = $5, wireless = $6, updated_at = NOW() \
             WHERE id = $1 AND archived_at IS NULL RETURNING *",
        )
        .bind(product_id).bind(&c.product_name).bind(&c.model_name).bind(c.return_days).bind(c.warranty_months).bind(c.wireless)
        .fetch_optional(&mut *self.tx).await?;
        Ok(product)
    }

    async fn update_variant(&mut self, product_id: Uuid, variant_id: Uuid, c: &NewVariant) -> Result<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            "UPDATE variants SET colour = $3, price = $4, stock = $5, updated_at = NOW() \
             WHERE id = $2 AND product_id = $1 AND archived_at IS NULL RETURNING *",
        )
        .bind(product_id).bind(variant_id).bind(&c.colour).bind(c.price).bind(c.stock)
        .fetch_optional(&mut *self.tx).await?;
        Ok(variant)
    }

    async fn archive_brand(&mut self, brand_id: Uuid) -> Result<u64> {
        let done = sqlx::query("UPDATE brands SET archived_at = NOW() WHERE id = $1 AND archived_at IS NULL")
            .bind(brand_id).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn archive_category(&mut self, category_id: Uuid) -> Result<u64> {
        let done = sqlx::query("UPDATE categories SET archived_at = NOW() WHERE id = $1 AND archived_at IS NULL")
            .bind(category_id).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn archive_product(&mut self, product_id: Uuid) -> Result<u64> {
        let done = sqlx::query("UPDATE products SET archived_at = NOW() WHERE id = $1 AND archived_at IS NULL")
            .bind(product_id).execute(&mut *self.tx).await?;
        if done.rows_affected() > 0 {
            sqlx::query("UPDATE variants SET archived_at = NOW() WHERE product_id = $1 AND archived_at IS NULL")
                .bind(product_id).execute(&mut *self.tx).await?;
        }
        Ok(done.rows_affected())
    }

    async fn archive_variant(&mut self, product_id: Uuid, variant_id: Uuid) -> Result<u64> {
        let done = sqlx::query("UPDATE variants SET archived_at = NOW() WHERE id = $2 AND product_id = $1 AND archived_at IS NULL")
            .bind(product_id).bind(variant_id).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn insert_offer(&mut self, o: &Offer) -> Result<()> {
        sqlx::query(&format!("INSERT INTO offers ({OFFER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"))
            .bind(o.id).bind(&o.offer_name).bind(o.percent).bind(o.max_discount).bind(&o.coupon_code)
            .bind(o.validity).bind(&o.description).bind(o.created_at)
            .execute(&mut *self.tx).await
            .map_err(|e| {
                if is_unique_violation(&e, "offers_active_coupon_code") {
                    EcommerceError::CouponCodeTaken { code: o.coupon_code.clone() }
                } else {
                    EcommerceError::from(e)
                }
            })?;
        Ok(())
    }

    async fn find_offer(&mut self, coupon_code: &str) -> Result<Option<Offer>> {
        let offer = sqlx::query_as::<_, Offer>(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE coupon_code = $1 AND archived_at IS NULL"))
            .bind(coupon_code).fetch_optional(&mut *self.tx).await?;
        Ok(offer)
    }

    async fn insert_address(&mut self, a: &Address) -> Result<()> {
        sqlx::query("INSERT INTO addresses (id, user_id, area, city, state, zip_code, contact, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(a.id).bind(a.user_id).bind(&a.area).bind(&a.city).bind(&a.state).bind(&a.zip_code).bind(&a.contact).bind(a.created_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn address_belongs_to(&mut self, address_id: Uuid, user_id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM addresses WHERE id = $1 AND user_id = $2 AND archived_at IS NULL")
            .bind(address_id).bind(user_id).fetch_optional(&mut *self.tx).await?;
        Ok(found.is_some())
    }

    async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem> {
        let stored = sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (id, user_id, variant_id, quantity, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $5) \
             ON CONFLICT (user_id, variant_id) WHERE archived_at IS NULL \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = EXCLUDED.updated_at RETURNING *",
        )
        .bind(item.id).bind(item.user_id).bind(item.variant_id).bind(item.quantity).bind(item.created_at)
        .fetch_one(&mut *self.tx).await?;
        Ok(stored)
    }

    async fn adjust_cart_quantity(&mut self, user_id: Uuid, variant_id: Uuid, delta: i32) -> Result<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE cart_items SET quantity = quantity + $3, updated_at = NOW() \
             WHERE user_id = $1 AND variant_id = $2 AND archived_at IS NULL RETURNING quantity",
        )
        .bind(user_id).bind(variant_id).bind(delta)
        .fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|r| r.0))
    }

    async fn archive_cart_item(&mut self, user_id: Uuid, variant_id: Uuid) -> Result<u64> {
        let done = sqlx::query("UPDATE cart_items SET archived_at = NOW() WHERE user_id = $1 AND variant_id = $2 AND archived_at IS NULL")
            .bind(user_id).bind(variant_id).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn active_cart(&mut self, user_id: Uuid) -> Result<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1 AND archived_at IS NULL ORDER BY created_at FOR UPDATE")
            .bind(user_id).fetch_all(&mut *self.tx).await?;
        Ok(items)
    }

    async fn archive_cart(&mut self, user_id: Uuid) -> Result<u64> {
        let done = sqlx::query("UPDATE cart_items SET archived_at = NOW() WHERE user_id = $1 AND archived_at IS NULL")
            .bind(user_id).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn decrement_stock(&mut self, variant_id: Uuid, quantity: i32) -> Result<u64> {
        let done = sqlx::query(
            "UPDATE variants SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND stock >= $2 AND archived_at IS NULL",
        )
        .bind(variant_id).bind(quantity)
        .execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn variant_prices(&mut self, variant_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as("SELECT id, price FROM variants WHERE id = ANY($1)")
            .bind(variant_ids.to_vec()).fetch_all(&mut *self.tx).await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_order(&mut self, o: &Order) -> Result<()> {
        sqlx::query("INSERT INTO orders (id, user_id, address_id, subtotal, cost, coupon_code, delivery_status, ordered_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(o.id).bind(o.user_id).bind(o.address_id).bind(o.subtotal).bind(o.cost).bind(&o.coupon_code)
            .bind(o.delivery_status.as_str()).bind(o.ordered_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> {
        if items.is_empty() { return Ok(()); }
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO order_line_items (id, order_id, variant_id, quantity, unit_price) ");
        qb.push_values(items, |mut row, item| {
            row.push_bind(item.id).push_bind(item.order_id).push_bind(item.variant_id).push_bind(item.quantity).push_bind(item.unit_price);
        });
        qb.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
