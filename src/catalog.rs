//! Catalog administration and product search.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{
    Brand, Category, NewBrand, NewCategory, NewProduct, NewVariant, Product, ProductChanges, ProductListing, Variant,
};
use crate::domain::value_objects::Page;
use crate::error::{EcommerceError, Result};
use crate::store::Store;

/// Optional search constraints, combined with AND. Blank values are ignored.
///
/// A filter is a plain value; backends derive a fresh query from it per call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    search: Option<String>,
    category: Option<String>,
    brand: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProductFilter {
    pub fn new(search: Option<String>, category: Option<String>, brand: Option<String>) -> Self {
        Self { search: non_blank(search), category: non_blank(category), brand: non_blank(brand) }
    }

    pub fn search(&self) -> Option<&str> { self.search.as_deref() }
    pub fn category(&self) -> Option<&str> { self.category.as_deref() }
    pub fn brand(&self) -> Option<&str> { self.brand.as_deref() }

    /// In-process equivalent of the SQL predicate (`ILIKE` substring on the
    /// product name, exact category and brand names).
    pub fn matches(&self, listing: &ProductListing) -> bool {
        let search_ok = self.search().map_or(true, |s| listing.product_name.to_lowercase().contains(&s.to_lowercase()));
        let category_ok = self.category().map_or(true, |c| listing.category_name == c);
        let brand_ok = self.brand().map_or(true, |b| listing.brand_name == b);
        search_ok && category_ok && brand_ok
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

/// A product with its purchasable variants.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

/// Listing and count are independent reads and run concurrently.
#[tracing::instrument(skip(store))]
pub async fn search_products(store: &dyn Store, filter: &ProductFilter, page: Page) -> Result<Paginated<ProductListing>> {
    let (data, total) = tokio::try_join!(store.search_products(filter, page), store.count_products(filter))?;
    Ok(Paginated { data, total, page: page.page() })
}

pub async fn get_product(store: &dyn Store, product_id: Uuid) -> Result<ProductDetail> {
    let (product, variants) = tokio::try_join!(store.find_product(product_id), store.product_variants(product_id))?;
    let product = product.ok_or(EcommerceError::ProductNotFound(product_id))?;
    Ok(ProductDetail { product, variants })
}

pub async fn list_brands(store: &dyn Store, page: Page) -> Result<Paginated<Brand>> {
    let (data, total) = tokio::try_join!(store.list_brands(page), store.count_brands())?;
    Ok(Paginated { data, total, page: page.page() })
}

pub async fn list_categories(store: &dyn Store, page: Page) -> Result<Paginated<Category>> {
    let (data, total) = tokio::try_join!(store.list_categories(page), store.count_categories())?;
    Ok(Paginated { data, total, page: page.page() })
}

pub async fn create_brand(store: &dyn Store, req: NewBrand) -> Result<Brand> {
    req.validate()?;
    let brand = Brand { id: Uuid::now_v7(), brand_name: req.brand_name.trim().to_string(), created_at: Utc::now(), archived_at: None };
    let mut tx = store.begin().await?;
    tx.insert_brand(&brand).await?;
    tx.commit().await?;
    tracing::info!(brand_id = %brand.id, "brand created");
    Ok(brand)
}

pub async fn create_category(store: &dyn Store, req: NewCategory) -> Result<Category> {
    req.validate()?;
    let category = Category {
        id: Uuid::now_v7(), category_name: req.category_name.trim().to_string(), created_at: Utc::now(), archived_at: None,
    };
    let mut tx = store.begin().await?;
    tx.insert_category(&category).await?;
    tx.commit().await?;
    tracing::info!(category_id = %category.id, "category created");
    Ok(category)
}

fn variant_of(product_id: Uuid, req: &NewVariant) -> Variant {
    let now = Utc::now();
    Variant {
        id: Uuid::now_v7(), product_id, colour: req.colour.trim().to_string(), price: req.price, stock: req.stock,
        created_at: now, updated_at: now, archived_at: None,
    }
}

/// Creates a product together with its first variant.
pub async fn create_product(store: &dyn Store, req: NewProduct) -> Result<(Product, Variant)> {
    req.validate()?;
    let now = Utc::now();
    let product = Product {
        id: Uuid::now_v7(), product_name: req.product_name.trim().to_string(), model_name: req.model_name.trim().to_string(),
        brand_id: req.brand_id, category_id: req.category_id, return_days: req.return_days,
        warranty_months: req.warranty_months, wireless: req.wireless, created_at: now, updated_at: now, archived_at: None,
    };
    let variant = variant_of(product.id, &req.variant);
    let mut tx = store.begin().await?;
    if !tx.brand_exists(product.brand_id).await? {
        return Err(EcommerceError::BrandNotFound(product.brand_id));
    }
    if !tx.category_exists(product.category_id).await? {
        return Err(EcommerceError::CategoryNotFound(product.category_id));
    }
    tx.insert_product(&product).await?;
    tx.insert_variant(&variant).await?;
    tx.commit().await?;
    tracing::info!(product_id = %product.id, variant_id = %variant.id, "product created");
    Ok((product, variant))
}

pub async fn add_variant(store: &dyn Store, product_id: Uuid, req: NewVariant) -> Result<Variant> {
    req.validate()?;
    let variant = variant_of(product_id, &req);
    let mut tx = store.begin().await?;
    if !tx.product_exists(product_id).await? {
        return Err(EcommerceError::ProductNotFound(product_id));
    }
    tx.insert_variant(&variant).await?;
    tx.commit().await?;
    tracing::info!(%product_id, variant_id = %variant.id, "variant added");
    Ok(variant)
}

pub async fn update_brand(store: &dyn Store, brand_id: Uuid, req: NewBrand) -> Result<Brand> {
    req.validate()?;
    let mut tx = store.begin().await?;
    let brand = tx.update_brand(brand_id, req.brand_name.trim()).await?.ok_or(EcommerceError::BrandNotFound(brand_id))?;
    tx.commit().await?;
    Ok(brand)
}

pub async fn update_category(store: &dyn Store, category_id: Uuid, req: NewCategory) -> Result<Category> {
    req.validate()?;
    let mut tx = store.begin().await?;
    let category = tx.update_category(category_id, req.category_name.trim()).await?
        .ok_or(EcommerceError::CategoryNotFound(category_id))?;
    tx.commit().await?;
    Ok(category)
}

pub async fn update_product(store: &dyn Store, product_id: Uuid, mut req: ProductChanges) -> Result<Product> {
    req.validate()?;
    req.product_name = req.product_name.trim().to_string();
    req.model_name = req.model_name.trim().to_string();
    let mut tx = store.begin().await?;
    let product = tx.update_product(product_id, &req).await?.ok_or(EcommerceError::ProductNotFound(product_id))?;
    tx.commit().await?;
    tracing::info!(%product_id, "product updated");
    Ok(product)
}

/// Rewrites colour, price and stock of an active variant. Orders already
/// placed keep the unit price they recorded.
pub async fn update_variant(store: &dyn Store, product_id: Uuid, variant_id: Uuid, mut req: NewVariant) -> Result<Variant> {
    req.validate()?;
    req.colour = req.colour.trim().to_string();
    let mut tx = store.begin().await?;
    let variant = tx.update_variant(product_id, variant_id, &req).await?.ok_or(EcommerceError::VariantNotFound(variant_id))?;
    tx.commit().await?;
    tracing::info!(%product_id, %variant_id, stock = variant.stock, "variant updated");
    Ok(variant)
}

pub async fn delete_brand(store: &dyn Store, brand_id: Uuid) -> Result<()> {
    let mut tx = store.begin().await?;
    if tx.archive_brand(brand_id).await? == 0 {
        return Err(EcommerceError::BrandNotFound(brand_id));
    }
    tx.commit().await
}

pub async fn delete_category(store: &dyn Store, category_id: Uuid) -> Result<()> {
    let mut tx = store.begin().await?;
    if tx.archive_category(category_id).await? == 0 {
        return Err(EcommerceError::CategoryNotFound(category_id));
    }
    tx.commit().await
}

/// Archives the product and its variants. Archived variants can no longer be
/// added to carts or reserved by checkout.
#[tracing::instrument(skip(store))]
pub async fn delete_product(store: &dyn Store, product_id: Uuid) -> Result<()> {
    let mut tx = store.begin().await?;
    if tx.archive_product(product_id).await? == 0 {
        return Err(EcommerceError::ProductNotFound(product_id));
    }
    tx.commit().await
}

#[tracing::instrument(skip(store))]
pub async fn delete_variant(store: &dyn Store, product_id: Uuid, variant_id: Uuid) -> Result<()> {
    let mut tx = store.begin().await?;
    if tx.archive_variant(product_id, variant_id).await? == 0 {
        return Err(EcommerceError::VariantNotFound(variant_id));
    }
    tx.commit().await
}
