use axum::{extract::{Path, Query, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AdminUser, CurrentUser};
use super::AppState;
use crate::catalog::{self, Paginated, ProductDetail, ProductFilter};
use crate::checkout::{self, CheckoutRequest, Receipt};
use crate::domain::aggregates::{
    Address, Brand, CartItem, Category, CountChange, DeliveryStatus, NewAddress, NewBrand, NewCategory, NewOffer, NewProduct,
    NewVariant, Offer, Product, ProductChanges, ProductListing, Variant,
};
use crate::domain::events::{self, OrderEvent};
use crate::domain::value_objects::{CouponCode, Page};
use crate::error::{EcommerceError, Result};
use crate::orders::{self, OrderWithItems};
use crate::{address, cart, pricing};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy", "service": "audiophile-checkout"}))
}

// ---- cart ----

pub async fn get_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<CartItem>>> {
    Ok(Json(cart::list_active(s.store.as_ref(), user).await?))
}

pub async fn delete_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<serde_json::Value>> {
    let cleared = cart::delete_cart(s.store.as_ref(), user).await?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

pub async fn add_to_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(variant_id): Path<Uuid>) -> Result<(StatusCode, Json<CartItem>)> {
    let item = cart::add_item(s.store.as_ref(), user, variant_id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Debug, Deserialize)] pub struct CountParams { pub increase: bool }

pub async fn update_cart_count(
    State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(variant_id): Path<Uuid>, Query(p): Query<CountParams>,
) -> Result<Json<serde_json::Value>> {
    let quantity = cart::update_count(s.store.as_ref(), user, variant_id, CountChange::from_flag(p.increase)).await?;
    Ok(Json(serde_json::json!({ "variant_id": variant_id, "quantity": quantity })))
}

pub async fn remove_from_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(variant_id): Path<Uuid>) -> Result<StatusCode> {
    cart::remove_item(s.store.as_ref(), user, variant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- checkout & orders ----

#[derive(Debug, Deserialize)] pub struct CheckoutBody { pub address_id: Uuid, pub coupon_code: Option<String> }

pub async fn checkout(State(s): State<AppState>, CurrentUser(user): CurrentUser, Json(body): Json<CheckoutBody>) -> std::result::Result<(StatusCode, Json<Receipt>), Response> {
    let coupon = CouponCode::parse_optional(body.coupon_code.as_deref())
        .map_err(|e| EcommerceError::from(e).into_response())?;
    let req = CheckoutRequest { user_id: user, address_id: body.address_id, coupon };
    let receipt = checkout::checkout(s.store.as_ref(), &req).await.map_err(IntoResponse::into_response)?;
    events::publish(s.nats.as_ref(), &OrderEvent::placed(&receipt.order, &receipt.items)).await;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Deserialize)] pub struct OrdersParams { pub status: DeliveryStatus, pub page: Option<u32>, pub limit: Option<u32> }

pub async fn list_orders(State(s): State<AppState>, CurrentUser(user): CurrentUser, Query(p): Query<OrdersParams>) -> Result<Json<Paginated<OrderWithItems>>> {
    Ok(Json(orders::list_orders(s.store.as_ref(), user, p.status, Page::new(p.page, p.limit)).await?))
}

pub async fn add_address(State(s): State<AppState>, CurrentUser(user): CurrentUser, Json(r): Json<NewAddress>) -> Result<(StatusCode, Json<Address>)> {
    Ok((StatusCode::CREATED, Json(address::add_address(s.store.as_ref(), user, r).await?)))
}

// ---- catalog ----

pub async fn list_offers(State(s): State<AppState>) -> Result<Json<Vec<Offer>>> {
    Ok(Json(pricing::list_offers(s.store.as_ref()).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>, pub category: Option<String>, pub brand: Option<String>,
    pub page: Option<u32>, pub limit: Option<u32>,
}

pub async fn search_products(State(s): State<AppState>, Query(p): Query<SearchParams>) -> Result<Json<Paginated<ProductListing>>> {
    let filter = ProductFilter::new(p.search, p.category, p.brand);
    Ok(Json(catalog::search_products(s.store.as_ref(), &filter, Page::new(p.page, p.limit)).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(product_id): Path<Uuid>) -> Result<Json<ProductDetail>> {
    Ok(Json(catalog::get_product(s.store.as_ref(), product_id).await?))
}

// ---- admin ----

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub limit: Option<u32> }

pub async fn list_brands(State(s): State<AppState>, _: AdminUser, Query(p): Query<ListParams>) -> Result<Json<Paginated<Brand>>> {
    Ok(Json(catalog::list_brands(s.store.as_ref(), Page::new(p.page, p.limit)).await?))
}

pub async fn list_categories(State(s): State<AppState>, _: AdminUser, Query(p): Query<ListParams>) -> Result<Json<Paginated<Category>>> {
    Ok(Json(catalog::list_categories(s.store.as_ref(), Page::new(p.page, p.limit)).await?))
}

pub async fn create_brand(State(s): State<AppState>, _: AdminUser, Json(r): Json<NewBrand>) -> Result<(StatusCode, Json<Brand>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_brand(s.store.as_ref(), r).await?)))
}

pub async fn create_category(State(s): State<AppState>, _: AdminUser, Json(r): Json<NewCategory>) -> Result<(StatusCode, Json<Category>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_category(s.store.as_ref(), r).await?)))
}

pub async fn create_product(State(s): State<AppState>, _: AdminUser, Json(r): Json<NewProduct>) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let (product, variant): (Product, Variant) = catalog::create_product(s.store.as_ref(), r).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "product": product, "variant": variant }))))
}

pub async fn add_variant(State(s): State<AppState>, _: AdminUser, Path(product_id): Path<Uuid>, Json(r): Json<NewVariant>) -> Result<(StatusCode, Json<Variant>)> {
    Ok((StatusCode::CREATED, Json(catalog::add_variant(s.store.as_ref(), product_id, r).await?)))
}

pub async fn create_offer(State(s): State<AppState>, _: AdminUser, Json(r): Json<NewOffer>) -> Result<(StatusCode, Json<Offer>)> {
    Ok((StatusCode::CREATED, Json(pricing::create_offer(s.store.as_ref(), r).await?)))
}

pub async fn update_brand(State(s): State<AppState>, _: AdminUser, Path(brand_id): Path<Uuid>, Json(r): Json<NewBrand>) -> Result<Json<Brand>> {
    Ok(Json(catalog::update_brand(s.store.as_ref(), brand_id, r).await?))
}

pub async fn delete_brand(State(s): State<AppState>, _: AdminUser, Path(brand_id): Path<Uuid>) -> Result<StatusCode> {
    catalog::delete_brand(s.store.as_ref(), brand_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_category(State(s): State<AppState>, _: AdminUser, Path(category_id): Path<Uuid>, Json(r): Json<NewCategory>) -> Result<Json<Category>> {
    Ok(Json(catalog::update_category(s.store.as_ref(), category_id, r).await?))
}

pub async fn delete_category(State(s): State<AppState>, _: AdminUser, Path(category_id): Path<Uuid>) -> Result<StatusCode> {
    catalog::delete_category(s.store.as_ref(), category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_product(State(s): State<AppState>, _: AdminUser, Path(product_id): Path<Uuid>, Json(r): Json<ProductChanges>) -> Result<Json<Product>> {
    Ok(Json(catalog::update_product(s.store.as_ref(), product_id, r).await?))
}

pub async fn delete_product(State(s): State<AppState>, _: AdminUser, Path(product_id): Path<Uuid>) -> Result<StatusCode> {
    catalog::delete_product(s.store.as_ref(), product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_variant(
    State(s): State<AppState>, _: AdminUser, Path((product_id, variant_id)): Path<(Uuid, Uuid)>, Json(r): Json<NewVariant>,
) -> Result<Json<Variant>> {
    Ok(Json(catalog::update_variant(s.store.as_ref(), product_id, variant_id, r).await?))
}

pub async fn delete_variant(State(s): State<AppState>, _: AdminUser, Path((product_id, variant_id)): Path<(Uuid, Uuid)>) -> Result<StatusCode> {
    catalog::delete_variant(s.store.as_ref(), product_id, variant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
