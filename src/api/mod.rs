//! HTTP boundary.

use axum::{routing::{get, post, put}, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::store::Store;

pub mod auth;
pub mod handlers;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub nats: Option<async_nats::Client>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, nats: Option<async_nats::Client>) -> Self {
        Self { store, nats, request_timeout: DEFAULT_REQUEST_TIMEOUT }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Requests past the deadline get `408`; their handler future is dropped,
/// which rolls back any transaction it still holds.
pub fn router(state: AppState) -> Router {
    use handlers::*;

    let timeout = state.request_timeout;
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/cart", get(get_cart).delete(delete_cart))
        .route("/api/v1/cart/:variant_id", post(add_to_cart).patch(update_cart_count).delete(remove_from_cart))
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/addresses", post(add_address))
        .route("/api/v1/offers", get(list_offers))
        .route("/api/v1/products", get(search_products))
        .route("/api/v1/products/:product_id", get(get_product))
        .route("/api/v1/admin/brands", get(list_brands).post(create_brand))
        .route("/api/v1/admin/brands/:brand_id", put(update_brand).delete(delete_brand))
        .route("/api/v1/admin/categories", get(list_categories).post(create_category))
        .route("/api/v1/admin/categories/:category_id", put(update_category).delete(delete_category))
        .route("/api/v1/admin/products", post(create_product))
        .route("/api/v1/admin/products/:product_id", put(update_product).delete(delete_product))
        .route("/api/v1/admin/products/:product_id/variants", post(add_variant))
        .route("/api/v1/admin/products/:product_id/variants/:variant_id", put(update_variant).delete(delete_variant))
        .route("/api/v1/admin/offers", post(create_offer))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
