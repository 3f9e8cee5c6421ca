//! Error taxonomy shared by the services and the storage backends.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::CouponCodeError;

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("insufficient stock for variant {variant_id}: requested {requested}")]
    InsufficientStock { variant_id: Uuid, requested: i32 },

    #[error("coupon {code} has expired")]
    CouponExpired { code: String },

    #[error("coupon {code} could not be found")]
    CouponLookupFailed { code: String },

    #[error("coupon code {code} is already in use")]
    CouponCodeTaken { code: String },

    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("variant {variant_id} is not in the cart")]
    CartItemNotFound { variant_id: Uuid },

    #[error("variant not found: {0}")]
    VariantNotFound(Uuid),

    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("brand not found: {0}")]
    BrandNotFound(Uuid),

    #[error("category not found: {0}")]
    CategoryNotFound(Uuid),

    #[error("address not found: {0}")]
    AddressNotFound(Uuid),

    #[error("invalid coupon code: {0}")]
    InvalidCouponCode(#[from] CouponCodeError),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl EcommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidQuantity(_) | Self::InvalidCouponCode(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::CartItemNotFound { .. } | Self::VariantNotFound(_) | Self::ProductNotFound(_) | Self::AddressNotFound(_) => StatusCode::NOT_FOUND,
            Self::BrandNotFound(_) | Self::CategoryNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } | Self::CouponCodeTaken { .. } => StatusCode::CONFLICT,
            Self::CouponExpired { .. } | Self::CouponLookupFailed { .. } | Self::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::CouponExpired { .. } => "coupon_expired",
            Self::CouponLookupFailed { .. } => "coupon_lookup_failed",
            Self::CouponCodeTaken { .. } => "coupon_code_taken",
            Self::EmptyCart => "empty_cart",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::CartItemNotFound { .. } => "cart_item_not_found",
            Self::VariantNotFound(_) => "variant_not_found",
            Self::ProductNotFound(_) => "product_not_found",
            Self::BrandNotFound(_) => "brand_not_found",
            Self::CategoryNotFound(_) => "category_not_found",
            Self::AddressNotFound(_) => "address_not_found",
            Self::InvalidCouponCode(_) => "invalid_coupon_code",
            Self::Validation(_) => "validation_failed",
            Self::Persistence(_) => "persistence_failure",
        }
    }

    /// Message safe to hand to clients; storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        if let Self::Persistence(e) = &self {
            tracing::error!(error = %e, "storage failure");
        }
        let body = serde_json::json!({ "error": self.kind(), "message": self.public_message() });
        (self.status(), Json(body)).into_response()
    }
}
