//! Audiophile checkout service
//!
//! Cart, coupon and order placement backend for the audiophile storefront.
//!
//! ## Features
//! - Per-user cart with one active line per variant
//! - Guarded stock decrements that never oversell
//! - Coupon discounts (percent of price, capped)
//! - All-or-nothing checkout: reserve, price, discount, order, clear cart
//! - Catalog administration and product search
//! - Order history by delivery status

pub mod address;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod error;
pub mod orders;
pub mod pricing;
pub mod shutdown;
pub mod stock;
pub mod store;

#[cfg(test)]
pub(crate) mod test;

pub use checkout::{CheckoutFailure, CheckoutRequest, CheckoutStep, Receipt};
pub use error::{EcommerceError, Result};
