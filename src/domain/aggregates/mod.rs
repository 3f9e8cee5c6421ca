//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Brand, Category, NewBrand, NewCategory, NewOffer, NewProduct, NewVariant, Offer, Product, ProductChanges, ProductListing, Variant};
pub use order::{Address, DeliveryStatus, NewAddress, Order, OrderLineItem, UnknownDeliveryStatus};
pub use cart::{CartItem, CountChange};
