//! Cart pricing and coupon discounts.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{CartItem, NewOffer, Offer};
use crate::domain::value_objects::CouponCode;
use crate::error::{EcommerceError, Result};
use crate::store::{Store, StoreTx};

/// Unit prices of the variants referenced by a cart, read inside the
/// checkout transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSheet { prices: HashMap<Uuid, i64> }

impl PriceSheet {
    pub fn new(prices: HashMap<Uuid, i64>) -> Self { Self { prices } }

    pub async fn load(tx: &mut dyn StoreTx, items: &[CartItem]) -> Result<Self> {
        let mut ids: Vec<Uuid> = items.iter().map(|i| i.variant_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(Self::new(tx.variant_prices(&ids).await?))
    }

    /// Variants that resolve to no row are priced at zero.
    pub fn unit_price(&self, variant_id: Uuid) -> i64 { self.prices.get(&variant_id).copied().unwrap_or(0) }

    /// Sum of `unit_price * quantity` over the items.
    pub fn total_cost(&self, items: &[CartItem]) -> i64 {
        items.iter().map(|i| self.unit_price(i.variant_id) * i64::from(i.quantity)).sum()
    }
}

/// Applies `offer` to `price` as of `now`.
///
/// The discount is `price * percent / 100`, capped at `max_discount`; the
/// result never drops below zero. A zero-percent offer leaves the price as is.
pub fn discounted_price(price: i64, offer: &Offer, now: DateTime<Utc>) -> Result<i64> {
    if offer.is_expired_at(now) {
        return Err(EcommerceError::CouponExpired { code: offer.coupon_code.clone() });
    }
    if offer.percent == 0 {
        return Ok(price);
    }
    let discount = (price.saturating_mul(i64::from(offer.percent)) / 100).min(offer.max_discount).max(0);
    Ok((price - discount).max(0))
}

/// Looks up the offer behind `code` and applies it to `price`.
#[tracing::instrument(skip(tx))]
pub async fn apply_discount(tx: &mut dyn StoreTx, price: i64, code: &CouponCode, now: DateTime<Utc>) -> Result<i64> {
    let offer = match tx.find_offer(code.as_str()).await {
        Ok(Some(offer)) => offer,
        Ok(None) => return Err(EcommerceError::CouponLookupFailed { code: code.to_string() }),
        Err(e) => {
            tracing::error!(error = %e, "coupon lookup failed");
            return Err(EcommerceError::CouponLookupFailed { code: code.to_string() });
        }
    };
    discounted_price(price, &offer, now)
}

/// Creates an offer. Coupon codes are unique among active offers, so a
/// code always resolves to exactly one discount rule.
pub async fn create_offer(store: &dyn Store, req: NewOffer) -> Result<Offer> {
    req.validate()?;
    let code = CouponCode::new(req.coupon_code)?;
    let offer = Offer {
        id: Uuid::now_v7(), offer_name: req.offer_name.trim().to_string(), percent: req.percent,
        max_discount: req.max_discount, coupon_code: code.as_str().to_string(), validity: req.validity,
        description: req.description, created_at: Utc::now(),
    };
    let mut tx = store.begin().await?;
    if tx.find_offer(&offer.coupon_code).await?.is_some() {
        return Err(EcommerceError::CouponCodeTaken { code: offer.coupon_code });
    }
    tx.insert_offer(&offer).await?;
    tx.commit().await?;
    tracing::info!(offer_id = %offer.id, coupon = %offer.coupon_code, "offer created");
    Ok(offer)
}

pub async fn list_offers(store: &dyn Store) -> Result<Vec<Offer>> {
    store.list_offers().await
}
