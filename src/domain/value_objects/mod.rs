//! Value Objects for checkout

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coupon code as typed by the customer, trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.len() > 50 { return Err(CouponCodeError::TooLong); }
        Ok(Self(value))
    }

    /// Blank input means "no coupon".
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>, CouponCodeError> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => Self::new(v).map(Some),
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone)] pub enum CouponCodeError { Empty, TooLong }
impl std::error::Error for CouponCodeError {}
impl fmt::Display for CouponCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "coupon code empty"), Self::TooLong => write!(f, "coupon code too long") }
    }
}

/// One-based page window over a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Page { page: u32, limit: u32 }

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }
    pub fn page(&self) -> u32 { self.page }
    pub fn limit(&self) -> u32 { self.limit }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for Page { fn default() -> Self { Self::new(None, None) } }
