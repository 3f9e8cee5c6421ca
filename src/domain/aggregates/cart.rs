//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pending quantity of one variant held for a user until checkout.
///
/// At most one active (non-archived) row exists per `(user_id, variant_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl CartItem {
    pub fn new(user_id: Uuid, variant_id: Uuid, quantity: i32) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, variant_id, quantity, created_at: now, updated_at: now, archived_at: None }
    }

    pub fn is_active(&self) -> bool { self.archived_at.is_none() }

    pub fn belongs_to(&self, user_id: Uuid, variant_id: Uuid) -> bool {
        self.user_id == user_id && self.variant_id == variant_id
    }

    pub fn archive(&mut self, at: DateTime<Utc>) {
        self.archived_at = Some(at);
        self.updated_at = at;
    }
}

/// Direction of a single-unit cart quantity change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountChange { Increase, Decrease }

impl CountChange {
    pub fn from_flag(increase: bool) -> Self { if increase { Self::Increase } else { Self::Decrease } }
    pub fn delta(self) -> i32 { match self { Self::Increase => 1, Self::Decrease => -1 } }
}
