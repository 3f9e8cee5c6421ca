//! Delivery addresses.

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Address, NewAddress};
use crate::error::Result;
use crate::store::Store;

pub async fn add_address(store: &dyn Store, user_id: Uuid, req: NewAddress) -> Result<Address> {
    req.validate()?;
    let address = Address {
        id: Uuid::now_v7(), user_id, area: req.area, city: req.city, state: req.state,
        zip_code: req.zip_code, contact: req.contact, created_at: Utc::now(),
    };
    let mut tx = store.begin().await?;
    tx.insert_address(&address).await?;
    tx.commit().await?;
    tracing::info!(address_id = %address.id, %user_id, "address added");
    Ok(address)
}
