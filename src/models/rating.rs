use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uniqueness over (customer, item, order) is enforced by the store key, so
/// re-rating the same purchase updates in place instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub score: u8,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
