use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Broadcasted,
    Assigned,
    Completed,
    Expired,
}

/// Broadcast record for one shop order entering delivery. Lives outside the
/// order aggregate so the claim race never locks the whole order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub shop_id: Uuid,
    pub dropoff: GeoPoint,
    /// Couriers this broadcast went to; only these may claim it.
    pub candidates: Vec<Uuid>,
    pub status: AssignmentStatus,
    pub assigned_courier: Option<Uuid>,
    pub radius_km: f64,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}
