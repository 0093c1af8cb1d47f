use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Owner,
    Courier,
}

/// One-time password state for a pending password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpState {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub mobile: String,
    /// Fixed at registration, never changed afterwards.
    pub role: Role,
    pub location: Option<GeoPoint>,
    pub is_online: bool,
    /// Set while a realtime channel is attached, cleared on disconnect.
    pub channel_id: Option<Uuid>,
    #[serde(skip_serializing, default)]
    pub otp: Option<OtpState>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A courier must be online and report a location to receive broadcasts.
    pub fn is_dispatchable_courier(&self) -> bool {
        self.role == Role::Courier && self.is_online && self.location.is_some()
    }
}
