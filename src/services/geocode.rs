use async_trait::async_trait;

use crate::error::AppError;
use crate::models::user::GeoPoint;

/// Address lookup collaborator. Only used around order placement for
/// validation and display, never by the core business logic.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(&self, point: &GeoPoint) -> Result<String, AppError>;

    async fn forward_geocode(&self, text: &str) -> Result<GeoPoint, AppError>;
}

/// Geocoder stub returning synthetic addresses, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryGeocoder;

#[async_trait]
impl Geocoder for InMemoryGeocoder {
    async fn reverse_geocode(&self, point: &GeoPoint) -> Result<String, AppError> {
        Ok(format!("near {:.4}, {:.4}", point.lat, point.lng))
    }

    async fn forward_geocode(&self, _text: &str) -> Result<GeoPoint, AppError> {
        Ok(GeoPoint { lat: 0.0, lng: 0.0 })
    }
}
