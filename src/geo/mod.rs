use crate::models::user::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Sorts `points` by distance to `origin`, closest first. Ties keep their
/// input order.
pub fn sort_nearest_first<T, F>(points: &mut [T], origin: &GeoPoint, location_of: F)
where
    F: Fn(&T) -> GeoPoint,
{
    points.sort_by(|a, b| {
        let da = haversine_km(&location_of(a), origin);
        let db = haversine_km(&location_of(b), origin);
        da.total_cmp(&db)
    });
}
