use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Flat fee added to every order total at placement time.
    pub delivery_fee: f64,
    /// Initial search radius for broadcast candidates.
    pub broadcast_radius_km: f64,
    /// How long a broadcast may sit unclaimed before the sweeper expires it.
    pub broadcast_expiry_secs: u64,
    pub sweep_interval_secs: u64,
    /// Radius multiplier applied on each re-broadcast.
    pub radius_growth_factor: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            delivery_fee: parse_or_default("DELIVERY_FEE", 40.0)?,
            broadcast_radius_km: parse_or_default("BROADCAST_RADIUS_KM", 5.0)?,
            broadcast_expiry_secs: parse_or_default("BROADCAST_EXPIRY_SECS", 120)?,
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", 15)?,
            radius_growth_factor: parse_or_default("RADIUS_GROWTH_FACTOR", 1.5)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            delivery_fee: 40.0,
            broadcast_radius_km: 5.0,
            broadcast_expiry_secs: 120,
            sweep_interval_secs: 15,
            radius_growth_factor: 1.5,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
