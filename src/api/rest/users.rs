use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{GeoPoint, OtpState, Role, User};
use crate::state::AppState;

const OTP_TTL_MINUTES: i64 = 5;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/password/otp", post(request_otp))
        .route("/users/password/verify-otp", post(verify_otp))
        .route("/users/password/reset", post(reset_password))
        .route("/couriers/:id/location", patch(update_location))
        .route("/couriers/:id/presence", patch(update_presence))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub mobile: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdatePresenceRequest {
    pub online: bool,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.full_name.trim().is_empty() {
        return Err(AppError::BadRequest("name and email are required".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    if find_by_email(&state, &email).is_some() {
        return Err(AppError::EmailTaken);
    }

    let user = User {
        id: Uuid::new_v4(),
        full_name: payload.full_name.trim().to_string(),
        email,
        password_hash: digest(&payload.password),
        mobile: payload.mobile,
        role: payload.role,
        location: None,
        is_online: false,
        channel_id: None,
        otp: None,
        created_at: Utc::now(),
    };

    state.users.insert(user.id, user.clone());
    Ok(Json(user))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<User>, AppError> {
    let email = payload.email.trim().to_lowercase();
    let user_id = find_by_email(&state, &email).ok_or(AppError::Unauthorized)?;

    let user = state
        .users
        .get(&user_id)
        .ok_or(AppError::UserNotFound(user_id))?;
    if user.password_hash != digest(&payload.password) {
        return Err(AppError::Unauthorized);
    }

    Ok(Json(user.clone()))
}

async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OtpRequest>,
) -> Result<Json<Value>, AppError> {
    let email = payload.email.trim().to_lowercase();
    let user_id = find_by_email(&state, &email).ok_or(AppError::Unauthorized)?;

    let code = generate_otp();
    {
        let mut user = state
            .users
            .get_mut(&user_id)
            .ok_or(AppError::UserNotFound(user_id))?;
        user.otp = Some(OtpState {
            code: code.clone(),
            expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            verified: false,
        });
    }

    // Mail delivery is fire-and-forget; a relay outage must not block the
    // reset flow.
    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        let body = format!("Your password reset code is {code}. It expires in {OTP_TTL_MINUTES} minutes.");
        if let Err(err) = mailer.send(&email, "Password reset code", &body).await {
            warn!(error = %err, "otp mail failed");
        }
    });

    Ok(Json(json!({ "message": "otp sent" })))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let email = payload.email.trim().to_lowercase();
    let user_id = find_by_email(&state, &email).ok_or(AppError::Unauthorized)?;

    let mut user = state
        .users
        .get_mut(&user_id)
        .ok_or(AppError::UserNotFound(user_id))?;
    let otp = user.otp.as_mut().ok_or(AppError::Unauthorized)?;

    if otp.code != payload.code || Utc::now() > otp.expires_at {
        return Err(AppError::Unauthorized);
    }

    otp.verified = true;
    Ok(Json(json!({ "message": "otp verified" })))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    if payload.new_password.len() < 6 {
        return Err(AppError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    let user_id = find_by_email(&state, &email).ok_or(AppError::Unauthorized)?;

    let mut user = state
        .users
        .get_mut(&user_id)
        .ok_or(AppError::UserNotFound(user_id))?;
    let verified = user.otp.as_ref().is_some_and(|otp| otp.verified);
    if !verified {
        return Err(AppError::Unauthorized);
    }

    user.password_hash = digest(&payload.new_password);
    user.otp = None;

    Ok(Json(json!({ "message": "password updated" })))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<User>, AppError> {
    let mut user = state.users.get_mut(&id).ok_or(AppError::UserNotFound(id))?;
    if user.role != Role::Courier {
        return Err(AppError::Unauthorized);
    }

    user.location = Some(payload.location);
    Ok(Json(user.clone()))
}

async fn update_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePresenceRequest>,
) -> Result<Json<User>, AppError> {
    let mut user = state.users.get_mut(&id).ok_or(AppError::UserNotFound(id))?;
    if user.role != Role::Courier {
        return Err(AppError::Unauthorized);
    }

    if user.is_online != payload.online {
        user.is_online = payload.online;
        if payload.online {
            state.metrics.couriers_online.inc();
        } else {
            state.metrics.couriers_online.dec();
        }
    }

    Ok(Json(user.clone()))
}

fn find_by_email(state: &AppState, email: &str) -> Option<Uuid> {
    state
        .users
        .iter()
        .find(|entry| entry.value().email == email)
        .map(|entry| entry.value().id)
}

/// Placeholder credential digest.
/// TODO: swap for a real KDF when a production credential store lands.
fn digest(password: &str) -> String {
    let mut hasher = DefaultHasher::new();
    password.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Six digits derived from a fresh v4 uuid.
fn generate_otp() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    format!("{:06}", n % 1_000_000)
}
