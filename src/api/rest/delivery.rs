use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::broker;
use crate::error::AppError;
use crate::models::assignment::DeliveryAssignment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery/broadcasts/:courier_id", get(list_broadcasts))
        .route("/delivery/accept", post(accept))
        .route("/delivery/assign", post(assign))
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub courier_id: Uuid,
    pub owner_id: Uuid,
}

/// The courier's feed of broadcasts still open to them.
async fn list_broadcasts(
    State(state): State<Arc<AppState>>,
    Path(courier_id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryAssignment>>, AppError> {
    if !state.users.contains_key(&courier_id) {
        return Err(AppError::UserNotFound(courier_id));
    }

    Ok(Json(broker::open_broadcasts_for(&state, courier_id)))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<DeliveryAssignment>, AppError> {
    let assignment = broker::claim(
        &state,
        payload.order_id,
        payload.shop_id,
        payload.courier_id,
    )?;
    Ok(Json(assignment))
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<DeliveryAssignment>, AppError> {
    let assignment = broker::assign_courier(
        &state,
        payload.order_id,
        payload.shop_id,
        payload.courier_id,
        payload.owner_id,
    )?;
    Ok(Json(assignment))
}
