use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::rating;
use crate::error::AppError;
use crate::models::rating::Rating;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ratings", post(create_rating))
        .route("/items/:id/ratings", get(list_item_ratings))
}

#[derive(Deserialize)]
pub struct RateItemRequest {
    pub customer_id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub score: u8,
    pub review: Option<String>,
}

async fn create_rating(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RateItemRequest>,
) -> Result<Json<Rating>, AppError> {
    let rating = rating::rate_item(
        &state,
        payload.customer_id,
        payload.order_id,
        payload.item_id,
        payload.score,
        payload.review,
    )?;
    Ok(Json(rating))
}

async fn list_item_ratings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Rating>>, AppError> {
    if !state.items.contains_key(&id) {
        return Err(AppError::ItemNotFound(id));
    }

    let ratings = state
        .ratings
        .iter()
        .filter(|entry| entry.value().item_id == id)
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(ratings))
}
