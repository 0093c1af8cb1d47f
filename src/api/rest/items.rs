use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::shops::{resolve_image, ImageUpload};
use crate::error::AppError;
use crate::models::shop::{FoodType, Item, ItemCategory, RatingSummary, SpiceLevel};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", post(create_item))
        .route("/items/:id", put(update_item).get(get_item).delete(delete_item))
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub owner_id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub price: f64,
    pub category: ItemCategory,
    pub food_type: FoodType,
    pub image: Option<ImageUpload>,
    pub spice_level: Option<SpiceLevel>,
    #[serde(default)]
    pub diet_tags: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub owner_id: Uuid,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub category: Option<ItemCategory>,
    pub food_type: Option<FoodType>,
    pub image: Option<ImageUpload>,
    pub spice_level: Option<SpiceLevel>,
    pub diet_tags: Option<Vec<String>>,
    pub allergens: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub owner_id: Uuid,
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<Json<Item>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("item name cannot be empty".to_string()));
    }
    if payload.price < 0.0 {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }

    {
        let shop = state
            .shops
            .get(&payload.shop_id)
            .ok_or(AppError::ShopNotFound(payload.shop_id))?;
        if shop.owner_id != payload.owner_id {
            return Err(AppError::NotOwner);
        }
    }

    let image_url = resolve_image(&state, payload.image).await?;

    let item = Item {
        id: Uuid::new_v4(),
        shop_id: payload.shop_id,
        owner_id: payload.owner_id,
        name: payload.name.trim().to_string(),
        price: payload.price,
        category: payload.category,
        food_type: payload.food_type,
        image_url,
        spice_level: payload.spice_level,
        diet_tags: payload.diet_tags,
        allergens: payload.allergens,
        tags: payload.tags,
        rating: RatingSummary::default(),
        created_at: Utc::now(),
    };

    state.items.insert(item.id, item.clone());
    if let Some(mut shop) = state.shops.get_mut(&payload.shop_id) {
        shop.items.push(item.id);
    }

    Ok(Json(item))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<Item>, AppError> {
    if let Some(price) = payload.price {
        if price < 0.0 {
            return Err(AppError::BadRequest("price must not be negative".to_string()));
        }
    }

    let image_url = resolve_image(&state, payload.image).await?;

    let mut item = state.items.get_mut(&id).ok_or(AppError::ItemNotFound(id))?;
    if item.owner_id != payload.owner_id {
        return Err(AppError::NotOwner);
    }

    if let Some(name) = payload.name {
        item.name = name;
    }
    if let Some(price) = payload.price {
        item.price = price;
    }
    if let Some(category) = payload.category {
        item.category = category;
    }
    if let Some(food_type) = payload.food_type {
        item.food_type = food_type;
    }
    if let Some(url) = image_url {
        item.image_url = Some(url);
    }
    if let Some(spice_level) = payload.spice_level {
        item.spice_level = Some(spice_level);
    }
    if let Some(diet_tags) = payload.diet_tags {
        item.diet_tags = diet_tags;
    }
    if let Some(allergens) = payload.allergens {
        item.allergens = allergens;
    }
    if let Some(tags) = payload.tags {
        item.tags = tags;
    }

    Ok(Json(item.clone()))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, AppError> {
    let item = state.items.get(&id).ok_or(AppError::ItemNotFound(id))?;
    Ok(Json(item.value().clone()))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Value>, AppError> {
    {
        let item = state.items.get(&id).ok_or(AppError::ItemNotFound(id))?;
        if item.owner_id != query.owner_id {
            return Err(AppError::NotOwner);
        }
    }

    let removed = state
        .items
        .remove(&id)
        .ok_or(AppError::ItemNotFound(id))?
        .1;
    if let Some(mut shop) = state.shops.get_mut(&removed.shop_id) {
        shop.items.retain(|item_id| *item_id != id);
    }

    Ok(Json(json!({ "deleted": id })))
}
