use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::shop::{Item, Shop};
use crate::models::user::{GeoPoint, Role};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shops", post(create_shop).get(list_shops))
        .route("/shops/:id", put(update_shop).get(get_shop))
        .route("/shops/:id/items", get(list_shop_items))
}

/// Raw image payload forwarded to the image store; only the returned URL is
/// ever persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub content: String,
}

pub async fn resolve_image(
    state: &AppState,
    image: Option<ImageUpload>,
) -> Result<Option<String>, AppError> {
    match image {
        Some(upload) => {
            let url = state
                .images
                .upload(&upload.file_name, upload.content.as_bytes())
                .await?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

#[derive(Deserialize)]
pub struct CreateShopRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    /// Geocoded from the address text when absent.
    pub location: Option<GeoPoint>,
    pub image: Option<ImageUpload>,
}

#[derive(Deserialize)]
pub struct UpdateShopRequest {
    pub owner_id: Uuid,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub image: Option<ImageUpload>,
}

async fn create_shop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateShopRequest>,
) -> Result<Json<Shop>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("shop name cannot be empty".to_string()));
    }

    let owner = state
        .users
        .get(&payload.owner_id)
        .ok_or(AppError::UserNotFound(payload.owner_id))?;
    if owner.role != Role::Owner {
        return Err(AppError::Unauthorized);
    }
    drop(owner);

    let already_has_shop = state
        .shops
        .iter()
        .any(|entry| entry.value().owner_id == payload.owner_id);
    if already_has_shop {
        return Err(AppError::BadRequest("owner already has a shop".to_string()));
    }

    let image_url = resolve_image(&state, payload.image).await?;

    // The shop must end up with coordinates for the delivery radius search.
    let location = match payload.location {
        Some(location) => location,
        None => state
            .geocoder
            .forward_geocode(&payload.address)
            .await
            .map_err(|err| AppError::BadRequest(format!("could not geocode address: {err}")))?,
    };

    let shop = Shop {
        id: Uuid::new_v4(),
        owner_id: payload.owner_id,
        name: payload.name.trim().to_string(),
        city: payload.city,
        state: payload.state,
        address: payload.address,
        location,
        image_url,
        items: Vec::new(),
        created_at: Utc::now(),
    };

    state.shops.insert(shop.id, shop.clone());
    Ok(Json(shop))
}

async fn update_shop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShopRequest>,
) -> Result<Json<Shop>, AppError> {
    let image_url = resolve_image(&state, payload.image).await?;

    let mut shop = state.shops.get_mut(&id).ok_or(AppError::ShopNotFound(id))?;
    if shop.owner_id != payload.owner_id {
        return Err(AppError::NotOwner);
    }

    if let Some(name) = payload.name {
        shop.name = name;
    }
    if let Some(city) = payload.city {
        shop.city = city;
    }
    if let Some(region) = payload.state {
        shop.state = region;
    }
    if let Some(address) = payload.address {
        shop.address = address;
    }
    if let Some(location) = payload.location {
        shop.location = location;
    }
    if let Some(url) = image_url {
        shop.image_url = Some(url);
    }

    Ok(Json(shop.clone()))
}

async fn get_shop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shop>, AppError> {
    let shop = state.shops.get(&id).ok_or(AppError::ShopNotFound(id))?;
    Ok(Json(shop.value().clone()))
}

async fn list_shops(State(state): State<Arc<AppState>>) -> Json<Vec<Shop>> {
    let shops = state
        .shops
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(shops)
}

async fn list_shop_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Item>>, AppError> {
    if !state.shops.contains_key(&id) {
        return Err(AppError::ShopNotFound(id));
    }

    let items = state
        .items
        .iter()
        .filter(|entry| entry.value().shop_id == id)
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(items))
}
