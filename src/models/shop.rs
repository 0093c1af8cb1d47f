use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub location: GeoPoint,
    pub image_url: Option<String>,
    pub items: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Snacks,
    MainCourse,
    Desserts,
    Pizza,
    Burgers,
    Sandwiches,
    SouthIndian,
    NorthIndian,
    Chinese,
    FastFood,
    Beverages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodType {
    Veg,
    NonVeg,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiceLevel {
    Mild,
    Medium,
    Hot,
}

/// Running aggregate over all ratings for an item, updated incrementally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub price: f64,
    pub category: ItemCategory,
    pub food_type: FoodType,
    pub image_url: Option<String>,
    pub spice_level: Option<SpiceLevel>,
    pub diet_tags: Vec<String>,
    pub allergens: Vec<String>,
    pub tags: Vec<String>,
    pub rating: RatingSummary,
    pub created_at: DateTime<Utc>,
}
