use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotRequired,
    Pending,
    Paid,
}

/// Forward-only lifecycle of a shop's slice of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopOrderStatus {
    Pending,
    Preparing,
    OutForDelivery,
    Delivered,
}

impl ShopOrderStatus {
    /// The only status a transition may move to from `self`.
    pub fn successor(self) -> Option<ShopOrderStatus> {
        match self {
            ShopOrderStatus::Pending => Some(ShopOrderStatus::Preparing),
            ShopOrderStatus::Preparing => Some(ShopOrderStatus::OutForDelivery),
            ShopOrderStatus::OutForDelivery => Some(ShopOrderStatus::Delivered),
            ShopOrderStatus::Delivered => None,
        }
    }
}

/// Price and name are snapshotted at placement time so later menu edits
/// never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrder {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub owner_id: Uuid,
    pub subtotal: f64,
    pub lines: Vec<OrderLine>,
    pub status: ShopOrderStatus,
    pub assigned_courier: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Provider charge reference for online orders.
    pub charge_id: Option<String>,
    pub delivery_address: DeliveryAddress,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub shop_orders: Vec<ShopOrder>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn shop_order(&self, shop_id: Uuid) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.shop_id == shop_id)
    }

    pub fn shop_order_mut(&mut self, shop_id: Uuid) -> Option<&mut ShopOrder> {
        self.shop_orders.iter_mut().find(|so| so.shop_id == shop_id)
    }

    pub fn contains_item(&self, item_id: Uuid) -> bool {
        self.shop_orders
            .iter()
            .flat_map(|so| so.lines.iter())
            .any(|line| line.item_id == item_id)
    }
}
