use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::placement::{self, AddressInput, CartLine};
use crate::engine::transition::{self, TransitionOutcome};
use crate::error::AppError;
use crate::models::order::{Order, PaymentMethod, PaymentStatus, ShopOrderStatus};
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/shops/:shop_id/status", patch(update_status))
        .route("/orders/:id/payment/verify", post(verify_payment))
        .route("/users/:id/orders", get(list_orders_for_user))
}

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    pub payment_method: PaymentMethod,
    pub delivery_address: AddressInput,
    pub cart: Vec<CartLine>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub owner_id: Uuid,
    pub status: ShopOrderStatus,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub payload: Value,
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = placement::place_order(
        &state,
        payload.customer_id,
        payload.cart,
        payload.payment_method,
        payload.delivery_address,
    )
    .await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.get(&id).ok_or(AppError::OrderNotFound(id))?;
    Ok(Json(order.value().clone()))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path((id, shop_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = transition::update_status(&state, id, shop_id, payload.status, payload.owner_id)?;
    Ok(Json(outcome))
}

async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<Order>, AppError> {
    let (customer_email, total, charge_id) = {
        let order = state.orders.get(&id).ok_or(AppError::OrderNotFound(id))?;
        if order.payment_method != PaymentMethod::Online
            || order.payment_status != PaymentStatus::Pending
        {
            return Err(AppError::BadRequest(
                "order is not awaiting payment".to_string(),
            ));
        }

        let email = state
            .users
            .get(&order.customer_id)
            .map(|user| user.email.clone());
        (email, order.total_amount, order.charge_id.clone())
    };

    let accepted = state.payments.verify(&payload.payload).await?;
    if !accepted {
        // Release the provider-side hold; best effort.
        if let Some(charge_id) = charge_id {
            let payments = state.payments.clone();
            tokio::spawn(async move {
                if let Err(err) = payments.cancel(&charge_id).await {
                    warn!(order_id = %id, error = %err, "charge cancel failed");
                }
            });
        }
        return Err(AppError::PaymentFailed(
            "provider rejected the payment".to_string(),
        ));
    }

    let order = {
        let mut order = state.orders.get_mut(&id).ok_or(AppError::OrderNotFound(id))?;
        if order.payment_status != PaymentStatus::Pending {
            return Err(AppError::BadRequest(
                "order is not awaiting payment".to_string(),
            ));
        }
        order.payment_status = PaymentStatus::Paid;
        order.clone()
    };

    info!(order_id = %id, "online payment confirmed");

    if let Some(email) = customer_email {
        let mailer = state.mailer.clone();
        tokio::spawn(async move {
            let subject = format!("Payment received for order {id}");
            let body = format!("We received your payment of {total:.2}.");
            if let Err(err) = mailer.send(&email, &subject, &body).await {
                warn!(order_id = %id, error = %err, "payment receipt mail failed");
            }
        });
    }

    Ok(Json(order))
}

/// Closed dispatch on the caller's role: each role sees exactly its own
/// slice of the order book.
async fn list_orders_for_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    let role = state
        .users
        .get(&id)
        .map(|user| user.role)
        .ok_or(AppError::UserNotFound(id))?;

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| {
            let order = entry.value();
            match role {
                Role::Customer => order.customer_id == id,
                Role::Owner => order.shop_orders.iter().any(|so| so.owner_id == id),
                Role::Courier => order
                    .shop_orders
                    .iter()
                    .any(|so| so.assigned_courier == Some(id)),
            }
        })
        .map(|entry| entry.value().clone())
        .collect();

    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(orders))
}
