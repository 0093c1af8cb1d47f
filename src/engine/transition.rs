use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::broker::{self, BroadcastRequest};
use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::models::order::ShopOrderStatus;
use crate::notify::RealtimeEvent;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub status: ShopOrderStatus,
    /// Couriers the delivery broadcast went to; only populated when the
    /// transition entered `out_for_delivery`.
    pub candidates: Vec<Uuid>,
}

/// Advances one shop order to the next status. The precondition check and
/// the write share the order-entry guard, so two racing transitions cannot
/// both pass; the loser gets `InvalidTransition`.
pub fn update_status(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
    target: ShopOrderStatus,
    acting_owner: Uuid,
) -> Result<TransitionOutcome, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or(AppError::OrderNotFound(order_id))?;
    let customer_id = order.customer_id;
    let dropoff = order.delivery_address.location.clone();

    let so = order
        .shop_order_mut(shop_id)
        .ok_or(AppError::ShopOrderNotFound(shop_id))?;

    if so.owner_id != acting_owner {
        return Err(AppError::NotOwner);
    }

    let current = so.status;
    if current.successor() != Some(target) {
        return Err(AppError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    let mut candidates = Vec::new();
    match target {
        ShopOrderStatus::OutForDelivery => {
            let outcome = broker::broadcast(
                state,
                BroadcastRequest {
                    order_id,
                    shop_order_id: so.id,
                    shop_id,
                    dropoff,
                    radius_km: state.config.broadcast_radius_km,
                },
            );
            so.assignment_id = Some(outcome.assignment_id);
            candidates = outcome.candidates;
        }
        ShopOrderStatus::Delivered => {
            let assignment_id = so.assignment_id.ok_or(AppError::NoAssignmentToComplete)?;
            let mut assignment = state
                .assignments
                .get_mut(&assignment_id)
                .ok_or(AppError::NoAssignmentToComplete)?;
            if assignment.status != AssignmentStatus::Assigned {
                return Err(AppError::NoAssignmentToComplete);
            }
            assignment.status = AssignmentStatus::Completed;
        }
        _ => {}
    }

    so.status = target;
    drop(order);

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[status_label(target)])
        .inc();

    state.notifier.emit(
        customer_id,
        RealtimeEvent::StatusChanged {
            order_id,
            shop_id,
            status: target,
        },
    );

    info!(
        order_id = %order_id,
        shop_id = %shop_id,
        status = status_label(target),
        "shop order status updated"
    );

    Ok(TransitionOutcome {
        order_id,
        shop_id,
        status: target,
        candidates,
    })
}

fn status_label(status: ShopOrderStatus) -> &'static str {
    match status {
        ShopOrderStatus::Pending => "pending",
        ShopOrderStatus::Preparing => "preparing",
        ShopOrderStatus::OutForDelivery => "out_for_delivery",
        ShopOrderStatus::Delivered => "delivered",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::update_status;
    use crate::config::Config;
    use crate::engine::broker;
    use crate::error::AppError;
    use crate::models::assignment::AssignmentStatus;
    use crate::models::order::{
        DeliveryAddress, Order, OrderLine, PaymentMethod, PaymentStatus, ShopOrder,
        ShopOrderStatus,
    };
    use crate::models::user::{GeoPoint, Role, User};
    use crate::state::AppState;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()))
    }

    fn seed_courier(state: &AppState, lat: f64, lng: f64) -> Uuid {
        let id = Uuid::new_v4();
        state.users.insert(
            id,
            User {
                id,
                full_name: "Courier".to_string(),
                email: format!("{id}@example.com"),
                password_hash: "hash".to_string(),
                mobile: "5550100".to_string(),
                role: Role::Courier,
                location: Some(GeoPoint { lat, lng }),
                is_online: true,
                channel_id: None,
                otp: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn seed_order(state: &AppState, owner_id: Uuid, status: ShopOrderStatus) -> (Uuid, Uuid) {
        let order_id = Uuid::new_v4();
        let shop_id = Uuid::new_v4();
        state.orders.insert(
            order_id,
            Order {
                id: order_id,
                customer_id: Uuid::new_v4(),
                payment_method: PaymentMethod::CashOnDelivery,
                payment_status: PaymentStatus::NotRequired,
                charge_id: None,
                delivery_address: DeliveryAddress {
                    text: "44 Lake View".to_string(),
                    location: GeoPoint {
                        lat: 18.52,
                        lng: 73.85,
                    },
                },
                delivery_fee: 40.0,
                total_amount: 140.0,
                shop_orders: vec![ShopOrder {
                    id: Uuid::new_v4(),
                    shop_id,
                    owner_id,
                    subtotal: 100.0,
                    lines: vec![OrderLine {
                        item_id: Uuid::new_v4(),
                        name: "dish".to_string(),
                        unit_price: 100.0,
                        quantity: 1,
                    }],
                    status,
                    assigned_courier: None,
                    assignment_id: None,
                }],
                created_at: Utc::now(),
            },
        );
        (order_id, shop_id)
    }

    #[test]
    fn pending_advances_to_preparing() {
        let state = test_state();
        let owner = Uuid::new_v4();
        let (order_id, shop_id) = seed_order(&state, owner, ShopOrderStatus::Pending);

        let outcome =
            update_status(&state, order_id, shop_id, ShopOrderStatus::Preparing, owner).unwrap();

        assert_eq!(outcome.status, ShopOrderStatus::Preparing);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn skipping_states_is_rejected_and_status_unchanged() {
        let state = test_state();
        let owner = Uuid::new_v4();
        let (order_id, shop_id) = seed_order(&state, owner, ShopOrderStatus::Pending);

        let err = update_status(&state, order_id, shop_id, ShopOrderStatus::Delivered, owner)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let order = state.orders.get(&order_id).unwrap();
        assert_eq!(
            order.shop_order(shop_id).unwrap().status,
            ShopOrderStatus::Pending
        );
    }

    #[test]
    fn backward_transitions_are_rejected() {
        let state = test_state();
        let owner = Uuid::new_v4();
        let (order_id, shop_id) = seed_order(&state, owner, ShopOrderStatus::Preparing);

        let err = update_status(&state, order_id, shop_id, ShopOrderStatus::Pending, owner)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn only_the_owner_may_transition() {
        let state = test_state();
        let owner = Uuid::new_v4();
        let (order_id, shop_id) = seed_order(&state, owner, ShopOrderStatus::Pending);

        let err = update_status(
            &state,
            order_id,
            shop_id,
            ShopOrderStatus::Preparing,
            Uuid::new_v4(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotOwner));
    }

    #[test]
    fn entering_out_for_delivery_broadcasts_to_couriers() {
        let state = test_state();
        let owner = Uuid::new_v4();
        let courier = seed_courier(&state, 18.521, 73.851);
        let (order_id, shop_id) = seed_order(&state, owner, ShopOrderStatus::Preparing);

        let outcome = update_status(
            &state,
            order_id,
            shop_id,
            ShopOrderStatus::OutForDelivery,
            owner,
        )
        .unwrap();

        assert_eq!(outcome.candidates, vec![courier]);

        let order = state.orders.get(&order_id).unwrap();
        let so = order.shop_order(shop_id).unwrap();
        let assignment_id = so.assignment_id.expect("assignment linked");
        drop(order);

        let assignment = state.assignments.get(&assignment_id).unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Broadcasted);
        assert_eq!(assignment.candidates, vec![courier]);
    }

    #[test]
    fn delivered_requires_a_claimed_assignment() {
        let state = test_state();
        let owner = Uuid::new_v4();
        let courier = seed_courier(&state, 18.521, 73.851);
        let (order_id, shop_id) = seed_order(&state, owner, ShopOrderStatus::Preparing);

        update_status(
            &state,
            order_id,
            shop_id,
            ShopOrderStatus::OutForDelivery,
            owner,
        )
        .unwrap();

        // Broadcast is out but nobody has claimed it yet.
        let err = update_status(&state, order_id, shop_id, ShopOrderStatus::Delivered, owner)
            .unwrap_err();
        assert!(matches!(err, AppError::NoAssignmentToComplete));

        broker::claim(&state, order_id, shop_id, courier).unwrap();

        let outcome =
            update_status(&state, order_id, shop_id, ShopOrderStatus::Delivered, owner).unwrap();
        assert_eq!(outcome.status, ShopOrderStatus::Delivered);

        let order = state.orders.get(&order_id).unwrap();
        let so = order.shop_order(shop_id).unwrap();
        let assignment_id = so.assignment_id.unwrap();
        drop(order);

        let assignment = state.assignments.get(&assignment_id).unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Completed);
    }
}
