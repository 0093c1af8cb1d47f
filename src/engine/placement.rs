use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{
    DeliveryAddress, Order, OrderLine, PaymentMethod, PaymentStatus, ShopOrder, ShopOrderStatus,
};
use crate::models::user::{GeoPoint, Role};
use crate::notify::RealtimeEvent;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub item_id: Uuid,
    /// Absent when the client could not attribute the line to a shop; such
    /// carts are rejected outright.
    pub shop_id: Option<Uuid>,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Validates the cart, fans it out into one shop order per shop and persists
/// the whole aggregate, or nothing at all.
pub async fn place_order(
    state: &Arc<AppState>,
    customer_id: Uuid,
    cart: Vec<CartLine>,
    payment_method: PaymentMethod,
    address: AddressInput,
) -> Result<Order, AppError> {
    let started = Instant::now();

    if cart.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let (Some(lat), Some(lng)) = (address.lat, address.lng) else {
        return Err(AppError::InvalidAddress);
    };
    let address_text = address.text.trim().to_string();
    if address_text.is_empty() {
        return Err(AppError::InvalidAddress);
    }

    for line in &cart {
        if line.quantity == 0 {
            return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
        }
        if line.unit_price < 0.0 {
            return Err(AppError::BadRequest("unit price must not be negative".to_string()));
        }
    }

    let customer = state
        .users
        .get(&customer_id)
        .ok_or(AppError::UserNotFound(customer_id))?;
    if customer.role != Role::Customer {
        return Err(AppError::Unauthorized);
    }
    let customer_email = customer.email.clone();
    drop(customer);

    // Partition by shop, keeping shops in first-seen cart order.
    let mut groups: Vec<(Uuid, Vec<&CartLine>)> = Vec::new();
    for line in &cart {
        let shop_id = line.shop_id.ok_or(AppError::MissingShopReference)?;
        match groups.iter_mut().find(|(id, _)| *id == shop_id) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((shop_id, vec![line])),
        }
    }

    let mut shop_orders = Vec::with_capacity(groups.len());
    for (shop_id, lines) in groups {
        let shop = state
            .shops
            .get(&shop_id)
            .ok_or(AppError::ShopNotFound(shop_id))?;
        let owner_id = shop.owner_id;
        drop(shop);

        let subtotal = lines
            .iter()
            .map(|line| line.unit_price * f64::from(line.quantity))
            .sum();
        let lines = lines
            .into_iter()
            .map(|line| OrderLine {
                item_id: line.item_id,
                name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect();

        shop_orders.push(ShopOrder {
            id: Uuid::new_v4(),
            shop_id,
            owner_id,
            subtotal,
            lines,
            status: ShopOrderStatus::Pending,
            assigned_courier: None,
            assignment_id: None,
        });
    }

    let subtotal_sum: f64 = shop_orders.iter().map(|so| so.subtotal).sum();
    let total_amount = subtotal_sum + state.config.delivery_fee;
    let order_id = Uuid::new_v4();

    // Online payment sits on the critical path: charge before persisting so
    // a gateway failure leaves no partial order behind.
    let (payment_status, charge_id) = match payment_method {
        PaymentMethod::CashOnDelivery => (PaymentStatus::NotRequired, None),
        PaymentMethod::Online => {
            let charge = state
                .payments
                .create_charge(order_id, total_amount, &customer_email)
                .await?;
            (PaymentStatus::Pending, Some(charge.charge_id))
        }
    };

    let order = Order {
        id: order_id,
        customer_id,
        payment_method,
        payment_status,
        charge_id,
        delivery_address: DeliveryAddress {
            text: address_text,
            location: GeoPoint { lat, lng },
        },
        delivery_fee: state.config.delivery_fee,
        total_amount,
        shop_orders,
        created_at: Utc::now(),
    };

    state.orders.insert(order.id, order.clone());

    state
        .metrics
        .orders_placed_total
        .with_label_values(&[payment_label(payment_method)])
        .inc();
    state
        .metrics
        .placement_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    for so in &order.shop_orders {
        state.notifier.emit(
            so.owner_id,
            RealtimeEvent::NewOrderReceived {
                order_id: order.id,
                shop_order_id: so.id,
                shop_id: so.shop_id,
                subtotal: so.subtotal,
            },
        );
    }

    // Address normalization and the confirmation mail are off the critical
    // path; failures are logged, never surfaced.
    let task_state = state.clone();
    let dropoff = order.delivery_address.location.clone();
    let total = order.total_amount;
    tokio::spawn(async move {
        if let Err(err) = task_state.geocoder.reverse_geocode(&dropoff).await {
            warn!(order_id = %order_id, error = %err, "reverse geocode failed");
        }

        let subject = format!("Order {order_id} confirmed");
        let body = format!("Your order of {total:.2} has been placed.");
        if let Err(err) = task_state.mailer.send(&customer_email, &subject, &body).await {
            warn!(order_id = %order_id, error = %err, "confirmation mail failed");
        }
    });

    info!(
        order_id = %order.id,
        shops = order.shop_orders.len(),
        total = order.total_amount,
        "order placed"
    );

    Ok(order)
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CashOnDelivery => "cash_on_delivery",
        PaymentMethod::Online => "online",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::{place_order, AddressInput, CartLine};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::shop::Shop;
    use crate::models::user::{GeoPoint, Role, User};
    use crate::services::InMemoryPaymentGateway;
    use crate::state::AppState;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()))
    }

    fn seed_user(state: &AppState, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        state.users.insert(
            id,
            User {
                id,
                full_name: "Test User".to_string(),
                email: format!("{id}@example.com"),
                password_hash: "hash".to_string(),
                mobile: "5550100".to_string(),
                role,
                location: None,
                is_online: false,
                channel_id: None,
                otp: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn seed_shop(state: &AppState, owner_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        state.shops.insert(
            id,
            Shop {
                id,
                owner_id,
                name: "Test Shop".to_string(),
                city: "Pune".to_string(),
                state: "MH".to_string(),
                address: "12 Main Rd".to_string(),
                location: GeoPoint {
                    lat: 18.52,
                    lng: 73.85,
                },
                image_url: None,
                items: Vec::new(),
                created_at: Utc::now(),
            },
        );
        id
    }

    fn address() -> AddressInput {
        AddressInput {
            text: "44 Lake View".to_string(),
            lat: Some(18.53),
            lng: Some(73.86),
        }
    }

    fn line(shop_id: Option<Uuid>, price: f64, quantity: u32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(),
            shop_id,
            name: "dish".to_string(),
            unit_price: price,
            quantity,
        }
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let state = test_state();
        let customer = seed_user(&state, Role::Customer);

        let err = place_order(
            &state,
            customer,
            Vec::new(),
            crate::models::order::PaymentMethod::CashOnDelivery,
            address(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::EmptyCart));
        assert!(state.orders.is_empty());
    }

    #[tokio::test]
    async fn cart_line_without_shop_is_rejected_without_partial_order() {
        let state = test_state();
        let customer = seed_user(&state, Role::Customer);
        let owner = seed_user(&state, Role::Owner);
        let shop = seed_shop(&state, owner);

        let err = place_order(
            &state,
            customer,
            vec![line(Some(shop), 100.0, 1), line(None, 50.0, 1)],
            crate::models::order::PaymentMethod::CashOnDelivery,
            address(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::MissingShopReference));
        assert!(state.orders.is_empty());
    }

    #[tokio::test]
    async fn unknown_shop_aborts_the_whole_placement() {
        let state = test_state();
        let customer = seed_user(&state, Role::Customer);
        let owner = seed_user(&state, Role::Owner);
        let shop = seed_shop(&state, owner);

        let err = place_order(
            &state,
            customer,
            vec![line(Some(shop), 100.0, 1), line(Some(Uuid::new_v4()), 50.0, 1)],
            crate::models::order::PaymentMethod::CashOnDelivery,
            address(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::ShopNotFound(_)));
        assert!(state.orders.is_empty());
    }

    #[tokio::test]
    async fn address_without_coordinates_is_rejected() {
        let state = test_state();
        let customer = seed_user(&state, Role::Customer);
        let owner = seed_user(&state, Role::Owner);
        let shop = seed_shop(&state, owner);

        let err = place_order(
            &state,
            customer,
            vec![line(Some(shop), 100.0, 1)],
            crate::models::order::PaymentMethod::CashOnDelivery,
            AddressInput {
                text: "44 Lake View".to_string(),
                lat: Some(18.53),
                lng: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidAddress));
    }

    #[tokio::test]
    async fn cart_fans_out_into_one_shop_order_per_shop() {
        let state = test_state();
        let customer = seed_user(&state, Role::Customer);
        let owner_a = seed_user(&state, Role::Owner);
        let owner_b = seed_user(&state, Role::Owner);
        let shop_a = seed_shop(&state, owner_a);
        let shop_b = seed_shop(&state, owner_b);

        let order = place_order(
            &state,
            customer,
            vec![line(Some(shop_a), 100.0, 2), line(Some(shop_b), 50.0, 1)],
            crate::models::order::PaymentMethod::CashOnDelivery,
            address(),
        )
        .await
        .unwrap();

        assert_eq!(order.shop_orders.len(), 2);
        assert_eq!(order.shop_orders[0].shop_id, shop_a);
        assert_eq!(order.shop_orders[0].subtotal, 200.0);
        assert_eq!(order.shop_orders[0].owner_id, owner_a);
        assert_eq!(order.shop_orders[1].shop_id, shop_b);
        assert_eq!(order.shop_orders[1].subtotal, 50.0);
        assert_eq!(order.total_amount, 250.0 + state.config.delivery_fee);
        assert!(state.orders.contains_key(&order.id));
    }

    #[tokio::test]
    async fn lines_for_the_same_shop_share_one_shop_order() {
        let state = test_state();
        let customer = seed_user(&state, Role::Customer);
        let owner = seed_user(&state, Role::Owner);
        let shop = seed_shop(&state, owner);

        let order = place_order(
            &state,
            customer,
            vec![line(Some(shop), 80.0, 1), line(Some(shop), 20.0, 3)],
            crate::models::order::PaymentMethod::CashOnDelivery,
            address(),
        )
        .await
        .unwrap();

        assert_eq!(order.shop_orders.len(), 1);
        assert_eq!(order.shop_orders[0].lines.len(), 2);
        assert_eq!(order.shop_orders[0].subtotal, 140.0);
    }

    #[tokio::test]
    async fn declined_online_charge_leaves_no_order_behind() {
        let gateway = Arc::new(InMemoryPaymentGateway::new());
        gateway.set_fail_on_charge(true);

        let state = Arc::new(AppState::with_collaborators(
            Config::default(),
            gateway,
            Arc::new(crate::services::InMemoryGeocoder),
            Arc::new(crate::services::InMemoryMailSender::new()),
            Arc::new(crate::services::InMemoryImageStore),
        ));
        let customer = seed_user(&state, Role::Customer);
        let owner = seed_user(&state, Role::Owner);
        let shop = seed_shop(&state, owner);

        let err = place_order(
            &state,
            customer,
            vec![line(Some(shop), 100.0, 1)],
            crate::models::order::PaymentMethod::Online,
            address(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::PaymentFailed(_)));
        assert!(state.orders.is_empty());
    }
}
