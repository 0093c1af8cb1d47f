use chrono::Utc;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::rating::Rating;
use crate::state::AppState;

/// Upserts a rating for one (customer, item, order) purchase and folds the
/// change into the item's running average without rescanning history.
pub fn rate_item(
    state: &AppState,
    customer_id: Uuid,
    order_id: Uuid,
    item_id: Uuid,
    score: u8,
    review: Option<String>,
) -> Result<Rating, AppError> {
    if !(1..=5).contains(&score) {
        return Err(AppError::InvalidRatingScore);
    }

    let order = state
        .orders
        .get(&order_id)
        .ok_or(AppError::OrderNotFound(order_id))?;
    if order.customer_id != customer_id {
        return Err(AppError::Unauthorized);
    }
    if !order.contains_item(item_id) {
        return Err(AppError::ItemNotInOrder);
    }
    drop(order);

    if !state.items.contains_key(&item_id) {
        return Err(AppError::ItemNotFound(item_id));
    }

    let now = Utc::now();
    let key = (customer_id, item_id, order_id);

    let (rating, previous_score) = match state.ratings.entry(key) {
        Entry::Occupied(mut occupied) => {
            let previous = occupied.get().score;
            let rating = occupied.get_mut();
            rating.score = score;
            rating.review = review;
            rating.updated_at = now;
            (rating.clone(), Some(previous))
        }
        Entry::Vacant(vacant) => {
            let rating = Rating {
                id: Uuid::new_v4(),
                customer_id,
                item_id,
                order_id,
                score,
                review,
                created_at: now,
                updated_at: now,
            };
            vacant.insert(rating.clone());
            (rating, None)
        }
    };

    if let Some(mut item) = state.items.get_mut(&item_id) {
        let summary = &mut item.rating;
        match previous_score {
            // Replace the old contribution; the count stays put.
            Some(old) if summary.count > 0 => {
                let n = f64::from(summary.count);
                summary.average =
                    (summary.average * n - f64::from(old) + f64::from(score)) / n;
            }
            _ => {
                let n = f64::from(summary.count);
                summary.average = (summary.average * n + f64::from(score)) / (n + 1.0);
                summary.count += 1;
            }
        }
    }

    info!(
        item_id = %item_id,
        order_id = %order_id,
        score,
        "item rated"
    );

    Ok(rating)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::rate_item;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::order::{
        DeliveryAddress, Order, OrderLine, PaymentMethod, PaymentStatus, ShopOrder,
        ShopOrderStatus,
    };
    use crate::models::shop::{FoodType, Item, ItemCategory, RatingSummary};
    use crate::models::user::GeoPoint;
    use crate::state::AppState;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()))
    }

    fn seed_item(state: &AppState, average: f64, count: u32) -> Uuid {
        let id = Uuid::new_v4();
        state.items.insert(
            id,
            Item {
                id,
                shop_id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                name: "Paneer Wrap".to_string(),
                price: 120.0,
                category: ItemCategory::FastFood,
                food_type: FoodType::Veg,
                image_url: None,
                spice_level: None,
                diet_tags: Vec::new(),
                allergens: Vec::new(),
                tags: Vec::new(),
                rating: RatingSummary { average, count },
                created_at: Utc::now(),
            },
        );
        id
    }

    fn seed_order_with_item(state: &AppState, customer_id: Uuid, item_id: Uuid) -> Uuid {
        let order_id = Uuid::new_v4();
        state.orders.insert(
            order_id,
            Order {
                id: order_id,
                customer_id,
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
                total_amount: 160.0,
                shop_orders: vec![ShopOrder {
                    id: Uuid::new_v4(),
                    shop_id: Uuid::new_v4(),
                    owner_id: Uuid::new_v4(),
                    subtotal: 120.0,
                    lines: vec![OrderLine {
                        item_id,
                        name: "Paneer Wrap".to_string(),
                        unit_price: 120.0,
                        quantity: 1,
                    }],
                    status: ShopOrderStatus::Delivered,
                    assigned_courier: None,
                    assignment_id: None,
                }],
                created_at: Utc::now(),
            },
        );
        order_id
    }

    #[test]
    fn first_rating_extends_the_aggregate() {
        let state = test_state();
        let customer = Uuid::new_v4();
        let item = seed_item(&state, 3.0, 2);
        let order = seed_order_with_item(&state, customer, item);

        rate_item(&state, customer, order, item, 4, None).unwrap();

        let summary = state.items.get(&item).unwrap().rating.clone();
        assert_eq!(summary.count, 3);
        // (3.0 * 2 + 4) / 3
        assert!((summary.average - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn rerating_replaces_the_old_contribution() {
        let state = test_state();
        let customer = Uuid::new_v4();
        let item = seed_item(&state, 0.0, 0);
        let order = seed_order_with_item(&state, customer, item);

        rate_item(&state, customer, order, item, 4, Some("great".to_string())).unwrap();
        rate_item(&state, customer, order, item, 2, None).unwrap();

        let summary = state.items.get(&item).unwrap().rating.clone();
        // Count grows by at most one no matter how often the same purchase
        // is re-rated, and the average reads as if only the 2 was given.
        assert_eq!(summary.count, 1);
        assert!((summary.average - 2.0).abs() < 1e-9);
        assert_eq!(state.ratings.len(), 1);

        let stored = state.ratings.get(&(customer, item, order)).unwrap();
        assert_eq!(stored.score, 2);
        assert_eq!(stored.review, None);
    }

    #[test]
    fn average_matches_direct_recomputation() {
        let state = test_state();
        let item = seed_item(&state, 0.0, 0);

        let scores = [5u8, 3, 4, 1, 2];
        for score in scores {
            let customer = Uuid::new_v4();
            let order = seed_order_with_item(&state, customer, item);
            rate_item(&state, customer, order, item, score, None).unwrap();
        }

        let expected: f64 =
            scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64;
        let summary = state.items.get(&item).unwrap().rating.clone();
        assert_eq!(summary.count, scores.len() as u32);
        assert!((summary.average - expected).abs() < 1e-9);
    }

    #[test]
    fn score_outside_one_to_five_is_rejected() {
        let state = test_state();
        let customer = Uuid::new_v4();
        let item = seed_item(&state, 0.0, 0);
        let order = seed_order_with_item(&state, customer, item);

        for score in [0u8, 6] {
            let err = rate_item(&state, customer, order, item, score, None).unwrap_err();
            assert!(matches!(err, AppError::InvalidRatingScore));
        }
        assert!(state.ratings.is_empty());
    }

    #[test]
    fn only_the_purchasing_customer_may_rate() {
        let state = test_state();
        let customer = Uuid::new_v4();
        let item = seed_item(&state, 0.0, 0);
        let order = seed_order_with_item(&state, customer, item);

        let err = rate_item(&state, Uuid::new_v4(), order, item, 4, None).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn items_outside_the_order_cannot_be_rated() {
        let state = test_state();
        let customer = Uuid::new_v4();
        let purchased = seed_item(&state, 0.0, 0);
        let other = seed_item(&state, 0.0, 0);
        let order = seed_order_with_item(&state, customer, purchased);

        let err = rate_item(&state, customer, order, other, 4, None).unwrap_err();
        assert!(matches!(err, AppError::ItemNotInOrder));
    }
}
