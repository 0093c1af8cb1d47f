use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::broker::{self, BroadcastRequest};
use crate::models::assignment::AssignmentStatus;
use crate::state::AppState;

/// Background loop expiring broadcasts nobody claimed within the configured
/// window and re-broadcasting them with a wider radius.
pub async fn run_expiry_sweeper(state: Arc<AppState>) {
    let interval = std::time::Duration::from_secs(state.config.sweep_interval_secs);
    info!(interval_secs = state.config.sweep_interval_secs, "broadcast expiry sweeper started");

    loop {
        tokio::time::sleep(interval).await;
        sweep_expired(&state);
    }
}

/// One sweep pass. Returns how many broadcasts were expired.
pub fn sweep_expired(state: &AppState) -> usize {
    let window = Duration::seconds(state.config.broadcast_expiry_secs as i64);
    let now = Utc::now();

    let stale: Vec<Uuid> = state
        .assignments
        .iter()
        .filter(|entry| {
            let a = entry.value();
            a.status == AssignmentStatus::Broadcasted && now - a.created_at >= window
        })
        .map(|entry| *entry.key())
        .collect();

    let mut expired = 0;
    for id in stale {
        let Some(mut assignment) = state.assignments.get_mut(&id) else {
            continue;
        };
        // Re-check under the entry guard: a courier may have claimed since
        // the scan.
        if assignment.status != AssignmentStatus::Broadcasted
            || now - assignment.created_at < window
        {
            continue;
        }

        assignment.status = AssignmentStatus::Expired;
        let order_id = assignment.order_id;
        let shop_order_id = assignment.shop_order_id;
        let shop_id = assignment.shop_id;
        let dropoff = assignment.dropoff.clone();
        let next_radius = assignment.radius_km * state.config.radius_growth_factor;
        drop(assignment);

        expired += 1;
        warn!(
            assignment_id = %id,
            shop_order_id = %shop_order_id,
            next_radius_km = next_radius,
            "broadcast expired without a claim, widening radius"
        );

        let outcome = broker::broadcast(
            state,
            BroadcastRequest {
                order_id,
                shop_order_id,
                shop_id,
                dropoff,
                radius_km: next_radius,
            },
        );

        // Point the shop order at the replacement broadcast.
        if let Some(mut order) = state.orders.get_mut(&order_id) {
            if let Some(so) = order.shop_order_mut(shop_id) {
                so.assignment_id = Some(outcome.assignment_id);
            }
        }
    }

    expired
}
