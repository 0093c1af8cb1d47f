use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{haversine_km, sort_nearest_first};
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::user::GeoPoint;
use crate::notify::RealtimeEvent;
use crate::state::AppState;

/// Snapshot of the order fields a broadcast needs; taken by the caller so
/// the broker never has to lock the order itself.
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub shop_id: Uuid,
    pub dropoff: GeoPoint,
    pub radius_km: f64,
}

#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub assignment_id: Uuid,
    pub candidates: Vec<Uuid>,
}

/// Creates the broadcast record for a shop order entering delivery, or
/// refreshes the existing un-claimed one. Idempotent per shop order: a
/// claimed assignment is returned untouched, never duplicated.
pub fn broadcast(state: &AppState, req: BroadcastRequest) -> BroadcastOutcome {
    let existing = state
        .assignments
        .iter()
        .find(|entry| {
            let a = entry.value();
            a.shop_order_id == req.shop_order_id
                && matches!(
                    a.status,
                    AssignmentStatus::Broadcasted | AssignmentStatus::Assigned
                )
        })
        .map(|entry| *entry.key());

    if let Some(id) = existing {
        if let Some(mut assignment) = state.assignments.get_mut(&id) {
            if assignment.status == AssignmentStatus::Assigned {
                return BroadcastOutcome {
                    assignment_id: id,
                    candidates: assignment.candidates.clone(),
                };
            }

            let candidates = select_candidates(state, &req.dropoff, req.radius_km);
            assignment.candidates = candidates.clone();
            assignment.radius_km = req.radius_km;
            assignment.created_at = Utc::now();
            state.metrics.broadcasts_total.inc();

            info!(
                assignment_id = %id,
                shop_order_id = %req.shop_order_id,
                candidates = candidates.len(),
                "broadcast refreshed"
            );

            return BroadcastOutcome {
                assignment_id: id,
                candidates,
            };
        }
    }

    let candidates = select_candidates(state, &req.dropoff, req.radius_km);
    if candidates.is_empty() {
        warn!(
            shop_order_id = %req.shop_order_id,
            "no online couriers for broadcast; sweeper will retry with a wider radius"
        );
    }

    let assignment = DeliveryAssignment {
        id: Uuid::new_v4(),
        order_id: req.order_id,
        shop_order_id: req.shop_order_id,
        shop_id: req.shop_id,
        dropoff: req.dropoff,
        candidates: candidates.clone(),
        status: AssignmentStatus::Broadcasted,
        assigned_courier: None,
        radius_km: req.radius_km,
        created_at: Utc::now(),
        accepted_at: None,
    };

    let assignment_id = assignment.id;
    state.assignments.insert(assignment_id, assignment);
    state.metrics.broadcasts_total.inc();

    info!(
        assignment_id = %assignment_id,
        shop_order_id = %req.shop_order_id,
        candidates = candidates.len(),
        radius_km = req.radius_km,
        "delivery broadcast created"
    );

    BroadcastOutcome {
        assignment_id,
        candidates,
    }
}

/// Online couriers with a known location inside the radius, nearest first.
/// An empty radius result widens to every online courier rather than
/// excluding anyone.
fn select_candidates(state: &AppState, dropoff: &GeoPoint, radius_km: f64) -> Vec<Uuid> {
    let online: Vec<(Uuid, GeoPoint)> = state
        .users
        .iter()
        .filter(|entry| entry.value().is_dispatchable_courier())
        .filter_map(|entry| {
            let location = entry.value().location.clone()?;
            Some((entry.value().id, location))
        })
        .collect();

    let nearby: Vec<(Uuid, GeoPoint)> = online
        .iter()
        .filter(|(_, location)| haversine_km(location, dropoff) <= radius_km)
        .cloned()
        .collect();

    let mut pool = if nearby.is_empty() { online } else { nearby };
    sort_nearest_first(&mut pool, dropoff, |(_, location)| location.clone());
    pool.into_iter().map(|(id, _)| id).collect()
}

/// A courier accepting a broadcast. First caller to get through the
/// compare-and-swap wins; everyone after sees `AlreadyAssigned`.
pub fn claim(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
    courier_id: Uuid,
) -> Result<DeliveryAssignment, AppError> {
    let target = resolve_assignment(state, order_id, shop_id)?;
    finish_claim(state, target, courier_id)
}

/// Owner-driven direct assignment. Same compare-and-swap contract as a
/// courier self-accept, with an ownership check in front.
pub fn assign_courier(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
    courier_id: Uuid,
    acting_owner: Uuid,
) -> Result<DeliveryAssignment, AppError> {
    let target = resolve_assignment(state, order_id, shop_id)?;
    if target.owner_id != acting_owner {
        return Err(AppError::NotOwner);
    }
    finish_claim(state, target, courier_id)
}

/// Open broadcasts a courier may still claim, for the courier's feed.
pub fn open_broadcasts_for(state: &AppState, courier_id: Uuid) -> Vec<DeliveryAssignment> {
    state
        .assignments
        .iter()
        .filter(|entry| {
            let a = entry.value();
            a.status == AssignmentStatus::Broadcasted && a.candidates.contains(&courier_id)
        })
        .map(|entry| entry.value().clone())
        .collect()
}

struct ClaimTarget {
    assignment_id: Uuid,
    shop_order_id: Uuid,
    owner_id: Uuid,
}

fn resolve_assignment(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
) -> Result<ClaimTarget, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .ok_or(AppError::OrderNotFound(order_id))?;
    let so = order
        .shop_order(shop_id)
        .ok_or(AppError::ShopOrderNotFound(shop_id))?;

    let assignment_id = so.assignment_id.ok_or(AppError::AssignmentNotFound(so.id))?;

    Ok(ClaimTarget {
        assignment_id,
        shop_order_id: so.id,
        owner_id: so.owner_id,
    })
}

fn finish_claim(
    state: &AppState,
    target: ClaimTarget,
    courier_id: Uuid,
) -> Result<DeliveryAssignment, AppError> {
    let assignment = match try_claim(state, target.assignment_id, courier_id) {
        Ok(assignment) => assignment,
        Err(err) => {
            let outcome = match &err {
                AppError::AlreadyAssigned => "lost",
                AppError::CourierNotEligible => "ineligible",
                _ => "error",
            };
            state.metrics.claims_total.with_label_values(&[outcome]).inc();
            return Err(err);
        }
    };

    // Mirror onto the shop order. The claim itself is already decided; this
    // write happens outside the assignment guard.
    if let Some(mut order) = state.orders.get_mut(&assignment.order_id) {
        if let Some(so) = order.shop_order_mut(assignment.shop_id) {
            so.assigned_courier = Some(courier_id);
            so.assignment_id = Some(assignment.id);
        }
    }

    state.metrics.claims_total.with_label_values(&["won"]).inc();

    state.notifier.emit(
        courier_id,
        RealtimeEvent::AssignedOrder {
            assignment_id: assignment.id,
            order_id: assignment.order_id,
            shop_order_id: target.shop_order_id,
            dropoff: assignment.dropoff.clone(),
        },
    );
    state.notifier.emit(
        target.owner_id,
        RealtimeEvent::DeliveryAccepted {
            assignment_id: assignment.id,
            order_id: assignment.order_id,
            shop_order_id: target.shop_order_id,
            courier_id,
        },
    );

    info!(
        assignment_id = %assignment.id,
        courier_id = %courier_id,
        "delivery assignment claimed"
    );

    Ok(assignment)
}

/// The atomic test-and-set: precondition check and state change execute
/// under one map-entry guard, so concurrent claimers serialize here and
/// exactly one can observe `Broadcasted`.
fn try_claim(
    state: &AppState,
    assignment_id: Uuid,
    courier_id: Uuid,
) -> Result<DeliveryAssignment, AppError> {
    let mut assignment = state
        .assignments
        .get_mut(&assignment_id)
        .ok_or(AppError::AssignmentNotFound(assignment_id))?;

    if assignment.status != AssignmentStatus::Broadcasted {
        return Err(AppError::AlreadyAssigned);
    }
    if !assignment.candidates.contains(&courier_id) {
        return Err(AppError::CourierNotEligible);
    }

    assignment.status = AssignmentStatus::Assigned;
    assignment.assigned_courier = Some(courier_id);
    assignment.accepted_at = Some(Utc::now());

    Ok(assignment.clone())
}
