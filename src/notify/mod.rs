use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::order::ShopOrderStatus;
use crate::models::user::GeoPoint;

/// Events pushed over a user's realtime channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// To the shop owner when a new order lands on their shop.
    NewOrderReceived {
        order_id: Uuid,
        shop_order_id: Uuid,
        shop_id: Uuid,
        subtotal: f64,
    },
    /// To the customer on every shop-order status change.
    StatusChanged {
        order_id: Uuid,
        shop_id: Uuid,
        status: ShopOrderStatus,
    },
    /// To the winning courier after a claim or a manual assignment.
    AssignedOrder {
        assignment_id: Uuid,
        order_id: Uuid,
        shop_order_id: Uuid,
        dropoff: GeoPoint,
    },
    /// To the shop owner once a courier is bound.
    DeliveryAccepted {
        assignment_id: Uuid,
        order_id: Uuid,
        shop_order_id: Uuid,
        courier_id: Uuid,
    },
}

/// Best-effort push fan-out: one channel per connected user. Events for
/// users without an attached channel are dropped, never queued.
#[derive(Default)]
pub struct Notifier {
    channels: DashMap<Uuid, mpsc::UnboundedSender<RealtimeEvent>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel for `user_id`, replacing any previous one.
    pub fn subscribe(&self, user_id: Uuid) -> mpsc::UnboundedReceiver<RealtimeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(user_id, tx);
        rx
    }

    pub fn unsubscribe(&self, user_id: Uuid) {
        self.channels.remove(&user_id);
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.channels.contains_key(&user_id)
    }

    pub fn connected_count(&self) -> usize {
        self.channels.len()
    }

    pub fn emit(&self, user_id: Uuid, event: RealtimeEvent) {
        let Some(tx) = self.channels.get(&user_id) else {
            debug!(user_id = %user_id, "realtime event dropped: user not connected");
            return;
        };

        if tx.send(event).is_err() {
            // Receiver side went away without unsubscribing.
            drop(tx);
            self.channels.remove(&user_id);
            debug!(user_id = %user_id, "realtime channel closed, removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Notifier, RealtimeEvent};
    use crate::models::order::ShopOrderStatus;

    fn event(order_id: Uuid) -> RealtimeEvent {
        RealtimeEvent::StatusChanged {
            order_id,
            shop_id: Uuid::new_v4(),
            status: ShopOrderStatus::Preparing,
        }
    }

    #[tokio::test]
    async fn connected_user_receives_events() {
        let notifier = Notifier::new();
        let user = Uuid::new_v4();
        let order = Uuid::new_v4();

        let mut rx = notifier.subscribe(user);
        notifier.emit(user, event(order));

        let received = rx.recv().await.expect("event delivered");
        match received {
            RealtimeEvent::StatusChanged { order_id, .. } => assert_eq!(order_id, order),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn events_for_disconnected_users_are_dropped() {
        let notifier = Notifier::new();
        let user = Uuid::new_v4();

        // No subscription at all.
        notifier.emit(user, event(Uuid::new_v4()));
        assert!(!notifier.is_connected(user));

        // Receiver dropped: the stale channel is cleaned up on next emit.
        let rx = notifier.subscribe(user);
        drop(rx);
        notifier.emit(user, event(Uuid::new_v4()));
        assert!(!notifier.is_connected(user));
    }
}
