use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use utoipa::ToSchema;

use super::event::{DeliveryEvent, DeliveryPolicy, EventCategory};
use super::registry::{ConnectionHandle, ConnectionRegistry};
use super::relationships::RelationshipGraph;
use super::subscriptions::SubscriptionTable;

/// Point-in-time counters for the stats endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryStats {
    pub connected_users: usize,
    pub open_channels: usize,
    pub active_subscriptions: usize,
    pub relationship_edges: usize,
}

/// Routes events to live channels. Fire-and-forget: producers never learn
/// whether anyone was connected, and an offline recipient simply misses
/// the event.
pub struct DeliveryService {
    registry: Arc<ConnectionRegistry>,
    graph: Arc<RelationshipGraph>,
    subscriptions: Arc<SubscriptionTable>,
}

impl DeliveryService {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        graph: Arc<RelationshipGraph>,
        subscriptions: Arc<SubscriptionTable>,
    ) -> Self {
        Self {
            registry,
            graph,
            subscriptions,
        }
    }

    /// Resolves the event's policy to user ids, drops the recipients whose
    /// subscription filter excludes the category, and queues the frame on
    /// whatever channels remain.
    pub fn deliver(&self, event: &DeliveryEvent) {
        let targets = self.resolve_targets(&event.policy);
        if targets.is_empty() {
            debug!("{} event resolved to no recipients", event.category);
            return;
        }

        let frame = event.wire_frame();
        for user_id in targets {
            if !self.subscriptions.is_subscribed(user_id, event.category) {
                debug!("user {user_id} filtered out {} event", event.category);
                continue;
            }
            let queued = self.registry.send(user_id, &frame);
            debug!(
                "{} event queued on {queued} channel(s) of user {user_id}",
                event.category
            );
        }
    }

    fn resolve_targets(&self, policy: &DeliveryPolicy) -> Vec<i64> {
        match policy {
            DeliveryPolicy::Direct { target } => vec![*target],
            DeliveryPolicy::ToCounterpart { source } => match self.graph.trainer_of(*source) {
                Some(trainer_id) => vec![trainer_id],
                None => self.graph.clients_of(*source),
            },
            DeliveryPolicy::Broadcast { targets } => {
                let mut targets = targets.clone();
                targets.sort_unstable();
                targets.dedup();
                targets
            }
        }
    }

    /// Opens a channel for the user. See [`ConnectionRegistry::connect`]
    /// for the greeting guarantee.
    pub fn connect(&self, user_id: i64) -> (ConnectionHandle, mpsc::UnboundedReceiver<String>) {
        self.registry.connect(user_id)
    }

    /// Tears down one channel and tells the user's surviving devices.
    pub fn disconnect(&self, handle: ConnectionHandle) {
        if !self.registry.disconnect(handle) {
            return;
        }
        let notice = DeliveryEvent::new(
            EventCategory::ConnectionLifecycle,
            json!({ "status": "closed", "channel_id": handle.channel_id }),
            DeliveryPolicy::Direct {
                target: handle.user_id,
            },
        );
        self.registry.send(handle.user_id, &notice.wire_frame());
    }

    pub fn subscribe(&self, user_id: i64, category: EventCategory) {
        self.subscriptions.subscribe(user_id, category);
    }

    pub fn unsubscribe(&self, user_id: i64, category: EventCategory) -> bool {
        self.subscriptions.unsubscribe(user_id, category)
    }

    pub fn assign(&self, trainer_id: i64, client_id: i64) {
        self.graph.assign(trainer_id, client_id);
    }

    pub fn unassign(&self, client_id: i64) -> bool {
        self.graph.unassign(client_id)
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            connected_users: self.registry.user_count(),
            open_channels: self.registry.connection_count(),
            active_subscriptions: self.subscriptions.subscription_count(),
            relationship_edges: self.graph.edge_count(),
        }
    }
}
