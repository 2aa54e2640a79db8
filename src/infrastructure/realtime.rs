use crate::realtime::{ConnectionRegistry, DeliveryService, RelationshipGraph, SubscriptionTable};
use std::sync::Arc;
use tracing::info;

/// Wires the registry, graph, and subscription table into a delivery
/// service. All three start empty.
pub fn setup_delivery() -> Arc<DeliveryService> {
    let registry = Arc::new(ConnectionRegistry::new());
    let graph = Arc::new(RelationshipGraph::new());
    let subscriptions = Arc::new(SubscriptionTable::new());

    info!("📡 Realtime delivery service initialized");

    Arc::new(DeliveryService::new(registry, graph, subscriptions))
}
