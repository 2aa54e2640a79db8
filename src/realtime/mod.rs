pub mod delivery;
pub mod event;
pub mod registry;
pub mod relationships;
pub mod subscriptions;

pub use delivery::{DeliveryService, DeliveryStats};
pub use event::{DeliveryEvent, DeliveryPolicy, EventCategory};
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use relationships::RelationshipGraph;
pub use subscriptions::SubscriptionTable;
