use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Kinds of realtime traffic. Subscriptions filter on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    UploadCompleted,
    UploadDeleted,
    MealCompleted,
    WorkoutCompleted,
    ProgressUpdated,
    PlanUpdated,
    DirectMessage,
    System,
    ConnectionLifecycle,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::UploadCompleted => "upload-completed",
            EventCategory::UploadDeleted => "upload-deleted",
            EventCategory::MealCompleted => "meal-completed",
            EventCategory::WorkoutCompleted => "workout-completed",
            EventCategory::ProgressUpdated => "progress-updated",
            EventCategory::PlanUpdated => "plan-updated",
            EventCategory::DirectMessage => "direct-message",
            EventCategory::System => "system",
            EventCategory::ConnectionLifecycle => "connection-lifecycle",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an event finds its audience.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// One named recipient.
    Direct { target: i64 },
    /// The other side of the source user's training relationship: a
    /// client's trainer, or all of a trainer's clients.
    ToCounterpart { source: i64 },
    /// An explicit recipient list.
    Broadcast { targets: Vec<i64> },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryEvent {
    pub category: EventCategory,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    pub policy: DeliveryPolicy,
}

impl DeliveryEvent {
    pub fn new(category: EventCategory, payload: serde_json::Value, policy: DeliveryPolicy) -> Self {
        Self {
            category,
            payload,
            occurred_at: Utc::now(),
            policy,
        }
    }

    /// The frame connected clients receive. Routing policy stays server-side.
    pub fn wire_frame(&self) -> String {
        json!({
            "category": self.category,
            "payload": self.payload,
            "occurred_at": self.occurred_at,
        })
        .to_string()
    }
}
