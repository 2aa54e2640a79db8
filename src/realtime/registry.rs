use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::{DeliveryEvent, DeliveryPolicy, EventCategory};

/// One live socket for one user. The sender side never blocks; the socket
/// task drains the receiver at its own pace.
struct Channel {
    id: Uuid,
    sender: mpsc::UnboundedSender<String>,
}

/// Identifies a registered channel so its owner can tear it down later.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionHandle {
    pub user_id: i64,
    pub channel_id: Uuid,
}

/// All live channels, keyed by user. A user with a phone and a watch holds
/// two entries under the same key and both receive every frame.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: DashMap<i64, Vec<Channel>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh channel. The lifecycle greeting is queued before
    /// the channel becomes visible to senders, so it is always the first
    /// frame the socket sees.
    pub fn connect(&self, user_id: i64) -> (ConnectionHandle, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let channel_id = Uuid::new_v4();

        let greeting = DeliveryEvent::new(
            EventCategory::ConnectionLifecycle,
            json!({ "status": "established", "channel_id": channel_id }),
            DeliveryPolicy::Direct { target: user_id },
        );
        let _ = sender.send(greeting.wire_frame());

        self.channels
            .entry(user_id)
            .or_default()
            .push(Channel { id: channel_id, sender });
        debug!("user {user_id} connected on channel {channel_id}");

        (ConnectionHandle { user_id, channel_id }, receiver)
    }

    /// Removes a single channel. Sibling channels of the same user stay
    /// registered. Returns whether the channel was present.
    pub fn disconnect(&self, handle: ConnectionHandle) -> bool {
        let mut removed = false;
        let mut emptied = false;
        if let Some(mut entry) = self.channels.get_mut(&handle.user_id) {
            let before = entry.len();
            entry.retain(|channel| channel.id != handle.channel_id);
            removed = entry.len() < before;
            emptied = entry.is_empty();
        }
        if emptied {
            self.channels
                .remove_if(&handle.user_id, |_, channels| channels.is_empty());
        }
        if removed {
            debug!(
                "user {} disconnected channel {}",
                handle.user_id, handle.channel_id
            );
        }
        removed
    }

    /// Queues a frame on every channel the user holds. A channel whose
    /// receiver is gone is evicted here; that is the only way a send can
    /// shrink the registry. Returns how many channels accepted the frame.
    pub fn send(&self, user_id: i64, frame: &str) -> usize {
        let mut delivered = 0;
        let mut emptied = false;
        if let Some(mut entry) = self.channels.get_mut(&user_id) {
            entry.retain(|channel| {
                if channel.sender.send(frame.to_string()).is_ok() {
                    delivered += 1;
                    true
                } else {
                    warn!("evicting dead channel {} of user {user_id}", channel.id);
                    false
                }
            });
            emptied = entry.is_empty();
        }
        if emptied {
            self.channels
                .remove_if(&user_id, |_, channels| channels.is_empty());
        }
        delivered
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.channels.contains_key(&user_id)
    }

    pub fn user_count(&self) -> usize {
        self.channels.len()
    }

    pub fn connection_count(&self) -> usize {
        self.channels.iter().map(|entry| entry.len()).sum()
    }
}
