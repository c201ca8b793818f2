use tokio::sync::broadcast;
use tracing::trace;

use crate::event::ControlPlaneEvent;

/// Default channel capacity: slow subscribers that lag past this many
/// buffered events will observe a `RecvError::Lagged` on their next `recv`.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-in/fan-out bus for [`ControlPlaneEvent`]s. Cheap to clone — clones
/// share the same underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ControlPlaneEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    /// Publishes an event to all current subscribers. A publish with zero
    /// subscribers is not an error — events are fire-and-forget.
    pub fn publish(&self, event: ControlPlaneEvent) {
        trace!(?event, "publishing control-plane event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlPlaneEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
