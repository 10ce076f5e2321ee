//! Run lifecycle event bus
//!
//! Live-only fan-out of run lifecycle events. Each subscriber gets its own
//! bounded buffer; a subscriber that falls behind loses its oldest events
//! instead of slowing down the publisher or other subscribers. Nothing is
//! persisted or replayed.

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::database::RunStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Started {
        task_id: String,
        run_id: String,
    },
    Completed {
        task_id: String,
        run_id: String,
        status: RunStatus,
    },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Never blocks; an event with no subscribers is dropped
    pub fn publish(&self, event: LifecycleEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!("Published lifecycle event to {} subscribers", receivers),
            Err(_) => debug!("No subscribers for lifecycle event"),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One observer's view of the bus. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<LifecycleEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone
    pub async fn next_event(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged behind, dropped {} oldest events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = LifecycleEvent> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next_event()
                .await
                .map(|event| (event, subscription))
        })
    }
}
