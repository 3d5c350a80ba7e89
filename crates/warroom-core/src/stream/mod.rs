//! Broadcast of state changes to live subscribers.
//!
//! Every upsert fans out as a tagged [`StreamMessage`] over a
//! `tokio::sync::broadcast` channel. Delivery is at-most-once and
//! best-effort: a send with no active subscribers is logged and dropped,
//! and a slow subscriber that lags past the channel capacity loses the
//! oldest messages. Callers needing stronger guarantees should layer a
//! durable queue on top; this channel is for dashboards.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::event::{LaneSummary, WarRoomEvent};

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// A state-change notification, JSON-serializable for the dashboard wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Full state: all events plus all lane summaries.
    Snapshot {
        /// Ranked events.
        events: Vec<WarRoomEvent>,
        /// One summary per lane.
        summaries: Vec<LaneSummary>,
    },

    /// A single event changed.
    EventUpsert {
        /// The updated event.
        event: WarRoomEvent,
    },

    /// A lane summary changed.
    SummaryUpsert {
        /// The updated summary.
        summary: LaneSummary,
    },
}

/// Fans state-change messages out to live subscribers.
#[derive(Debug, Clone)]
pub struct StreamPublisher {
    tx: broadcast::Sender<StreamMessage>,
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StreamPublisher {
    /// Creates a publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Registers a new subscriber. The receiver observes messages
    /// published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publishes a message, best-effort. A send with no subscribers is not
    /// an error; it is logged and dropped.
    pub fn publish(&self, message: StreamMessage) {
        if self.tx.send(message).is_err() {
            trace!("broadcast dropped: no active subscribers");
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_not_fatal() {
        let publisher = StreamPublisher::default();
        publisher.publish(StreamMessage::Snapshot {
            events: Vec::new(),
            summaries: Vec::new(),
        });
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_tagged_message() {
        let publisher = StreamPublisher::default();
        let mut rx = publisher.subscribe();

        publisher.publish(StreamMessage::Snapshot {
            events: Vec::new(),
            summaries: Vec::new(),
        });

        let message = rx.try_recv().unwrap();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert!(json["events"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_wire_tags() {
        let summary = LaneSummary::new(crate::event::Lane::Value);
        let json = serde_json::to_value(StreamMessage::SummaryUpsert { summary }).unwrap();
        assert_eq!(json["type"], "summary_upsert");
        assert_eq!(json["summary"]["lane"], "value");
    }
}
