//! Per-message event channel.
//!
//! Each processed message gets its own bounded channel: the machine
//! writes through an [`EventSender`], the boundary consumes the
//! [`EventStream`]. The sender re-stamps every event so timestamps are
//! monotonically non-decreasing in emission order, and reports a closed
//! consumer so the machine can treat a disconnect as cancellation.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::trace;

use genesis_types::Event;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// The consuming half handed to the boundary.
pub type EventStream = tokio::sync::mpsc::Receiver<Event>;

/// The emitting half used by the orchestrator and executor.
pub struct EventSender {
    tx: tokio::sync::mpsc::Sender<Event>,
    last_ts: Mutex<DateTime<Utc>>,
}

impl EventSender {
    /// Create a sender/stream pair with the default capacity.
    pub fn channel() -> (Self, EventStream) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a sender/stream pair with a custom capacity.
    pub fn with_capacity(capacity: usize) -> (Self, EventStream) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        (
            Self {
                tx,
                last_ts: Mutex::new(DateTime::<Utc>::MIN_UTC),
            },
            rx,
        )
    }

    /// Emit an event, waiting if the consumer is applying backpressure.
    ///
    /// The timestamp is clamped so it never precedes the previously
    /// emitted event. Returns `false` if the consumer is gone — the
    /// caller should treat this as a cancellation signal.
    pub async fn send(&self, mut event: Event) -> bool {
        {
            let mut last = self.last_ts.lock().unwrap();
            if event.timestamp < *last {
                event.timestamp = *last;
            } else {
                *last = event.timestamp;
            }
        }
        trace!(kind = ?event.kind, "emitting event");
        self.tx.send(event).await.is_ok()
    }

    /// Whether the consuming side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_types::{EventKind, MessageType, Node};

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (sender, mut stream) = EventSender::channel();
        for i in 0..5 {
            assert!(
                sender
                    .send(Event::tool_stdout("t", i, &format!("line-{i}")))
                    .await
            );
        }
        for i in 0..5 {
            let ev = stream.recv().await.unwrap();
            assert_eq!(ev.data["stdout"], format!("line-{i}"));
        }
    }

    #[tokio::test]
    async fn timestamps_non_decreasing() {
        let (sender, mut stream) = EventSender::channel();
        // A manually back-dated event must be clamped forward.
        sender.send(Event::tool_start("a", 0)).await;
        let mut old = Event::tool_start("b", 1);
        old.timestamp = DateTime::<Utc>::MIN_UTC;
        sender.send(old).await;
        sender
            .send(Event::persisted("am-1", MessageType::Response))
            .await;

        let mut last = DateTime::<Utc>::MIN_UTC;
        while let Ok(ev) = stream.try_recv() {
            assert!(ev.timestamp >= last, "timestamp went backwards");
            last = ev.timestamp;
        }
    }

    #[tokio::test]
    async fn dropped_consumer_reports_closed() {
        let (sender, stream) = EventSender::channel();
        drop(stream);
        assert!(sender.is_closed());
        assert!(
            !sender
                .send(Event::updates(
                    Node::Classify,
                    serde_json::json!({}),
                    Node::Precedent
                ))
                .await
        );
    }

    #[tokio::test]
    async fn kinds_pass_through() {
        let (sender, mut stream) = EventSender::channel();
        sender.send(Event::error("boom", None)).await;
        let ev = stream.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Error);
    }
}
