//! ChangeBus (`spec.md` §4.7, §5, §8, C8): in-process fan-out of committed
//! mutations. Publication never blocks: each subscriber gets a bounded
//! `crossbeam_channel`, and a full channel drops the event and marks the
//! subscriber lagged rather than stalling the publisher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use jiff::Timestamp;

use crate::model::Kind;

/// Per-subscriber inbound buffer depth before events are dropped.
const SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
    Delete,
    Approve,
    Reject,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// A committed mutation or approval state change (`spec.md` §4.7).
#[derive(Debug, Clone)]
pub struct Event {
    pub seq: u64,
    pub generation: u64,
    pub kind: Kind,
    pub id: String,
    pub op: Operation,
    pub at: Timestamp,
}

/// What a subscriber receives on each poll: either an event, or a marker
/// that its buffer overflowed and `dropped` events were discarded.
#[derive(Debug, Clone)]
pub enum Delivery {
    Event(Event),
    Lagged { dropped: u64 },
}

/// A subscriber's receiving half. Polling never blocks the publisher;
/// `recv`/`try_recv` block or poll only the subscriber's own thread.
pub struct Subscription {
    rx: crossbeam_channel::Receiver<Delivery>,
}

impl Subscription {
    #[must_use]
    pub fn try_recv(&self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    pub fn recv(&self) -> Option<Delivery> {
        self.rx.recv().ok()
    }
}

struct Subscriber {
    tx: crossbeam_channel::Sender<Delivery>,
    dropped: u64,
}

/// The strictly-monotone-within-a-process-lifetime event fan-out
/// (`spec.md` §5: "sequence restarts at zero across restarts" — callers
/// resume with the `generation` token instead of assuming continuity).
#[derive(Clone)]
pub struct ChangeBus {
    generation: u64,
    seq: Arc<AtomicU64>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl ChangeBus {
    /// Creates a bus stamped with `generation`, a token the process picks
    /// once at startup (e.g. current-time-derived) so reconnecting
    /// subscribers can detect a restart and resync from a snapshot.
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            seq: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Registers a new subscriber and returns its receiving half.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().expect("bus poisoned").push(Subscriber { tx, dropped: 0 });
        Subscription { rx }
    }

    /// Publishes an event, only after the caller's Write is durable
    /// (`spec.md` §5 ordering guarantee). Never blocks: a full subscriber
    /// channel drops the event and is marked lagged on its next successful
    /// send.
    pub fn publish(&self, kind: Kind, id: String, op: Operation, at: Timestamp) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = Event {
            seq,
            generation: self.generation,
            kind,
            id,
            op,
            at,
        };
        let mut subscribers = self.subscribers.lock().expect("bus poisoned");
        for subscriber in subscribers.iter_mut() {
            if subscriber.dropped > 0 {
                if subscriber.tx.try_send(Delivery::Lagged { dropped: subscriber.dropped }).is_ok() {
                    subscriber.dropped = 0;
                } else {
                    subscriber.dropped += 1;
                    continue;
                }
            }
            if subscriber.tx.try_send(Delivery::Event(event.clone())).is_err() {
                subscriber.dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_strictly_increasing() {
        let bus = ChangeBus::new(1);
        let sub = bus.subscribe();
        bus.publish(Kind::Task, "task-001".into(), Operation::Add, Timestamp::now());
        bus.publish(Kind::Task, "task-002".into(), Operation::Add, Timestamp::now());
        let Delivery::Event(e1) = sub.try_recv().unwrap() else { panic!("expected event") };
        let Delivery::Event(e2) = sub.try_recv().unwrap() else { panic!("expected event") };
        assert!(e2.seq > e1.seq);
    }

    #[test]
    fn subscribers_registered_before_publish_receive_exactly_one_event() {
        let bus = ChangeBus::new(1);
        let sub_a = bus.subscribe();
        let sub_b = bus.subscribe();
        bus.publish(Kind::Objective, "obj-001".into(), Operation::Add, Timestamp::now());
        assert!(matches!(sub_a.try_recv(), Some(Delivery::Event(_))));
        assert!(matches!(sub_b.try_recv(), Some(Delivery::Event(_))));
        assert!(sub_a.try_recv().is_none());
    }

    #[test]
    fn full_buffer_yields_lagged_marker_not_block() {
        let bus = ChangeBus::new(1);
        let sub = bus.subscribe();
        for _ in 0..(SUBSCRIBER_CAPACITY + 5) {
            bus.publish(Kind::Task, "task-001".into(), Operation::Add, Timestamp::now());
        }
        // Drain the full buffer, freeing room for the pending lagged marker.
        while sub.try_recv().is_some() {}
        bus.publish(Kind::Task, "task-001".into(), Operation::Add, Timestamp::now());
        let mut saw_lagged = false;
        while let Some(delivery) = sub.try_recv() {
            if matches!(delivery, Delivery::Lagged { .. }) {
                saw_lagged = true;
            }
        }
        assert!(saw_lagged);
    }
}
