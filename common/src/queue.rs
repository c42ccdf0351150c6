//! Wait queue (spec §4.3): a FIFO of pending sessions paired with the
//! reservation ledger, all guarded by a single lock so that reservations and
//! releases are serialized.

use crate::{error::ReservationError, ledger::ReservationLedger, types::Session};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Outcome of a `dequeue` attempt.
pub enum DequeueOutcome {
    /// A session fit and has been reserved; it is removed from the queue.
    Ready(Session),
    /// No queued session currently fits; the queue is unchanged.
    Empty,
    /// This expansion's decision for the REDESIGN FLAG in spec §4.3/§9: a
    /// session whose requirement exceeds a pool's *capacity* can never run.
    /// It is evicted from the queue (not left to block smaller sessions
    /// forever) and returned so the caller can surface an `Error` event.
    Unschedulable(Session, ReservationError),
}

/// FIFO of sessions waiting for cluster capacity, backed by the reservation
/// ledger. All operations hold one lock for the queue + ledger; they are
/// O(n) in queue length and expected to be short (spec §4.3).
pub struct WaitQueue {
    inner: Mutex<Inner>,
}

struct Inner {
    items: VecDeque<Session>,
    ledger: ReservationLedger,
}

impl WaitQueue {
    pub fn new(ledger: ReservationLedger) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                ledger,
            }),
        }
    }

    /// Appends a session to the back of the queue.
    pub fn enqueue(&self, session: Session) {
        self.inner.lock().items.push_back(session);
    }

    /// Scans items in insertion order and returns the first one for which
    /// `reserve` succeeds, removing it in place and preserving the order of
    /// the rest ("head-of-line skip"). `PoolCapacity` errors are surfaced as
    /// `Unschedulable` per this expansion's REDESIGN decision; `PoolUnknown`
    /// is treated the same way since it too can never resolve by waiting.
    /// `PoolAvailability` leaves the session queued and moves on to the next
    /// candidate.
    pub fn dequeue(&self) -> DequeueOutcome {
        let mut inner = self.inner.lock();
        let mut index = 0;
        while index < inner.items.len() {
            let candidate = &inner.items[index];
            match inner.ledger.reserve(candidate) {
                Ok(()) => {
                    let session = inner.items.remove(index).expect("index in bounds");
                    return DequeueOutcome::Ready(session);
                }
                Err(err) if err.is_permanent() => {
                    let session = inner.items.remove(index).expect("index in bounds");
                    return DequeueOutcome::Unschedulable(session, err);
                }
                Err(_transient) => {
                    index += 1;
                }
            }
        }
        DequeueOutcome::Empty
    }

    /// Releases the reservation held for `session` (called when an executor
    /// terminates).
    pub fn done(&self, session: &Session) {
        self.inner.lock().ledger.release(session);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pool::PoolRegistry, types::{Component, ComponentKind, Session}};
    use serde_json::json;

    fn session(name: &str, workers: usize) -> Session {
        let driver = Component::new(format!("{}-driver", name), "img", ComponentKind::Driver, "p");
        let workers = (0..workers)
            .map(|i| {
                Component::new(
                    format!("{}-w{}", name, i),
                    "img",
                    ComponentKind::Client,
                    "p",
                )
            })
            .collect();
        Session::new(name, driver, workers, json!({})).unwrap()
    }

    fn queue(capacity: usize) -> WaitQueue {
        let mut registry = PoolRegistry::new();
        registry.register("p", capacity);
        WaitQueue::new(ReservationLedger::new(registry))
    }

    #[test]
    fn head_of_line_skip_three_sessions() {
        // pool capacity 7, sessions need 5 (4 workers+driver), 4, 2.
        let q = queue(7);
        q.enqueue(session("s1", 4));
        q.enqueue(session("s2", 3));
        q.enqueue(session("s3", 1));

        let first = match q.dequeue() {
            DequeueOutcome::Ready(s) => s,
            _ => panic!("expected s1 to fit"),
        };
        assert_eq!(first.name.as_str(), "s1");

        let third = match q.dequeue() {
            DequeueOutcome::Ready(s) => s,
            _ => panic!("expected s3 to fit (s2 doesn't)"),
        };
        assert_eq!(third.name.as_str(), "s3");

        assert!(matches!(q.dequeue(), DequeueOutcome::Empty));

        q.done(&first);
        q.done(&third);

        let second = match q.dequeue() {
            DequeueOutcome::Ready(s) => s,
            _ => panic!("expected s2 to fit now"),
        };
        assert_eq!(second.name.as_str(), "s2");
    }

    #[test]
    fn oversized_session_never_dequeued() {
        let q = queue(3);
        q.enqueue(session("too-big", 10));
        match q.dequeue() {
            DequeueOutcome::Unschedulable(s, err) => {
                assert_eq!(s.name.as_str(), "too-big");
                assert!(err.is_permanent());
            }
            _ => panic!("expected an unschedulable outcome"),
        }
        assert!(q.is_empty());
    }
}
