//! Immutable event records.
//!
//! Every scheduler decision materialises as an [`Event`] on the priority
//! queue. Events carry everything needed to order them deterministically
//! (virtual time, priority, actor name, id, tie-breakers) plus the bookkeeping
//! the dispatch step reads back (signals, timeout flag, reservation key, a
//! deferred release action).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::resource::ReservationKey;
use crate::time::VirtualTime;

pub mod heap;

pub use heap::{EventHeap, HeapKey};

/// Monotonically increasing event identifier, unique within one run.
pub type EventId = u64;

/// Ordered string labels attached to an event for logging.
pub type Labels = BTreeMap<String, String>;

/// What happened, as a stable human-readable label.
///
/// The `Display` strings are part of the public surface: histories are
/// inspected and asserted against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    WaitedDelay,
    AcquiredImmediately,
    AcquiredAfterWaiting,
    Released,
    ReleasedAsync,
    TimedOutWaiting,
    ActorDone,
    ActorAborting,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::WaitedDelay => "waited a delay",
            EventKind::AcquiredImmediately => "acquired resource immediately",
            EventKind::AcquiredAfterWaiting => "acquired resource after waiting",
            EventKind::Released => "released resource",
            EventKind::ReleasedAsync => "released resource async",
            EventKind::TimedOutWaiting => "timed out waiting for resource",
            EventKind::ActorDone => "actor is done",
            EventKind::ActorAborting => "actor is aborting simulation",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal bits observed by the dispatch step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals(u8);

impl Signals {
    pub const ABORT: Signals = Signals(1);
    pub const ACTOR_DONE: Signals = Signals(1 << 1);

    #[must_use]
    pub const fn with(self, other: Signals) -> Signals {
        Signals(self.0 | other.0)
    }

    pub const fn has(self, other: Signals) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A side effect the scheduler performs when the event is popped.
///
/// Kept as data rather than a closure so events stay cloneable into the
/// returned history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Deferred {
    /// Release `key` on `resource`, promoting the next queued reservation.
    Release {
        resource: String,
        key: ReservationKey,
    },
}

/// A scheduled decision point on the virtual timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub time: VirtualTime,
    /// Higher priority dispatches earlier among same-time events.
    pub priority: i32,
    /// Sampled from the actor's PRNG at request time, exactly four per
    /// request; last resort of the total order.
    pub tie_breakers: [i32; 4],
    pub actor: String,
    pub kind: EventKind,
    pub signals: Signals,
    pub labels: Labels,
    pub interrupted: bool,
    pub timed_out: bool,
    /// Present when the event grants a resource reservation.
    pub reservation_key: Option<ReservationKey>,
    pub(crate) deferred: Option<Deferred>,
}

impl Event {
    /// The key under which this event sits in the heap; also used to cancel
    /// it (timeout events are removed when the reservation arrives first).
    pub fn heap_key(&self) -> HeapKey {
        HeapKey {
            time: self.time,
            priority: self.priority,
            actor: self.actor.clone(),
            id: self.id,
            tie_breakers: self.tie_breakers,
        }
    }
}

/// The total order on events. First decisive comparison wins:
/// earlier time, then higher priority, then lexicographically smaller actor,
/// then smaller id, then element-wise larger tie-breakers.
pub(crate) fn compare_order(a: &HeapKey, b: &HeapKey) -> Ordering {
    a.time
        .cmp(&b.time)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.actor.cmp(&b.actor))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| b.tie_breakers.cmp(&a.tie_breakers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(id: EventId, time: VirtualTime) -> Event {
        Event {
            id,
            time,
            priority: 0,
            tie_breakers: [0; 4],
            actor: "actor".to_string(),
            kind: EventKind::WaitedDelay,
            signals: Signals::default(),
            labels: Labels::new(),
            interrupted: false,
            timed_out: false,
            reservation_key: None,
            deferred: None,
        }
    }

    #[test]
    fn earlier_time_precedes() {
        let a = event(2, VirtualTime::EPOCH + Duration::from_secs(1));
        let b = event(1, VirtualTime::EPOCH + Duration::from_secs(2));
        assert_eq!(compare_order(&a.heap_key(), &b.heap_key()), Ordering::Less);
    }

    #[test]
    fn higher_priority_precedes_at_same_time() {
        let mut a = event(1, VirtualTime::EPOCH);
        let mut b = event(2, VirtualTime::EPOCH);
        a.priority = 0;
        b.priority = 5;
        assert_eq!(
            compare_order(&b.heap_key(), &a.heap_key()),
            Ordering::Less
        );
    }

    #[test]
    fn smaller_actor_name_precedes() {
        let mut a = event(2, VirtualTime::EPOCH);
        let mut b = event(1, VirtualTime::EPOCH);
        a.actor = "fast".to_string();
        b.actor = "slow".to_string();
        assert_eq!(compare_order(&a.heap_key(), &b.heap_key()), Ordering::Less);
    }

    #[test]
    fn smaller_id_precedes_for_same_actor() {
        let a = event(3, VirtualTime::EPOCH);
        let b = event(7, VirtualTime::EPOCH);
        assert_eq!(compare_order(&a.heap_key(), &b.heap_key()), Ordering::Less);
    }

    #[test]
    fn larger_tie_breakers_precede() {
        let mut a = event(1, VirtualTime::EPOCH);
        let mut b = event(1, VirtualTime::EPOCH);
        a.tie_breakers = [9, 0, 0, 0];
        b.tie_breakers = [1, 0, 0, 0];
        assert_eq!(compare_order(&a.heap_key(), &b.heap_key()), Ordering::Less);
    }

    #[test]
    fn signal_bits_compose() {
        let s = Signals::default().with(Signals::ACTOR_DONE);
        assert!(s.has(Signals::ACTOR_DONE));
        assert!(!s.has(Signals::ABORT));
        assert!(!s.is_empty());
        assert!(Signals::default().is_empty());

        let both = s.with(Signals::ABORT);
        assert!(both.has(Signals::ACTOR_DONE) && both.has(Signals::ABORT));
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(EventKind::WaitedDelay.to_string(), "waited a delay");
        assert_eq!(
            EventKind::AcquiredAfterWaiting.to_string(),
            "acquired resource after waiting"
        );
        assert_eq!(
            EventKind::ActorAborting.to_string(),
            "actor is aborting simulation"
        );
    }
}
