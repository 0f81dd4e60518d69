//! Capacity-limited resources with FIFO admission.
//!
//! A resource has `capacity` slots. Acquiring either claims a slot right away
//! or enqueues a reservation at the tail of the wait list. Releasing a slot
//! promotes the head of the list, skipping waiters that already gave up
//! (timed out). Reservations carry their own identity, so one actor can hold
//! several slots on the same resource at once (reentrant async use).

use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Identity of one held or queued slot: `"<seq>-<actor>"`, unique within a
/// run because `seq` is per-resource monotonic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReservationKey(String);

impl ReservationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One slot claim, active or queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    seq: u64,
    actor: String,
}

impl Reservation {
    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn key(&self) -> ReservationKey {
        ReservationKey(format!("{}-{}", self.seq, self.actor))
    }
}

/// A contended entity actors acquire and release through the scheduler.
///
/// The trait is the seam for admission disciplines; only FIFO is shipped
/// (capacity 1 yields a mutex).
pub trait Resource: Send {
    fn id(&self) -> &str;

    /// Claims a slot if one is free, otherwise queues the caller. Returns the
    /// reservation only on an immediate claim.
    fn acquire_or_enqueue(&mut self, actor: &str) -> Option<Reservation>;

    /// Frees the slot held under `key` and promotes waiters: the head of the
    /// queue is offered the slot through `notify`; a `true` return accepts
    /// it, a `false` return means the waiter is gone and the next in line is
    /// offered instead.
    ///
    /// # Panics
    /// If `key` is not currently held; releasing a foreign or stale
    /// reservation is a protocol error.
    fn release(&mut self, key: &ReservationKey, notify: &mut dyn FnMut(&Reservation) -> bool);
}

/// First-in first-out resource.
pub struct FifoResource {
    name: String,
    capacity: usize,
    seq: u64,
    active: HashMap<ReservationKey, Reservation>,
    queue: VecDeque<Reservation>,
}

impl FifoResource {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        assert!(capacity >= 1, "resource capacity must be at least 1");
        Self {
            name: name.into(),
            capacity,
            seq: 0,
            active: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }
}

impl Resource for FifoResource {
    fn id(&self) -> &str {
        &self.name
    }

    fn acquire_or_enqueue(&mut self, actor: &str) -> Option<Reservation> {
        self.seq += 1;
        let reservation = Reservation {
            seq: self.seq,
            actor: actor.to_string(),
        };
        if self.active.len() >= self.capacity {
            self.queue.push_back(reservation);
            return None;
        }
        self.active.insert(reservation.key(), reservation.clone());
        Some(reservation)
    }

    fn release(&mut self, key: &ReservationKey, notify: &mut dyn FnMut(&Reservation) -> bool) {
        if self.active.remove(key).is_none() {
            panic!(
                "released reservation {key} was never acquired on resource {:?}",
                self.name
            );
        }
        while self.active.len() < self.capacity {
            let Some(next_in_line) = self.queue.pop_front() else {
                return;
            };
            if notify(&next_in_line) {
                self.active.insert(next_in_line.key(), next_in_line);
                return;
            }
            // Waiter timed out or vanished; offer the slot onwards.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_up_to_capacity_then_queues() {
        let mut res = FifoResource::new("disk", 2);
        assert!(res.acquire_or_enqueue("a").is_some());
        assert!(res.acquire_or_enqueue("b").is_some());
        assert!(res.acquire_or_enqueue("c").is_none());
        assert_eq!(res.active_count(), 2);
        assert_eq!(res.queued_count(), 1);
    }

    #[test]
    fn keys_embed_sequence_and_actor() {
        let mut res = FifoResource::new("disk", 2);
        let first = res.acquire_or_enqueue("a").unwrap();
        let second = res.acquire_or_enqueue("a").unwrap();
        assert_eq!(first.key().as_str(), "1-a");
        assert_eq!(second.key().as_str(), "2-a");
    }

    #[test]
    fn release_promotes_in_fifo_order() {
        let mut res = FifoResource::new("mutex", 1);
        let held = res.acquire_or_enqueue("a").unwrap();
        res.acquire_or_enqueue("b");
        res.acquire_or_enqueue("c");

        let mut offered = Vec::new();
        res.release(&held.key(), &mut |r| {
            offered.push(r.actor().to_string());
            true
        });
        assert_eq!(offered, vec!["b"]);
        assert_eq!(res.active_count(), 1);

        let held_b = Reservation {
            seq: 2,
            actor: "b".to_string(),
        };
        res.release(&held_b.key(), &mut |r| {
            offered.push(r.actor().to_string());
            true
        });
        assert_eq!(offered, vec!["b", "c"]);
    }

    #[test]
    fn release_skips_vanished_waiters() {
        let mut res = FifoResource::new("mutex", 1);
        let held = res.acquire_or_enqueue("a").unwrap();
        res.acquire_or_enqueue("b");
        res.acquire_or_enqueue("c");

        // "b" is gone; the slot must pass to "c".
        let mut offered = Vec::new();
        res.release(&held.key(), &mut |r| {
            offered.push(r.actor().to_string());
            r.actor() == "c"
        });
        assert_eq!(offered, vec!["b", "c"]);
        assert_eq!(res.active_count(), 1);
        assert_eq!(res.queued_count(), 0);
    }

    #[test]
    fn release_with_empty_queue_just_frees_the_slot() {
        let mut res = FifoResource::new("mutex", 1);
        let held = res.acquire_or_enqueue("a").unwrap();
        res.release(&held.key(), &mut |_| {
            unreachable!("nobody is waiting");
        });
        assert_eq!(res.active_count(), 0);
    }

    #[test]
    fn one_actor_can_hold_several_slots() {
        let mut res = FifoResource::new("pool", 2);
        let first = res.acquire_or_enqueue("a").unwrap();
        let second = res.acquire_or_enqueue("a").unwrap();
        assert_ne!(first.key(), second.key());
        assert!(res.acquire_or_enqueue("a").is_none());
    }

    #[test]
    #[should_panic(expected = "was never acquired")]
    fn releasing_unheld_key_is_fatal() {
        let mut res = FifoResource::new("mutex", 1);
        let phantom = Reservation {
            seq: 9,
            actor: "x".to_string(),
        };
        res.release(&phantom.key(), &mut |_| true);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_is_rejected() {
        let _ = FifoResource::new("broken", 0);
    }
}
