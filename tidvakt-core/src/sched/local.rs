//! The local scheduler: one loop, one timeline.
//!
//! The loop alternates between a gather phase and a dispatch step. Gather
//! blocks until every still-running actor has exactly one outstanding
//! request; only then is it safe to pop the heap, because an actor without an
//! outstanding request could still schedule something sooner than the current
//! minimum. Dispatch pops the most imminent event, advances virtual time,
//! performs any deferred release, and answers the actor waiting on that
//! event.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::SimError;
use crate::events::{Deferred, Event, EventHeap, EventId, EventKind, HeapKey, Signals};
use crate::resource::{Reservation, Resource};
use crate::sched::{Envelope, Request, RequestKind, Response, SchedulerClient};
use crate::time::VirtualTime;

/// An actor queued on a resource, indexed by name. The request envelope
/// itself stays in the pending table under the timeout event's id.
struct WaitingActor {
    timeout_id: EventId,
    timeout_key: HeapKey,
}

/// Owns the heap, the tables and virtual time for exactly one run.
pub struct LocalScheduler {
    rx: Receiver<Envelope>,
    abort_guard: Arc<Mutex<Option<Response>>>,
    resources: HashMap<String, Box<dyn Resource>>,

    running: usize,
    channel_open: bool,
    current_time: VirtualTime,
    next_event_id: EventId,
    heap: EventHeap,
    pending: HashMap<EventId, Envelope>,
    waiting: HashMap<String, WaitingActor>,
    abort_response: Option<Response>,
}

impl LocalScheduler {
    /// Builds a scheduler for `actor_count` actors and the client handle the
    /// actors share. Resources are deduplicated by id, later registrations
    /// replacing earlier ones.
    pub fn new(
        actor_count: usize,
        resources: Vec<Box<dyn Resource>>,
    ) -> (Self, SchedulerClient) {
        let (tx, rx) = bounded(actor_count.max(1));
        let abort_guard = Arc::new(Mutex::new(None));

        let mut by_id = HashMap::new();
        for resource in resources {
            by_id.insert(resource.id().to_string(), resource);
        }

        let scheduler = Self {
            rx,
            abort_guard: Arc::clone(&abort_guard),
            resources: by_id,
            running: actor_count,
            channel_open: true,
            current_time: VirtualTime::EPOCH,
            next_event_id: 0,
            heap: EventHeap::new(),
            pending: HashMap::new(),
            waiting: HashMap::new(),
            abort_response: None,
        };
        let client = SchedulerClient {
            tx,
            abort: abort_guard,
        };
        (scheduler, client)
    }

    /// Runs the loop to exhaustion and returns the event history in dispatch
    /// order. Consumes the scheduler: its tables live for one run.
    pub fn run(
        mut self,
        start: VirtualTime,
        end: Option<VirtualTime>,
    ) -> Result<Vec<Event>, SimError> {
        self.current_time = start;
        let mut history = Vec::new();

        if let Err(e) = self.gather_initial() {
            self.shutdown();
            return Err(e);
        }

        loop {
            if self.abort_response.is_some() {
                // No barrier once aborted: answer stragglers, flush the heap.
                self.drain_with_abort();
            } else {
                while self.channel_open && self.pending.len() < self.running {
                    match self.rx.recv() {
                        Ok(envelope) => {
                            if let Err(e) = self.handle_request(envelope) {
                                self.shutdown();
                                return Err(e);
                            }
                        }
                        Err(_) => self.channel_open = false,
                    }
                }
                if !self.channel_open {
                    debug!("request channel closed, ending run");
                    self.shutdown();
                    return Ok(history);
                }
            }

            let Some(event) = self.heap.pop_min() else {
                self.shutdown();
                return Ok(history);
            };

            if let Some(end) = end {
                if event.time > end {
                    debug!(%end, "end of simulated time reached");
                    self.latch_abort(Response {
                        now: event.time,
                        interrupted: true,
                        done: true,
                        ..Default::default()
                    });
                    self.shutdown();
                    return Ok(history);
                }
            }

            trace!(id = event.id, kind = %event.kind, actor = %event.actor, time = %event.time, "dispatching");
            self.current_time = event.time;

            if let Some(deferred) = event.deferred.clone() {
                self.run_deferred(deferred);
            }

            if event.signals.has(Signals::ACTOR_DONE) {
                self.waiting.remove(&event.actor);
                self.running = self.running.saturating_sub(1);
            }

            if event.signals.has(Signals::ABORT) {
                debug!(actor = %event.actor, "actor aborted the simulation");
                self.latch_abort(Response {
                    now: event.time,
                    interrupted: true,
                    done: true,
                    ..Default::default()
                });
            }

            if event.timed_out {
                // The wait is over; a release at this same instant must find
                // the waiter gone rather than wake a request that already
                // failed.
                let stale = self
                    .waiting
                    .get(&event.actor)
                    .is_some_and(|w| w.timeout_id == event.id);
                if stale {
                    self.waiting.remove(&event.actor);
                }
            }

            let response = match &self.abort_response {
                Some(resp) => resp.clone(),
                None => Response {
                    now: event.time,
                    interrupted: event.interrupted,
                    timed_out: event.timed_out,
                    done: false,
                    reservation_key: event.reservation_key.clone(),
                },
            };
            if let Some(envelope) = self.pending.remove(&event.id) {
                let _ = envelope.reply.send(response);
            }

            history.push(event);
        }
    }

    /// The only moment several actors race on the request channel is startup:
    /// every actor submits its first request at once. Collect one request per
    /// actor and handle them in actor-name order, so id assignment and FIFO
    /// enqueue order do not depend on host thread scheduling. After the first
    /// dispatch at most one actor is runnable at any time and requests arrive
    /// one by one.
    fn gather_initial(&mut self) -> Result<(), SimError> {
        let mut batch = Vec::with_capacity(self.running);
        while batch.len() < self.running {
            match self.rx.recv() {
                Ok(envelope) => batch.push(envelope),
                Err(_) => {
                    self.channel_open = false;
                    break;
                }
            }
        }
        batch.sort_by(|a, b| a.req.actor.cmp(&b.req.actor));
        trace!(count = batch.len(), "gathered initial requests");
        for envelope in batch {
            self.handle_request(envelope)?;
        }
        Ok(())
    }

    fn handle_request(&mut self, envelope: Envelope) -> Result<(), SimError> {
        match envelope.req.kind.clone() {
            RequestKind::Delay(delay) => {
                let event = self.new_event(
                    &envelope.req,
                    self.current_time + delay,
                    EventKind::WaitedDelay,
                );
                self.push_pending(event, envelope);
            }
            RequestKind::Done => {
                let mut event =
                    self.new_event(&envelope.req, self.current_time, EventKind::ActorDone);
                event.signals = event.signals.with(Signals::ACTOR_DONE);
                self.push_pending(event, envelope);
            }
            RequestKind::Abort => {
                let mut event =
                    self.new_event(&envelope.req, self.current_time, EventKind::ActorAborting);
                event.signals = event.signals.with(Signals::ABORT);
                self.push_pending(event, envelope);
            }
            RequestKind::AcquireResource { resource, timeout } => {
                let actor = envelope.req.actor.clone();
                let reservation = {
                    let res = self.resources.get_mut(&resource).ok_or_else(|| {
                        SimError::UnknownResource {
                            actor: actor.clone(),
                            resource: resource.clone(),
                        }
                    })?;
                    res.acquire_or_enqueue(&actor)
                };
                match reservation {
                    Some(reservation) => {
                        let mut event = self.new_event(
                            &envelope.req,
                            self.current_time,
                            EventKind::AcquiredImmediately,
                        );
                        event.reservation_key = Some(reservation.key());
                        self.push_pending(event, envelope);
                    }
                    None => {
                        let mut event = self.new_event(
                            &envelope.req,
                            self.current_time + timeout,
                            EventKind::TimedOutWaiting,
                        );
                        event.timed_out = true;
                        let timeout_id = event.id;
                        let timeout_key = event.heap_key();
                        self.push_pending(event, envelope);
                        self.waiting.insert(
                            actor,
                            WaitingActor {
                                timeout_id,
                                timeout_key,
                            },
                        );
                    }
                }
            }
            RequestKind::ReleaseResource {
                resource,
                key,
                delay,
            } => {
                if !self.resources.contains_key(&resource) {
                    return Err(SimError::UnknownResource {
                        actor: envelope.req.actor.clone(),
                        resource,
                    });
                }
                match delay {
                    Some(delay) => {
                        let mut event = self.new_event(
                            &envelope.req,
                            self.current_time + delay,
                            EventKind::ReleasedAsync,
                        );
                        event.reservation_key = Some(key.clone());
                        event.deferred = Some(Deferred::Release { resource, key });
                        self.heap.push(event);
                        // The actor does not wait for an async release; answer
                        // right away and leave no pending entry.
                        let _ = envelope.reply.send(Response {
                            now: self.current_time,
                            ..Default::default()
                        });
                    }
                    None => {
                        let mut event = self.new_event(
                            &envelope.req,
                            self.current_time,
                            EventKind::Released,
                        );
                        event.reservation_key = Some(key.clone());
                        event.deferred = Some(Deferred::Release { resource, key });
                        self.push_pending(event, envelope);
                    }
                }
            }
        }
        Ok(())
    }

    fn run_deferred(&mut self, deferred: Deferred) {
        match deferred {
            Deferred::Release { resource, key } => {
                // Detach the resource so the notify callback can borrow the
                // scheduler tables.
                let mut res = self
                    .resources
                    .remove(&resource)
                    .expect("deferred release refers to a registered resource");
                res.release(&key, &mut |next| self.grant_next_in_line(next));
                self.resources.insert(resource, res);
            }
        }
    }

    /// Offers a freed slot to the next queued reservation. Returns false when
    /// its actor is no longer waiting (timed out), true once the grant event
    /// is scheduled.
    fn grant_next_in_line(&mut self, reservation: &Reservation) -> bool {
        let Some(waiting) = self.waiting.remove(reservation.actor()) else {
            return false;
        };
        self.heap.remove(&waiting.timeout_key);
        let Some(envelope) = self.pending.remove(&waiting.timeout_id) else {
            return false;
        };
        let mut event = self.new_event(
            &envelope.req,
            self.current_time,
            EventKind::AcquiredAfterWaiting,
        );
        event.reservation_key = Some(reservation.key());
        self.push_pending(event, envelope);
        true
    }

    fn new_event(&mut self, req: &Request, at: VirtualTime, kind: EventKind) -> Event {
        self.next_event_id += 1;
        Event {
            id: self.next_event_id,
            time: at,
            priority: req.priority,
            tie_breakers: req.tie_breakers,
            actor: req.actor.clone(),
            kind,
            signals: Signals::default(),
            labels: req.labels.clone(),
            interrupted: false,
            timed_out: false,
            reservation_key: None,
            deferred: None,
        }
    }

    fn push_pending(&mut self, event: Event, envelope: Envelope) {
        self.pending.insert(event.id, envelope);
        self.heap.push(event);
    }

    fn latch_abort(&mut self, resp: Response) {
        if self.abort_response.is_none() {
            *self.abort_guard.lock() = Some(resp.clone());
            self.abort_response = Some(resp);
        }
    }

    fn drain_with_abort(&mut self) {
        let Some(resp) = self.abort_response.clone() else {
            return;
        };
        while let Ok(envelope) = self.rx.try_recv() {
            let _ = envelope.reply.send(resp.clone());
        }
    }

    /// Final fan-out on every exit path: latch a terminal response for late
    /// callers and answer everything still pending so no actor stays blocked.
    fn shutdown(&mut self) {
        let resp = self.abort_response.clone().unwrap_or(Response {
            now: self.current_time,
            done: true,
            ..Default::default()
        });
        *self.abort_guard.lock() = Some(resp.clone());
        for (_, envelope) in self.pending.drain() {
            let _ = envelope.reply.send(resp.clone());
        }
        while let Ok(envelope) = self.rx.try_recv() {
            let _ = envelope.reply.send(resp.clone());
        }
    }
}
