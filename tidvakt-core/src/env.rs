//! The facade an action sees.
//!
//! Every primitive sends one request and blocks until the scheduler answers;
//! between primitives an action runs straight-line code. A response with
//! `done` set is the global termination signal: the env marks itself stopped
//! and no further requests leave this actor.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tidvakt_gen::DurationGen;
use tidvakt_telemetry::Logger;

use crate::events::Labels;
use crate::resource::ReservationKey;
use crate::sched::{Request, RequestKind, Response, SchedulerClient};
use crate::time::VirtualTime;

/// A held slot on a resource; hand it back through [`Env::release`].
#[derive(Debug)]
pub struct Hold {
    resource: String,
    key: ReservationKey,
}

impl Hold {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn key(&self) -> &ReservationKey {
        &self.key
    }
}

/// Per-actor bridge to the scheduler, with its own deterministic PRNG.
pub struct Env {
    name: String,
    rng: StdRng,
    now: VirtualTime,
    client: SchedulerClient,
    log: Box<dyn Logger>,
    aborted: bool,
    stopped: bool,
}

impl Env {
    pub(crate) fn new(
        name: String,
        seed: u64,
        now: VirtualTime,
        client: SchedulerClient,
        log: Box<dyn Logger>,
    ) -> Self {
        Self {
            name,
            rng: StdRng::seed_from_u64(seed),
            now,
            client,
            log,
            aborted: false,
            stopped: false,
        }
    }

    /// Current virtual time as last observed by this actor.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// The actor's own random stream. Consuming it does not perturb other
    /// actors' streams.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// False once this actor finished or the simulation aborted.
    pub fn is_running(&self) -> bool {
        !(self.aborted || self.stopped)
    }

    /// The actor's logger, tagged with the current virtual time.
    pub fn log(&self) -> Box<dyn Logger> {
        self.log.kv("time", &self.now.to_rfc3339())
    }

    /// Sleeps for a sampled duration of virtual time. Returns true when the
    /// sleep was interrupted by a simulation abort.
    pub fn sleep(&mut self, duration: &dyn DurationGen) -> bool {
        let response = self.send(RequestKind::Delay(duration.sample()));
        response.interrupted
    }

    /// Claims a slot on `resource`, waiting in line up to the sampled
    /// timeout. `None` means the wait timed out (or the simulation ended).
    pub fn acquire(&mut self, resource: &str, timeout: &dyn DurationGen) -> Option<Hold> {
        let response = self.send(RequestKind::AcquireResource {
            resource: resource.to_string(),
            timeout: timeout.sample(),
        });
        if response.timed_out || response.done {
            return None;
        }
        response.reservation_key.map(|key| Hold {
            resource: resource.to_string(),
            key,
        })
    }

    /// Frees a held slot now. Returns true when interrupted by an abort.
    pub fn release(&mut self, hold: Hold) -> bool {
        let response = self.send(RequestKind::ReleaseResource {
            resource: hold.resource,
            key: hold.key,
            delay: None,
        });
        response.interrupted
    }

    /// Claims a slot and schedules its release `hold_for` later without
    /// blocking on it, so the same actor can stack further claims meanwhile.
    /// Returns false when the claim timed out.
    pub fn use_async(
        &mut self,
        resource: &str,
        hold_for: &dyn DurationGen,
        timeout: &dyn DurationGen,
    ) -> bool {
        let Some(hold) = self.acquire(resource, timeout) else {
            return false;
        };
        let delay = hold_for.sample();
        let _ = self.send(RequestKind::ReleaseResource {
            resource: hold.resource,
            key: hold.key,
            delay: Some(delay),
        });
        true
    }

    /// Tears the whole simulation down. Idempotent.
    pub fn abort(&mut self) {
        if self.aborted && self.stopped {
            return;
        }
        self.aborted = true;
        self.stopped = true;
        let _ = self.send(RequestKind::Abort);
    }

    /// Marks this actor finished. Idempotent; the driver shell calls it when
    /// an action returns false, an action may also call it directly.
    pub fn done(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let _ = self.send(RequestKind::Done);
    }

    fn send(&mut self, kind: RequestKind) -> Response {
        let tie_breakers = [
            self.rng.random(),
            self.rng.random(),
            self.rng.random(),
            self.rng.random(),
        ];
        let mut labels = Labels::new();
        labels.insert("name".to_string(), self.name.clone());
        let request = Request {
            actor: self.name.clone(),
            priority: 0,
            tie_breakers,
            labels,
            kind,
        };
        match self.client.schedule(request) {
            Some(response) => {
                self.now = response.now;
                if response.done {
                    self.stopped = true;
                    self.aborted = true;
                }
                response
            }
            None => {
                // Scheduler is gone; behave as if it said "done".
                self.stopped = true;
                self.aborted = true;
                Response {
                    now: self.now,
                    interrupted: true,
                    done: true,
                    ..Default::default()
                }
            }
        }
    }
}
