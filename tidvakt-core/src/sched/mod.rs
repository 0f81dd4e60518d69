//! The rendezvous protocol between actors and the scheduler.
//!
//! Actors submit one [`Request`] at a time through a [`SchedulerClient`] and
//! block until the scheduler dispatches the matching event and answers with a
//! [`Response`]. The request channel is a bounded multi-producer channel into
//! the single scheduler; each request carries its own single-use reply
//! channel. Once the simulation aborts, the latched abort response answers
//! every later request without involving the scheduler loop.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;

use crate::events::Labels;
use crate::resource::ReservationKey;
use crate::time::VirtualTime;

pub mod local;

pub use local::LocalScheduler;

/// What an actor asks the scheduler to do.
#[derive(Debug, Clone)]
pub enum RequestKind {
    /// Wake me after this much virtual time.
    Delay(Duration),
    /// Give me a slot on `resource`, or time me out.
    AcquireResource { resource: String, timeout: Duration },
    /// Free the slot held under `key`. With `delay` set the release happens
    /// that much later and the caller does not wait for it.
    ReleaseResource {
        resource: String,
        key: ReservationKey,
        delay: Option<Duration>,
    },
    /// I am finished.
    Done,
    /// Tear the whole simulation down.
    Abort,
}

/// One scheduling decision requested by an actor.
#[derive(Debug, Clone)]
pub struct Request {
    pub actor: String,
    pub priority: i32,
    /// Four PRNG samples, drawn at request time; the last tie-breaking rung
    /// of the event order.
    pub tie_breakers: [i32; 4],
    pub labels: Labels,
    pub kind: RequestKind,
}

/// The scheduler's answer, delivered when the matching event dispatches.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub now: VirtualTime,
    pub interrupted: bool,
    pub timed_out: bool,
    /// Global termination: the receiving actor must stop issuing requests.
    pub done: bool,
    pub reservation_key: Option<ReservationKey>,
}

/// A request paired with its private reply channel.
pub(crate) struct Envelope {
    pub(crate) req: Request,
    pub(crate) reply: Sender<Response>,
}

/// The capability handed to actors: submit a request, block for the answer.
#[derive(Clone)]
pub struct SchedulerClient {
    tx: Sender<Envelope>,
    abort: Arc<Mutex<Option<Response>>>,
}

impl SchedulerClient {
    /// Blocks until the scheduler answers. Returns `None` only when the
    /// scheduler is gone and never latched a final response, which callers
    /// must treat as termination.
    pub fn schedule(&self, req: Request) -> Option<Response> {
        if let Some(resp) = self.abort.lock().clone() {
            return Some(resp);
        }
        let (reply_tx, reply_rx) = bounded(1);
        let envelope = Envelope {
            req,
            reply: reply_tx,
        };
        if self.tx.send(envelope).is_err() {
            return self.abort.lock().clone();
        }
        match reply_rx.recv() {
            Ok(resp) => Some(resp),
            Err(_) => self.abort.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_returns_none_once_the_scheduler_is_gone() {
        let (scheduler, client) = LocalScheduler::new(1, Vec::new());
        drop(scheduler);

        let resp = client.schedule(Request {
            actor: "a".to_string(),
            priority: 0,
            tie_breakers: [0; 4],
            labels: Labels::new(),
            kind: RequestKind::Done,
        });
        assert!(resp.is_none());
    }
}
