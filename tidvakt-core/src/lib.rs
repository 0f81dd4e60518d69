//! # tidvakt-core
//!
//! A deterministic discrete-event simulation core. Actors cooperate through
//! virtual time: each actor runs on its own thread, issues one scheduler
//! request at a time (sleep, acquire, release, done, abort) and blocks until
//! the scheduler dispatches the matching event. The scheduler serialises all
//! events onto a single priority-ordered timeline, so two runs from the same
//! seed produce the same history down to the byte.
//!
//! ### Key submodules:
//! - `events`: immutable event records and the ordered event heap
//! - `resource`: capacity-limited resources with FIFO reservation queues
//! - `sched`: the request/response protocol and the local scheduler loop
//! - `env`: the facade actions use to talk to the scheduler
//! - `sim`: the simulation driver wiring actors, resources and the logger
//! - `time`: virtual timestamps and time generators
//!
//! Wall-clock execution, distributed scheduling, and preemption are out of
//! scope; the scheduler seam is narrow enough to host a remote variant later.

pub mod env;
pub mod error;
pub mod events;
pub mod resource;
pub mod sched;
pub mod sim;
pub mod time;

pub mod prelude {
    pub use crate::env::{Env, Hold};
    pub use crate::error::SimError;
    pub use crate::events::{Event, EventKind, Signals};
    pub use crate::resource::{FifoResource, Resource};
    pub use crate::sim::{Actor, Simulation};
    pub use crate::time::{StaticTime, TimeGen, VirtualTime};
}

pub use env::{Env, Hold};
pub use error::SimError;
pub use events::{Event, EventId, EventKind, Signals};
pub use resource::{FifoResource, Reservation, ReservationKey, Resource};
pub use sim::{Actor, Simulation};
pub use time::{StaticTime, TimeGen, VirtualTime};
