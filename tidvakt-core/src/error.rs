//! Fatal simulation errors.
//!
//! Only configuration and orchestration failures surface here. Timing
//! outcomes (acquire timeouts, aborts, end-of-time) are carried as flags on
//! responses and events; protocol violations (releasing a reservation that is
//! not held, duplicate event keys) indicate scheduler-level bugs and panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("actor {actor:?} referenced unknown resource {resource:?}")]
    UnknownResource { actor: String, resource: String },

    #[error("duplicate actor name {0:?}")]
    DuplicateActor(String),

    #[error("actor thread {0:?} panicked")]
    ActorPanic(String),

    #[error("failed to spawn actor thread")]
    Spawn(#[from] std::io::Error),
}
