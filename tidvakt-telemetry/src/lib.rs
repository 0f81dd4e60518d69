//! # tidvakt-telemetry
//!
//! Structured key-value logging for simulation runs. A [`Logger`] is an
//! immutable builder: each `kv` call returns a new logger carrying the added
//! pair, and `event` emits a single record with the accumulated pairs plus a
//! terminal `event` key. The simulation driver hands each actor a logger
//! pre-tagged with its name; actions tag further context before emitting.
//!
//! Sinks:
//! - [`MuteLogger`]: drops everything (benchmarks, tests).
//! - [`JsonLogger`]: one JSON object per line, keys in insertion order.
//! - [`PrettyLogger`]: tab-separated `key="value"` lines.

pub mod logger;

pub use logger::{JsonLogger, Logger, MuteLogger, PrettyLogger};
