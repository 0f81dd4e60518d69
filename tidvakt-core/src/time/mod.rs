//! Virtual timestamps.
//!
//! The simulation clock is a nanosecond counter that only the scheduler
//! advances, and only forwards. Nothing here reads the host clock.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat};

/// A nanosecond-resolution instant on the virtual timeline.
///
/// The zero value is the epoch; simulations usually start there. Arithmetic
/// saturates so that "infinite" timeouts (`Duration::MAX`) stay representable
/// as a far-future instant instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualTime(u64);

impl VirtualTime {
    pub const EPOCH: VirtualTime = VirtualTime(0);
    pub const MAX: VirtualTime = VirtualTime(u64::MAX);

    pub const fn from_nanos(nanos: u64) -> Self {
        VirtualTime(nanos)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// This instant advanced by `d`, saturating at the far future.
    pub fn advanced_by(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        VirtualTime(self.0.saturating_add(nanos))
    }

    /// Duration elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(self, earlier: VirtualTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// RFC 3339 rendering, the format actor logs carry in their `time` key.
    pub fn to_rfc3339(self) -> String {
        DateTime::from_timestamp_nanos(self.0 as i64)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl Add<Duration> for VirtualTime {
    type Output = VirtualTime;

    fn add(self, d: Duration) -> VirtualTime {
        self.advanced_by(d)
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// A generator of start/end instants for a simulation run.
pub trait TimeGen {
    fn sample(&self) -> VirtualTime;
}

/// Always yields the same instant.
#[derive(Debug, Clone, Copy)]
pub struct StaticTime(pub VirtualTime);

impl TimeGen for StaticTime {
    fn sample(&self) -> VirtualTime {
        self.0
    }
}
