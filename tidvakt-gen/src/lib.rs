//! # tidvakt-gen
//!
//! Seeded duration generators consumed by the simulation core. Actors hand
//! these to `Env::sleep` and friends instead of raw `Duration` values so that
//! stochastic workloads stay reproducible: every generator owns its own
//! `StdRng` and two runs from the same seed sample the same sequence.
//!
//! Implementations:
//! - [`StaticDuration`]: always the same value.
//! - [`NormalDuration`]: normal distribution around a mean.
//! - [`ExpDuration`]: exponential inter-arrival times for a given rate.
//! - [`UniformDuration`]: uniform over a closed range.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

/// A generator of `Duration` samples.
///
/// Generators are shared behind `&dyn DurationGen`, so sampling takes `&self`;
/// stateful implementations keep their RNG behind a mutex.
pub trait DurationGen: Send + Sync {
    fn sample(&self) -> Duration;
}

/// Plain functions and closures act as generators.
impl<F> DurationGen for F
where
    F: Fn() -> Duration + Send + Sync,
{
    fn sample(&self) -> Duration {
        self()
    }
}

/// Generates the same duration every time.
#[derive(Debug, Clone, Copy)]
pub struct StaticDuration(pub Duration);

impl DurationGen for StaticDuration {
    fn sample(&self) -> Duration {
        self.0
    }
}

/// Samples from a normal distribution centered on `mean`.
///
/// Negative samples clamp to zero; `Duration` cannot go backwards.
pub struct NormalDuration {
    dist: Normal<f64>,
    rng: Mutex<StdRng>,
}

impl NormalDuration {
    /// # Panics
    /// If `std_dev` is not finite and non-negative.
    pub fn new(seed: u64, mean: Duration, std_dev: Duration) -> Self {
        let dist = Normal::new(mean.as_secs_f64(), std_dev.as_secs_f64())
            .expect("standard deviation must be finite and non-negative");
        Self {
            dist,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DurationGen for NormalDuration {
    fn sample(&self) -> Duration {
        let secs = self.dist.sample(&mut *self.rng.lock());
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Samples exponentially distributed durations.
///
/// `rate` plays the role of lambda expressed as a duration: a rate of 2s
/// yields samples with mean 0.5s.
pub struct ExpDuration {
    dist: Exp<f64>,
    rng: Mutex<StdRng>,
}

impl ExpDuration {
    /// # Panics
    /// If `rate` is zero.
    pub fn new(seed: u64, rate: Duration) -> Self {
        let dist = Exp::new(rate.as_secs_f64()).expect("rate must be positive");
        Self {
            dist,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DurationGen for ExpDuration {
    fn sample(&self) -> Duration {
        let secs = self.dist.sample(&mut *self.rng.lock());
        Duration::from_secs_f64(secs)
    }
}

/// Samples uniformly from the closed range `[from, to]`.
pub struct UniformDuration {
    from: f64,
    to: f64,
    rng: Mutex<StdRng>,
}

impl UniformDuration {
    /// # Panics
    /// If `from > to`.
    pub fn new(seed: u64, from: Duration, to: Duration) -> Self {
        assert!(from <= to, "uniform range is inverted");
        Self {
            from: from.as_secs_f64(),
            to: to.as_secs_f64(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DurationGen for UniformDuration {
    fn sample(&self) -> Duration {
        let secs = self.rng.lock().random_range(self.from..=self.to);
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_duration_is_constant() {
        let gen = StaticDuration(Duration::from_millis(250));
        assert_eq!(gen.sample(), Duration::from_millis(250));
        assert_eq!(gen.sample(), Duration::from_millis(250));
    }

    #[test]
    fn closure_acts_as_generator() {
        let gen = || Duration::from_secs(1);
        assert_eq!(DurationGen::sample(&gen), Duration::from_secs(1));
    }

    #[test]
    fn normal_clamps_negative_samples() {
        // Mean 0 with a wide deviation produces negative raw samples; the
        // generator must never yield a panic or an underflow.
        let gen = NormalDuration::new(7, Duration::ZERO, Duration::from_secs(10));
        for _ in 0..100 {
            let d = gen.sample();
            assert!(d >= Duration::ZERO);
        }
    }

    #[test]
    fn normal_is_deterministic_per_seed() {
        let a = NormalDuration::new(42, Duration::from_secs(2), Duration::from_millis(300));
        let b = NormalDuration::new(42, Duration::from_secs(2), Duration::from_millis(300));
        for _ in 0..20 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn exp_samples_are_positive() {
        let gen = ExpDuration::new(3, Duration::from_millis(500));
        for _ in 0..100 {
            assert!(gen.sample() > Duration::ZERO);
        }
    }

    #[test]
    fn uniform_stays_in_range() {
        let from = Duration::from_millis(100);
        let to = Duration::from_millis(900);
        let gen = UniformDuration::new(11, from, to);
        for _ in 0..100 {
            let d = gen.sample();
            assert!(d >= from && d <= to, "{d:?} outside [{from:?}, {to:?}]");
        }
    }

    #[test]
    #[should_panic(expected = "uniform range is inverted")]
    fn uniform_rejects_inverted_range() {
        let _ = UniformDuration::new(0, Duration::from_secs(2), Duration::from_secs(1));
    }
}
