//! Monotonic elapsed-time measurement.

use std::time::{Duration, Instant};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A monotonic timestamp split into whole seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timespec {
    pub secs: i64,
    pub nanos: i64,
}

impl Timespec {
    pub fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }
}

impl From<Duration> for Timespec {
    fn from(d: Duration) -> Self {
        Self {
            secs: d.as_secs() as i64,
            nanos: i64::from(d.subsec_nanos()),
        }
    }
}

/// Seconds elapsed from `start` to `end`.
///
/// When the nanosecond field of `end` is smaller than that of `start`, one
/// second is borrowed from the seconds difference.
///
/// ```
/// use mdp_solvers::timing::{measure_elapsed_time, Timespec};
///
/// let start = Timespec::new(10, 900_000_000);
/// let end = Timespec::new(12, 100_000_000);
/// assert!((measure_elapsed_time(&start, &end) - 1.2).abs() < 1e-6);
/// ```
pub fn measure_elapsed_time(start: &Timespec, end: &Timespec) -> f32 {
    let (secs, nanos) = if end.nanos < start.nanos {
        (
            end.secs - start.secs - 1,
            NANOS_PER_SEC + end.nanos - start.nanos,
        )
    } else {
        (end.secs - start.secs, end.nanos - start.nanos)
    };

    secs as f32 + nanos as f32 * 1e-9
}

/// Stamps monotonic [`Timespec`]s relative to the moment it was started.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    origin: Instant,
    start: Timespec,
}

impl Stopwatch {
    pub fn start() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            start: Timespec::from(origin.elapsed()),
        }
    }

    /// Current monotonic timestamp.
    pub fn timestamp(&self) -> Timespec {
        Timespec::from(self.origin.elapsed())
    }

    /// Seconds since [`Stopwatch::start`].
    pub fn elapsed_secs(&self) -> f32 {
        measure_elapsed_time(&self.start, &self.timestamp())
    }
}
