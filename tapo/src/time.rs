//! Capture timestamps.
//!
//! Segments are stamped with an [`Instant`], microseconds since some capture epoch. Gaps between
//! segments are plain [`Duration`]s. Tail bursts are judged on sub-millisecond gaps, so the
//! resolution must be finer than the stall tick.
//!
//! [`Instant`]: struct.Instant.html
//! [`Duration`]: https://doc.rust-lang.org/core/time/struct.Duration.html
use core::{fmt, ops};
pub use core::time::Duration;

/// A capture timestamp in microseconds.
///
/// Only differences between two instants carry meaning. Negative values are allowed and simply
/// lie before the epoch of the capture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    /// Microseconds since the arbitrary epoch.
    pub micros: i64,
}

impl Instant {
    /// Create a new `Instant` from a number of microseconds.
    pub fn from_micros<T: Into<i64>>(micros: T) -> Instant {
        Instant { micros: micros.into() }
    }

    /// An instant the given number of milliseconds after the epoch.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { micros: millis.into() * 1000 }
    }

    /// An instant the given number of seconds after the epoch.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { micros: secs.into() * 1_000_000 }
    }

    /// Create a new `Instant` from fractional seconds, as printed by most capture tools.
    ///
    /// Rounds to the closest microsecond.
    pub fn from_secs_f64(secs: f64) -> Instant {
        Instant { micros: (secs * 1_000_000.0).round() as i64 }
    }

    /// The microseconds within the current second.
    pub fn subsec_micros(&self) -> i64 {
        self.micros % 1_000_000
    }

    /// Whole seconds since the epoch.
    pub fn secs(&self) -> i64 {
        self.micros / 1_000_000
    }

    /// Microseconds since the epoch.
    pub fn total_micros(&self) -> i64 {
        self.micros
    }

    /// The time passed since an earlier instant.
    ///
    /// Unlike the subtraction operator this is zero if `earlier` is in fact later. Captures are
    /// assumed to be timestamp-monotonic but we do not want to panic on a slightly jittery clock.
    pub fn saturating_since(self, earlier: Instant) -> Duration {
        let delta = self.micros - earlier.micros;
        if delta <= 0 {
            Duration::from_micros(0)
        } else {
            Duration::from_micros(delta as u64)
        }
    }
}

/// Truncate a duration to whole multiples of `tick`.
///
/// A zero `tick` disables the quantization.
pub fn quantize(duration: Duration, tick: Duration) -> Duration {
    let tick_nanos = tick.as_nanos();
    if tick_nanos == 0 {
        return duration;
    }
    let ticks = duration.as_nanos() / tick_nanos;
    Duration::from_nanos((ticks * tick_nanos) as u64)
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:06}s", self.secs(), self.subsec_micros())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_micros(self.micros + rhs.as_micros() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.micros += rhs.as_micros() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_micros(self.micros - rhs.as_micros() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_micros((self.micros - rhs.micros).abs() as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offsets() {
        assert_eq!(Instant::from_millis(12) + Duration::from_micros(250), Instant::from_micros(12_250));
        assert_eq!(Instant::from_secs(1) - Duration::from_millis(1), Instant::from_micros(999_000));
        assert_eq!(Instant::from_micros(1500) - Instant::from_micros(500), Duration::from_millis(1));
    }

    #[test]
    fn split_seconds() {
        let instant = Instant::from_micros(5_674_321);
        assert_eq!(instant.secs(), 5i64);
        assert_eq!(instant.subsec_micros(), 674_321);
        assert_eq!(instant.total_micros(), 5_674_321);
    }

    #[test]
    fn display_as_seconds() {
        assert_eq!(format!("{}", Instant::from_micros(5_674_321)), "5.674321s");
        assert_eq!(format!("{}", Instant::from_secs(5)), "5.000000s");
    }

    #[test]
    fn fractional_seconds() {
        assert_eq!(Instant::from_secs_f64(1.000_250), Instant::from_micros(1_000_250));
        assert_eq!(Instant::from_secs_f64(0.5), Instant::from_millis(500));
    }

    #[test]
    fn saturating_gap() {
        let early = Instant::from_millis(10);
        let late = Instant::from_millis(25);
        assert_eq!(late.saturating_since(early), Duration::from_millis(15));
        assert_eq!(early.saturating_since(late), Duration::from_millis(0));
    }

    #[test]
    fn truncate_to_ticks() {
        let tick = Duration::from_millis(1);
        assert_eq!(quantize(Duration::from_micros(2_999), tick), Duration::from_millis(2));
        assert_eq!(quantize(Duration::from_micros(999), tick), Duration::from_millis(0));
        assert_eq!(quantize(Duration::from_micros(999), Duration::from_millis(0)),
                   Duration::from_micros(999));
    }
}
