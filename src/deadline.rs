// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Absolute deadlines on the realtime clock, the clock pthread timed calls
// measure against by default.

use std::time::{Duration, Instant, SystemTime};

use crate::clock::WallClock;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// An absolute point on the realtime clock: seconds and nanoseconds since the
/// Unix epoch, with `nanos` always in `[0, 1e9)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    pub secs: i64,
    pub nanos: i64,
}

impl Deadline {
    /// The current realtime clock reading.
    #[cfg(unix)]
    pub fn now() -> Self {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        Self {
            secs: ts.tv_sec as i64,
            nanos: ts.tv_nsec as i64,
        }
    }

    /// The current realtime clock reading.
    #[cfg(not(unix))]
    pub fn now() -> Self {
        let wc = WallClock::now();
        Self {
            secs: wc.secs,
            nanos: wc.subsec_nanos(),
        }
    }

    /// `now + timeout`.
    pub fn after(timeout: Duration) -> Self {
        Self::now().plus(timeout)
    }

    /// `now + ms` milliseconds.
    pub fn after_millis(ms: u64) -> Self {
        Self::after(Duration::from_millis(ms))
    }

    /// Translate a point on any supported clock onto the realtime clock.
    ///
    /// Only the distance between `point` and that clock's "now" is carried
    /// over, so skew between the two clocks never shifts the base. Points in
    /// the past map to the current instant.
    pub fn from_point<T: TimePoint>(point: T) -> Self {
        match point.remaining() {
            Some(left) => Self::after(left),
            None => Self::now(),
        }
    }

    /// `self + d`, normalising the nanosecond field.
    pub fn plus(self, d: Duration) -> Self {
        let nanos = self.nanos + d.subsec_nanos() as i64;
        Self {
            secs: self
                .secs
                .saturating_add(d.as_secs().min(i64::MAX as u64) as i64)
                .saturating_add(nanos / NANOS_PER_SEC),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// Test used by the trylock polling loop.
    ///
    /// Seconds and the sub-second remainder are compared independently: the
    /// deadline counts as passed only when both components have reached it.
    pub fn has_passed_at(&self, now: WallClock) -> bool {
        now.secs >= self.secs && now.subsec_nanos() >= self.nanos
    }

    /// The deadline as a `timespec` for pthread timed calls.
    #[cfg(unix)]
    pub fn to_timespec(self) -> libc::timespec {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        ts.tv_sec = self.secs as libc::time_t;
        ts.tv_nsec = self.nanos as libc::c_long;
        ts
    }
}

/// A point in time on some clock that can be turned into a [`Deadline`].
pub trait TimePoint {
    /// Time left until this point according to its own clock, or `None` if it
    /// has already passed.
    fn remaining(&self) -> Option<Duration>;
}

impl TimePoint for Instant {
    fn remaining(&self) -> Option<Duration> {
        self.checked_duration_since(Instant::now())
    }
}

impl TimePoint for SystemTime {
    fn remaining(&self) -> Option<Duration> {
        self.duration_since(SystemTime::now()).ok()
    }
}

impl TimePoint for Deadline {
    fn remaining(&self) -> Option<Duration> {
        let now = Deadline::now();
        if *self <= now {
            return None;
        }
        let mut secs = self.secs - now.secs;
        let mut nanos = self.nanos - now.nanos;
        if nanos < 0 {
            secs -= 1;
            nanos += NANOS_PER_SEC;
        }
        Some(Duration::new(secs as u64, nanos as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carries_nanos() {
        let d = Deadline {
            secs: 10,
            nanos: 900_000_000,
        }
        .plus(Duration::from_millis(250));
        assert_eq!(
            d,
            Deadline {
                secs: 11,
                nanos: 150_000_000
            }
        );
    }

    #[test]
    fn add_whole_seconds() {
        let d = Deadline { secs: 5, nanos: 1 }.plus(Duration::from_millis(3000));
        assert_eq!(d, Deadline { secs: 8, nanos: 1 });
    }

    #[test]
    fn after_millis_is_in_the_future() {
        let before = Deadline::now();
        let d = Deadline::after_millis(1500);
        assert!(d > before);
        assert!(d.nanos < NANOS_PER_SEC);
        assert!(d.secs >= before.secs + 1);
    }

    #[test]
    fn past_points_clamp_to_now() {
        let before = Deadline::now();
        let past = Instant::now() - Duration::from_millis(10);
        let d = Deadline::from_point(past);
        assert!(d >= before);
        assert!(d <= Deadline::now());
    }

    #[test]
    fn instant_maps_onto_realtime() {
        let base = Deadline::now();
        let d = Deadline::from_point(Instant::now() + Duration::from_secs(2));
        let delta = d.remaining_from(base);
        assert!(delta >= Duration::from_millis(1900), "{delta:?}");
        assert!(delta <= Duration::from_millis(2500), "{delta:?}");
    }

    #[test]
    fn system_time_maps_onto_realtime() {
        let base = Deadline::now();
        let d = Deadline::from_point(SystemTime::now() + Duration::from_millis(700));
        let delta = d.remaining_from(base);
        assert!(delta >= Duration::from_millis(600), "{delta:?}");
        assert!(delta <= Duration::from_millis(1200), "{delta:?}");
    }

    #[test]
    fn polling_predicate_compares_components_independently() {
        let d = Deadline {
            secs: 100,
            nanos: 500_000_000,
        };
        assert!(!d.has_passed_at(WallClock { secs: 99, micros: 900_000 }));
        assert!(!d.has_passed_at(WallClock { secs: 100, micros: 499_999 }));
        assert!(d.has_passed_at(WallClock { secs: 100, micros: 500_000 }));
        // A later second with a smaller remainder does not count as passed.
        assert!(!d.has_passed_at(WallClock { secs: 101, micros: 100_000 }));
        assert!(d.has_passed_at(WallClock { secs: 101, micros: 600_000 }));
    }

    impl Deadline {
        fn remaining_from(self, base: Deadline) -> Duration {
            let nanos = (self.secs - base.secs) * NANOS_PER_SEC + (self.nanos - base.nanos);
            Duration::from_nanos(nanos.max(0) as u64)
        }
    }
}
