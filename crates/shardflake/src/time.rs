use core::{fmt, time::Duration};
use std::time::{SystemTime, UNIX_EPOCH};

/// The Unix epoch, in milliseconds.
pub const UNIX_EPOCH_MILLIS: i64 = 0;

/// A millisecond count relative to an epoch.
///
/// Both fields are signed so that re-basing between epochs is plain integer
/// arithmetic with no clamping. Sub-millisecond precision is truncated on the
/// way in.
///
/// # Example
///
/// ```
/// use shardflake::Timestamp;
///
/// let ts = Timestamp::from_wall_clock(1_491_177_600, 42_900);
/// assert_eq!(ts.milliseconds(), 1_491_177_600_042);
///
/// let relative = ts.with_epoch(1_483_228_800_000);
/// assert_eq!(relative.milliseconds(), 7_948_800_042);
/// assert_eq!(relative.with_unix_epoch(), ts);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    milliseconds: i64,
    epoch: i64,
}

impl Timestamp {
    pub const fn new(milliseconds: i64, epoch: i64) -> Self {
        Self {
            milliseconds,
            epoch,
        }
    }

    /// A timestamp on the Unix epoch.
    pub const fn from_unix_millis(milliseconds: i64) -> Self {
        Self::new(milliseconds, UNIX_EPOCH_MILLIS)
    }

    /// Builds a Unix timestamp from whole seconds plus the microseconds into
    /// the current second, as reported by Redis `TIME`.
    pub const fn from_wall_clock(seconds: i64, microseconds_part: u32) -> Self {
        Self::from_unix_millis(seconds * 1_000 + (microseconds_part / 1_000) as i64)
    }

    /// Converts a wall-clock instant, truncating below a millisecond.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self::from_unix_millis(after.as_millis() as i64),
            Err(before) => {
                // Truncate toward the earlier millisecond.
                let before = before.duration();
                let partial = u128::from(before.subsec_nanos() % 1_000_000 != 0);
                Self::from_unix_millis(-((before.as_millis() + partial) as i64))
            }
        }
    }

    /// Milliseconds elapsed since [`Self::epoch`].
    pub const fn milliseconds(&self) -> i64 {
        self.milliseconds
    }

    /// The zero point, in Unix milliseconds.
    pub const fn epoch(&self) -> i64 {
        self.epoch
    }

    /// The same instant measured from `new_epoch`.
    pub const fn with_epoch(self, new_epoch: i64) -> Self {
        Self::new(self.milliseconds + (self.epoch - new_epoch), new_epoch)
    }

    pub const fn with_unix_epoch(self) -> Self {
        self.with_epoch(UNIX_EPOCH_MILLIS)
    }

    /// Absolute instant in Unix milliseconds.
    pub const fn unix_millis(&self) -> i64 {
        self.epoch + self.milliseconds
    }

    /// Whole seconds of the absolute instant.
    pub const fn seconds(&self) -> i64 {
        self.unix_millis().div_euclid(1_000)
    }

    /// Microseconds into the current second of the absolute instant.
    pub const fn microseconds_part(&self) -> u32 {
        (self.unix_millis().rem_euclid(1_000) * 1_000) as u32
    }

    /// The absolute instant as a [`SystemTime`].
    pub fn to_system_time(&self) -> SystemTime {
        let unix = self.unix_millis();
        let offset = Duration::from_millis(unix.unsigned_abs());
        if unix >= 0 {
            UNIX_EPOCH + offset
        } else {
            UNIX_EPOCH - offset
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.milliseconds)?;
        if self.epoch != UNIX_EPOCH_MILLIS {
            write!(f, " (epoch {})", self.epoch)?;
        }
        Ok(())
    }
}

/// A source of wall-clock time, in microseconds since the Unix epoch.
///
/// Stores that keep their own clock (see [`MemoryStore`]) read it through this
/// trait so tests can pin or step time.
///
/// # Example
///
/// ```
/// use shardflake::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_micros(&self) -> u64 {
///         1_694_563_200_000_000
///     }
/// }
///
/// assert_eq!(FixedTime.current_micros() / 1_000_000, 1_694_563_200);
/// ```
///
/// [`MemoryStore`]: crate::MemoryStore
pub trait TimeSource {
    fn current_micros(&self) -> u64;
}

/// The system wall clock.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_micros() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2017-04-03T00:00:00Z
    const APRIL_3_2017: i64 = 1_491_177_600_000;
    // 2017-01-01T00:00:00Z
    const JAN_1_2017: i64 = 1_483_228_800_000;

    #[test]
    fn from_wall_clock_truncates_micros() {
        let ts = Timestamp::from_wall_clock(7_948_800, 42_000);
        assert_eq!(ts.milliseconds(), 7_948_800_042);
        assert_eq!(ts.epoch(), 0);

        let ts = Timestamp::from_wall_clock(7_948_800, 42_999);
        assert_eq!(ts.milliseconds(), 7_948_800_042);
    }

    #[test]
    fn seconds_and_microseconds_part() {
        let ts = Timestamp::from_unix_millis(APRIL_3_2017 + 42);
        assert_eq!(ts.seconds(), APRIL_3_2017 / 1_000);
        assert_eq!(ts.microseconds_part(), 42_000);
    }

    #[test]
    fn with_epoch_rebases() {
        let ts = Timestamp::new(7_948_800_000, JAN_1_2017);
        assert_eq!(ts.with_unix_epoch().milliseconds(), APRIL_3_2017);
        assert_eq!(ts.with_unix_epoch().with_epoch(JAN_1_2017), ts);
        assert_eq!(ts.with_epoch(JAN_1_2017), ts);
    }

    #[test]
    fn with_epoch_does_not_clamp() {
        let ts = Timestamp::from_unix_millis(1_000).with_epoch(5_000);
        assert_eq!(ts.milliseconds(), -4_000);
        assert_eq!(ts.unix_millis(), 1_000);
    }

    #[test]
    fn to_system_time_with_custom_epoch() {
        let ts = Timestamp::new(7_948_800_000, JAN_1_2017);
        let expected = UNIX_EPOCH + Duration::from_millis(APRIL_3_2017 as u64);
        assert_eq!(ts.to_system_time(), expected);
        assert_eq!(Timestamp::from_system_time(expected), ts.with_unix_epoch());
    }

    #[test]
    fn system_time_round_trip_truncates() {
        let time = UNIX_EPOCH + Duration::from_micros(1_491_177_600_042_731);
        let ts = Timestamp::from_system_time(time);
        assert_eq!(ts.milliseconds(), APRIL_3_2017 + 42);
        assert_eq!(
            ts.to_system_time(),
            UNIX_EPOCH + Duration::from_millis(APRIL_3_2017 as u64 + 42)
        );
    }

    #[test]
    fn before_unix_epoch() {
        let time = UNIX_EPOCH - Duration::from_micros(1_500);
        let ts = Timestamp::from_system_time(time);
        assert_eq!(ts.milliseconds(), -2);
        assert_eq!(ts.seconds(), -1);
        assert_eq!(ts.microseconds_part(), 998_000);
        assert_eq!(ts.to_system_time(), UNIX_EPOCH - Duration::from_millis(2));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.current_micros() > 1_577_836_800_000_000);
    }
}
