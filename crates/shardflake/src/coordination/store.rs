use core::{fmt, future::Future, ops::RangeInclusive};
use std::sync::Arc;

use crate::{StoreError, Timestamp};

/// Opaque name under which a store caches the reservation script (a SHA-1
/// digest for Redis).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScriptHandle(String);

impl ScriptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arguments of one reservation call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReservationRequest {
    pub data_type: u64,
    /// Sequences wanted. The store may grant fewer.
    pub count: u64,
    /// Caller-chosen instant in Unix milliseconds. `None` uses the store's
    /// clock.
    pub timestamp: Option<u64>,
}

impl ReservationRequest {
    pub const fn new(data_type: u64, count: u64, timestamp: Option<u64>) -> Self {
        Self {
            data_type,
            count,
            timestamp,
        }
    }

    /// The script keys, in order: data type, count and the optional
    /// timestamp.
    pub fn keys(&self) -> Vec<u64> {
        let mut keys = vec![self.data_type, self.count];
        keys.extend(self.timestamp);
        keys
    }
}

/// A contiguous run of sequence numbers granted to one logical shard for one
/// millisecond.
///
/// `end_sequence < start_sequence` means nothing was granted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub start_sequence: u64,
    pub end_sequence: u64,
    pub logical_shard_id: u64,
    /// Unix seconds of the reserved millisecond.
    pub seconds: u64,
    /// Microseconds into that second.
    pub microseconds: u32,
}

impl Reservation {
    /// Number of sequences granted.
    pub const fn len(&self) -> u64 {
        if self.end_sequence < self.start_sequence {
            0
        } else {
            self.end_sequence - self.start_sequence + 1
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn sequences(&self) -> RangeInclusive<u64> {
        self.start_sequence..=self.end_sequence
    }

    /// The reserved instant on the Unix epoch.
    pub const fn timestamp(&self) -> Timestamp {
        Timestamp::from_wall_clock(self.seconds as i64, self.microseconds)
    }
}

/// A shared store that executes the reservation script atomically.
///
/// Every call to [`ReservationStore::reserve`] must be atomic with respect to
/// all other callers of the same store: no two grants may overlap on the same
/// `(logical shard id, millisecond, sequence)`.
pub trait ReservationStore {
    /// Uploads the rendered script and returns the handle to invoke it by.
    fn load_script(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<ScriptHandle, StoreError>> + Send;

    /// Runs a previously loaded script. Unknown handles fail with
    /// [`StoreError::NoScript`].
    fn reserve(
        &self,
        handle: &ScriptHandle,
        request: &ReservationRequest,
    ) -> impl Future<Output = Result<Reservation, StoreError>> + Send;
}

impl<S> ReservationStore for Arc<S>
where
    S: ReservationStore,
{
    fn load_script(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<ScriptHandle, StoreError>> + Send {
        (**self).load_script(source)
    }

    fn reserve(
        &self,
        handle: &ScriptHandle,
        request: &ReservationRequest,
    ) -> impl Future<Output = Result<Reservation, StoreError>> + Send {
        (**self).reserve(handle, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_request() {
        assert_eq!(ReservationRequest::new(7, 3, None).keys(), vec![7, 3]);
        assert_eq!(
            ReservationRequest::new(0, 1, Some(1_694_563_200_123)).keys(),
            vec![0, 1, 1_694_563_200_123]
        );
    }

    #[test]
    fn reservation_len() {
        let mut reservation = Reservation {
            start_sequence: 10,
            end_sequence: 14,
            logical_shard_id: 0,
            seconds: 1_694_563_200,
            microseconds: 123_456,
        };
        assert_eq!(reservation.len(), 5);
        assert_eq!(reservation.sequences().count(), 5);
        assert_eq!(reservation.timestamp().unix_millis(), 1_694_563_200_123);

        reservation.end_sequence = 9;
        assert!(reservation.is_empty());
        assert_eq!(reservation.sequences().count(), 0);
    }
}
