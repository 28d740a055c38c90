//! Error types for ID generation.
//!
//! [`Error`] is what every public operation returns. Failures that come from
//! the coordination store are kept as a [`StoreError`] and surface through
//! [`Error::Store`] untouched, so a caller that exhausted its retries sees the
//! same error the store produced on the last attempt.
//!
//! ## Error Cases
//! - `InvalidConfig`: bit widths, epoch or shard range rejected at
//!   construction.
//! - `InvalidArgument`: a bad data type, count or timestamp. Raised before any
//!   network call and never retried.
//! - `InvalidReservation`: the store answered outside of its contract.
//! - `Exhausted`: a single-ID request was granted nothing.
//! - `Store`: a coordination failure (see [`StoreError::is_transient`]).

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for ID generation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The configuration is malformed or out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A per-call argument violated its constraint.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The store returned a reservation that cannot be encoded.
    #[error("invalid reservation: {reason}")]
    InvalidReservation { reason: String },

    /// The store granted no IDs for a request that needed one.
    #[error("coordination store granted no ids")]
    Exhausted,

    /// The coordination store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn reservation(reason: impl Into<String>) -> Self {
        Self::InvalidReservation {
            reason: reason.into(),
        }
    }
}

/// Failures reported by a [`ReservationStore`].
///
/// [`ReservationStore`]: crate::ReservationStore
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The store does not know the script handle, typically because it
    /// restarted and lost its script cache.
    #[error("unknown script handle `{handle}`")]
    NoScript { handle: String },

    /// The reservation script refused the request, e.g. the sequence space of
    /// the current millisecond is used up.
    #[error("reservation rejected by store: {reason}")]
    Rejected { reason: String },

    /// The requested instant is older than the sequence retention window, so
    /// its counters may already be gone.
    #[error("stale timestamp: {reason}")]
    Stale { reason: String },

    /// The store replied with something that is not a reservation.
    #[error("malformed store response: {reason}")]
    MalformedResponse { reason: String },

    /// A Redis command or transport failure.
    #[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

impl StoreError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Command-level failures (unknown script handle, contention inside the
    /// script, error replies) are transient. Stale instants, malformed replies
    /// and transport failures are not: timeouts and reconnects belong to the
    /// connection.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NoScript { .. } | Self::Rejected { .. } => true,
            Self::Stale { .. } | Self::MalformedResponse { .. } => false,
            #[cfg(feature = "redis")]
            Self::Redis(e) => {
                !(e.is_io_error()
                    || e.is_connection_dropped()
                    || e.kind() == redis::ErrorKind::TypeError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_passes_through_unchanged() {
        let err = Error::from(StoreError::Rejected {
            reason: "busy".into(),
        });
        assert_eq!(err.to_string(), "reservation rejected by store: busy");
        assert!(matches!(err, Error::Store(StoreError::Rejected { .. })));
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::NoScript { handle: "abc".into() }.is_transient());
        assert!(StoreError::Rejected { reason: "x".into() }.is_transient());
        assert!(!StoreError::MalformedResponse { reason: "x".into() }.is_transient());
        assert!(!StoreError::Stale { reason: "x".into() }.is_transient());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_error_replies_are_transient() {
        let reply = redis::RedisError::from((redis::ErrorKind::ResponseError, "EXHAUSTED"));
        assert!(StoreError::from(reply).is_transient());

        let io = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(!StoreError::from(io).is_transient());

        let wrong_shape =
            redis::RedisError::from((redis::ErrorKind::TypeError, "response was of incompatible type"));
        assert!(!StoreError::from(wrong_shape).is_transient());
    }
}
