use core::ops::RangeInclusive;

use crate::{Error, Layout, Result};

/// How long a `(logical shard, millisecond)` counter outlives its millisecond
/// unless configured otherwise.
pub const DEFAULT_SEQUENCE_RETENTION_MS: u64 = 60_000;

/// Immutable ID configuration: custom epoch, bit layout and the logical shard
/// ids this deployment may hand out.
///
/// Build one per process and share it; every generator, decoder and rendered
/// reservation script derives its constants from it.
///
/// # Example
///
/// ```
/// use shardflake::{Config, Layout};
///
/// let config = Config::new(1_646_160_000_000, Layout::new(40, 3, 9, 11).unwrap())
///     .unwrap()
///     .with_logical_shard_id_range(2..=5)
///     .unwrap();
///
/// assert_eq!(config.logical_shard_id_allowed_range(), 0..=7);
/// assert_eq!(config.logical_shard_id_range(), &(2..=5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    custom_epoch: u64,
    layout: Layout,
    logical_shard_id_range: RangeInclusive<u64>,
    sequence_retention_ms: u64,
}

impl Config {
    /// Creates a configuration that may use every logical shard id the layout
    /// can express.
    ///
    /// `custom_epoch` is in milliseconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the latest instant the layout can
    /// express, `custom_epoch + max_timestamp`, does not fit a signed 64-bit
    /// millisecond count.
    pub fn new(custom_epoch: u64, layout: Layout) -> Result<Self> {
        let latest = custom_epoch
            .checked_add(layout.max_timestamp())
            .filter(|&latest| i64::try_from(latest).is_ok());
        if latest.is_none() {
            return Err(Error::config(format!(
                "custom epoch {custom_epoch} plus the largest {}-bit timestamp ({}) exceeds {} \
                 milliseconds",
                layout.timestamp_bits(),
                layout.max_timestamp(),
                i64::MAX
            )));
        }
        Ok(Self {
            custom_epoch,
            layout,
            logical_shard_id_range: 0..=layout.max_logical_shard_id(),
            sequence_retention_ms: DEFAULT_SEQUENCE_RETENTION_MS,
        })
    }

    /// Restricts the logical shard ids the store may assign.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the range is empty or not contained
    /// in [`Self::logical_shard_id_allowed_range`].
    pub fn with_logical_shard_id_range(mut self, range: RangeInclusive<u64>) -> Result<Self> {
        let allowed = self.logical_shard_id_allowed_range();
        if range.is_empty() || range.start() < allowed.start() || range.end() > allowed.end() {
            return Err(Error::config(format!(
                "logical shard id range {}..={} lies outside the allowed range {}..={} defined by \
                 {} logical shard id bits",
                range.start(),
                range.end(),
                allowed.start(),
                allowed.end(),
                self.layout.logical_shard_id_bits()
            )));
        }
        self.logical_shard_id_range = range;
        Ok(self)
    }

    /// Sets how long, in milliseconds, each sequence counter lives past its
    /// millisecond.
    ///
    /// The store refuses caller-chosen timestamps older than this window, so
    /// widening it allows backfilling further into the past at the cost of
    /// keeping more counters alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `retention_ms` is zero.
    pub fn with_sequence_retention_ms(mut self, retention_ms: u64) -> Result<Self> {
        if retention_ms == 0 {
            return Err(Error::config("sequence retention must be at least 1 ms"));
        }
        self.sequence_retention_ms = retention_ms;
        Ok(self)
    }

    /// Zero point of every encoded timestamp, in Unix milliseconds.
    pub const fn custom_epoch(&self) -> u64 {
        self.custom_epoch
    }

    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    pub const fn logical_shard_id_range(&self) -> &RangeInclusive<u64> {
        &self.logical_shard_id_range
    }

    pub const fn sequence_retention_ms(&self) -> u64 {
        self.sequence_retention_ms
    }

    /// Every logical shard id the layout can express.
    pub fn logical_shard_id_allowed_range(&self) -> RangeInclusive<u64> {
        0..=self.layout.max_logical_shard_id()
    }

    /// Every data type the layout can express.
    pub fn data_type_allowed_range(&self) -> RangeInclusive<u64> {
        0..=self.layout.max_data_type()
    }

    pub(crate) fn custom_epoch_i64(&self) -> i64 {
        // `Config::new` checks `custom_epoch + max_timestamp <= i64::MAX`.
        self.custom_epoch as i64
    }
}
