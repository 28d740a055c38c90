use crate::{Error, Result};

/// Widest layout an [`Id`] can hold.
///
/// [`Id`]: crate::Id
pub const TOTAL_BITS: u8 = 64;

/// Widest layout that keeps every ID inside the positive range of a signed
/// 64-bit integer, so it survives databases and languages without unsigned
/// 64-bit types. See [`Layout::fits_signed`].
pub const SIGNED_TOTAL_BITS: u8 = 63;

/// Bit widths of the four ID fields and the shifts and masks derived from
/// them.
///
/// Fields are laid out low to high so that raw IDs sort by creation time:
///
/// ```text
///  Bit Index:  MSB                                                            0
///              +----------------+----------------------+-----------+----------+
///  Field:      | timestamp      | logical shard id     | data type | sequence |
///              +----------------+----------------------+-----------+----------+
/// ```
///
/// # Example
///
/// ```
/// use shardflake::Layout;
///
/// let layout = Layout::new(41, 3, 9, 11).unwrap();
/// assert_eq!(layout.timestamp_shift(), 23);
/// assert_eq!(layout.max_sequence(), 2047);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    timestamp_bits: u8,
    logical_shard_id_bits: u8,
    data_type_bits: u8,
    sequence_bits: u8,
}

impl Layout {
    /// Creates a layout from the four field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the widths add up to more than
    /// [`TOTAL_BITS`].
    pub fn new(
        timestamp_bits: u8,
        logical_shard_id_bits: u8,
        data_type_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self> {
        let total = u32::from(timestamp_bits)
            + u32::from(logical_shard_id_bits)
            + u32::from(data_type_bits)
            + u32::from(sequence_bits);
        if total > u32::from(TOTAL_BITS) {
            return Err(Error::config(format!(
                "field widths add up to {total} bits (timestamp {timestamp_bits}, logical shard id \
                 {logical_shard_id_bits}, data type {data_type_bits}, sequence {sequence_bits}), \
                 more than the {TOTAL_BITS} available"
            )));
        }
        Ok(Self {
            timestamp_bits,
            logical_shard_id_bits,
            data_type_bits,
            sequence_bits,
        })
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn logical_shard_id_bits(&self) -> u8 {
        self.logical_shard_id_bits
    }

    pub const fn data_type_bits(&self) -> u8 {
        self.data_type_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    /// Number of bits actually used by an ID.
    pub const fn total_bits(&self) -> u8 {
        self.timestamp_bits + self.logical_shard_id_bits + self.data_type_bits + self.sequence_bits
    }

    /// Returns true if every ID fits in a non-negative `i64`.
    pub const fn fits_signed(&self) -> bool {
        self.total_bits() <= SIGNED_TOTAL_BITS
    }

    /// Largest timestamp, in milliseconds past the custom epoch.
    pub const fn max_timestamp(&self) -> u64 {
        max_value(self.timestamp_bits)
    }

    pub const fn max_logical_shard_id(&self) -> u64 {
        max_value(self.logical_shard_id_bits)
    }

    pub const fn max_data_type(&self) -> u64 {
        max_value(self.data_type_bits)
    }

    pub const fn max_sequence(&self) -> u64 {
        max_value(self.sequence_bits)
    }

    /// The sequence always occupies the lowest bits.
    pub const fn sequence_shift(&self) -> u32 {
        0
    }

    pub const fn data_type_shift(&self) -> u32 {
        self.sequence_bits as u32
    }

    pub const fn logical_shard_id_shift(&self) -> u32 {
        self.data_type_shift() + self.data_type_bits as u32
    }

    pub const fn timestamp_shift(&self) -> u32 {
        self.logical_shard_id_shift() + self.logical_shard_id_bits as u32
    }

    /// Bitmask selecting the timestamp field in place.
    pub const fn timestamp_mask(&self) -> u64 {
        shl(self.max_timestamp(), self.timestamp_shift())
    }

    /// Bitmask selecting the logical shard id field in place.
    pub const fn logical_shard_id_mask(&self) -> u64 {
        shl(self.max_logical_shard_id(), self.logical_shard_id_shift())
    }

    /// Bitmask selecting the data type field in place.
    pub const fn data_type_mask(&self) -> u64 {
        shl(self.max_data_type(), self.data_type_shift())
    }

    /// Bitmask selecting the sequence field in place.
    pub const fn sequence_mask(&self) -> u64 {
        shl(self.max_sequence(), self.sequence_shift())
    }
}

/// Shift that yields zero instead of overflowing when a zero-width field sits
/// at bit 64.
pub(crate) const fn shl(value: u64, shift: u32) -> u64 {
    if shift >= u64::BITS { 0 } else { value << shift }
}

pub(crate) const fn shr(value: u64, shift: u32) -> u64 {
    if shift >= u64::BITS { 0 } else { value >> shift }
}

/// `2^bits - 1`, zero for a zero-width field.
const fn max_value(bits: u8) -> u64 {
    if bits == 0 {
        0
    } else {
        u64::MAX >> (64 - bits as u32)
    }
}
