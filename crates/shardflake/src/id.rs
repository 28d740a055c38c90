use core::fmt;

use crate::{
    Config, Layout, Timestamp,
    layout::{shl, shr},
};

/// A packed identifier.
///
/// The raw integer is all there is; interpreting it needs the [`Config`] that
/// produced it (see [`Config::decode`]). IDs from one configuration sort by
/// creation time as plain integers whenever their timestamps differ.
///
/// ```text
///  Bit Index:  MSB                                                          0
///              +----------------+------------------+-----------+----------+
///  Field:      | timestamp      | logical shard id | data type | sequence |
///              +----------------+------------------+-----------+----------+
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    id: u64,
}

impl Id {
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Returns the ID as a zero-padded 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl From<Id> for u64 {
    fn from(id: Id) -> Self {
        id.id
    }
}

impl From<u64> for Id {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// The four fields of an [`Id`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecodedId {
    pub id: Id,
    /// Milliseconds since the configuration's custom epoch.
    pub timestamp: Timestamp,
    pub logical_shard_id: u64,
    pub data_type: u64,
    pub sequence: u64,
    #[cfg_attr(feature = "serde", serde(skip))]
    layout: Option<Layout>,
}

impl DecodedId {
    /// Fields from the most significant down, skipping zero-width ones.
    fn fields(&self) -> impl Iterator<Item = Field> {
        let layout = self.layout;
        let fields = layout.map(|layout| {
            [
                Field {
                    name: "timestamp",
                    bits: layout.timestamp_bits(),
                    shift: layout.timestamp_shift(),
                    value: self.timestamp.milliseconds() as u64,
                },
                Field {
                    name: "logical_shard_id",
                    bits: layout.logical_shard_id_bits(),
                    shift: layout.logical_shard_id_shift(),
                    value: self.logical_shard_id,
                },
                Field {
                    name: "data_type",
                    bits: layout.data_type_bits(),
                    shift: layout.data_type_shift(),
                    value: self.data_type,
                },
                Field {
                    name: "sequence",
                    bits: layout.sequence_bits(),
                    shift: layout.sequence_shift(),
                    value: self.sequence,
                },
            ]
        });
        fields.into_iter().flatten().filter(|field| field.bits > 0)
    }
}

impl Config {
    /// Packs the four fields into an [`Id`].
    ///
    /// `timestamp` is in milliseconds since [`Config::custom_epoch`]. Each
    /// field is masked to its width; out-of-range values are a caller bug and
    /// trip a debug assertion.
    pub fn encode(&self, timestamp: u64, logical_shard_id: u64, data_type: u64, sequence: u64) -> Id {
        let layout = self.layout();
        debug_assert!(timestamp <= layout.max_timestamp(), "timestamp overflow");
        debug_assert!(
            logical_shard_id <= layout.max_logical_shard_id(),
            "logical_shard_id overflow"
        );
        debug_assert!(data_type <= layout.max_data_type(), "data_type overflow");
        debug_assert!(sequence <= layout.max_sequence(), "sequence overflow");

        let timestamp = shl(timestamp & layout.max_timestamp(), layout.timestamp_shift());
        let logical_shard_id = shl(
            logical_shard_id & layout.max_logical_shard_id(),
            layout.logical_shard_id_shift(),
        );
        let data_type = shl(data_type & layout.max_data_type(), layout.data_type_shift());
        let sequence = shl(sequence & layout.max_sequence(), layout.sequence_shift());
        Id::from_raw(timestamp | logical_shard_id | data_type | sequence)
    }

    /// Splits an [`Id`] into its fields. Total over every `u64`: bits outside
    /// the layout are ignored.
    pub fn decode(&self, id: Id) -> DecodedId {
        let layout = self.layout();
        let raw = id.to_raw();
        let timestamp = shr(raw & layout.timestamp_mask(), layout.timestamp_shift());
        DecodedId {
            id,
            // Fits: `Config::new` bounds `custom_epoch + max_timestamp` by i64::MAX.
            timestamp: Timestamp::new(timestamp as i64, self.custom_epoch_i64()),
            logical_shard_id: shr(
                raw & layout.logical_shard_id_mask(),
                layout.logical_shard_id_shift(),
            ),
            data_type: shr(raw & layout.data_type_mask(), layout.data_type_shift()),
            sequence: shr(raw & layout.sequence_mask(), layout.sequence_shift()),
            layout: Some(*layout),
        }
    }
}

struct Field {
    name: &'static str,
    bits: u8,
    shift: u32,
    value: u64,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let high = self.shift + u32::from(self.bits) - 1;
        let range = format!("{high}..{}", self.shift);
        write!(f, "bits {range:<7} {:<16} {}", self.name, self.value)
    }
}

impl fmt::Display for DecodedId {
    /// One line for the raw value, then one per field with its bit range:
    ///
    /// ```text
    /// 406035470746648675 (0x05a2871c00100063) at 1694563200000 ms
    ///   bits 63..23  timestamp        48403200000
    ///   bits 22..20  logical_shard_id 1
    ///   bits 19..11  data_type        0
    ///   bits 10..0   sequence         99
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.id.to_raw();
        write!(
            f,
            "{raw} (0x{raw:016x}) at {} ms",
            self.timestamp.unix_millis()
        )?;
        for field in self.fields() {
            write!(f, "\n  {field}")?;
        }
        Ok(())
    }
}
