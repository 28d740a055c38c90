use serde::Serialize;
use shardflake::{Config, DecodedId, Id};

/// JSON shape of one decoded ID.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub id: Id,
    pub padded: String,
    /// Milliseconds since the custom epoch.
    pub timestamp: i64,
    pub unix_millis: i64,
    pub logical_shard_id: u64,
    pub data_type: u64,
    pub sequence: u64,
}

impl From<&DecodedId> for DecodedRecord {
    fn from(decoded: &DecodedId) -> Self {
        Self {
            id: decoded.id,
            padded: decoded.id.to_padded_string(),
            timestamp: decoded.timestamp.milliseconds(),
            unix_millis: decoded.timestamp.unix_millis(),
            logical_shard_id: decoded.logical_shard_id,
            data_type: decoded.data_type,
            sequence: decoded.sequence,
        }
    }
}

pub fn to_json(config: &Config, ids: &[Id]) -> anyhow::Result<String> {
    let records: Vec<DecodedRecord> = ids
        .iter()
        .map(|id| DecodedRecord::from(&config.decode(*id)))
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// One block per ID, separated by blank lines.
pub fn to_listing(config: &Config, ids: &[Id]) -> String {
    ids.iter()
        .map(|id| config.decode(*id).to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}
