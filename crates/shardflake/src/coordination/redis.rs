use core::future::Future;

use redis::{Client, ErrorKind, RedisError, aio::MultiplexedConnection};

use crate::{Reservation, ReservationRequest, ReservationStore, ScriptHandle, StoreError};

/// Error code the reservation script replies with once a shard's sequence
/// space for the current millisecond is used up.
const EXHAUSTED: &str = "EXHAUSTED";

/// Error code for an instant older than the sequence retention window.
const STALE: &str = "STALE";

/// A [`ReservationStore`] backed by Redis.
///
/// The script is uploaded with `SCRIPT LOAD` and invoked with `EVALSHA`. All
/// calls share one multiplexed connection, so the store is cheap to clone and
/// safe to use from many tasks.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Opens a multiplexed connection to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    async fn script_load(&self, source: &str) -> Result<ScriptHandle, StoreError> {
        let mut conn = self.conn.clone();
        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(source)
            .query_async(&mut conn)
            .await?;
        Ok(ScriptHandle::new(sha))
    }

    async fn evalsha(
        &self,
        handle: &ScriptHandle,
        request: &ReservationRequest,
    ) -> Result<Reservation, StoreError> {
        let keys = request.keys();
        let mut conn = self.conn.clone();
        let reply: Result<Vec<i64>, RedisError> = redis::cmd("EVALSHA")
            .arg(handle.as_str())
            .arg(keys.len())
            .arg(&keys)
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(values) => parse_reservation(&values),
            Err(e) => Err(classify(handle, e)),
        }
    }
}

fn classify(handle: &ScriptHandle, e: RedisError) -> StoreError {
    match e.kind() {
        ErrorKind::NoScriptError => StoreError::NoScript {
            handle: handle.to_string(),
        },
        ErrorKind::TypeError => StoreError::MalformedResponse {
            reason: e.to_string(),
        },
        _ if e.code() == Some(EXHAUSTED) => StoreError::Rejected {
            reason: e.to_string(),
        },
        _ if e.code() == Some(STALE) => StoreError::Stale {
            reason: e.to_string(),
        },
        _ => e.into(),
    }
}

impl ReservationStore for RedisStore {
    fn load_script(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<ScriptHandle, StoreError>> + Send {
        self.script_load(source)
    }

    fn reserve(
        &self,
        handle: &ScriptHandle,
        request: &ReservationRequest,
    ) -> impl Future<Output = Result<Reservation, StoreError>> + Send {
        self.evalsha(handle, request)
    }
}

/// Reads `{start, end, shard, seconds, microseconds}`.
fn parse_reservation(values: &[i64]) -> Result<Reservation, StoreError> {
    let malformed = |reason: String| StoreError::MalformedResponse { reason };

    let &[start, end, shard, seconds, microseconds] = values else {
        return Err(malformed(format!(
            "expected 5 integers, got {}",
            values.len()
        )));
    };
    let unsigned = |name: &str, value: i64| {
        u64::try_from(value).map_err(|_| malformed(format!("{name} is negative: {value}")))
    };

    Ok(Reservation {
        start_sequence: unsigned("start sequence", start)?,
        end_sequence: unsigned("end sequence", end)?,
        logical_shard_id: unsigned("logical shard id", shard)?,
        seconds: unsigned("seconds", seconds)?,
        microseconds: u32::try_from(microseconds)
            .ok()
            .filter(|&micros| micros < 1_000_000)
            .ok_or_else(|| malformed(format!("microseconds out of range: {microseconds}")))?,
    })
}
