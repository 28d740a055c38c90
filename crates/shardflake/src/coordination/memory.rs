use core::future::{Future, ready};
use std::{
    collections::{HashMap, HashSet, hash_map::DefaultHasher},
    hash::{Hash, Hasher},
};

use parking_lot::Mutex;

use crate::{
    Config, Reservation, ReservationRequest, ReservationStore, ScriptHandle, StoreError,
    SystemClock, TimeSource,
};

/// An in-process [`ReservationStore`].
///
/// Runs the same algorithm as the Redis script behind one mutex: a strict
/// round-robin cursor over the configured logical shards and one counter per
/// `(logical shard, millisecond)` that expires like its Redis key would, one
/// retention window after its millisecond.
/// Useful for tests and for single-process deployments.
///
/// Script handles are tied to a generation; [`MemoryStore::flush_scripts`]
/// starts a new one, the way a Redis restart empties the script cache.
pub struct MemoryStore<T = SystemClock> {
    config: Config,
    clock: T,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    generation: u64,
    scripts: HashSet<String>,
    cursor: u64,
    sequences: HashMap<(u64, u64), Counter>,
}

struct Counter {
    next: u64,
    expires_at_ms: u64,
}

impl MemoryStore {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<T> MemoryStore<T>
where
    T: TimeSource,
{
    /// Creates a store that reads "now" from `clock`.
    pub fn with_clock(config: Config, clock: T) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forgets every loaded script.
    pub fn flush_scripts(&self) {
        let mut state = self.state.lock();
        state.scripts.clear();
        state.generation += 1;
    }

    /// Number of live `(logical shard, millisecond)` counters.
    pub fn live_counters(&self) -> usize {
        let now_ms = self.clock.current_micros() / 1_000;
        let mut state = self.state.lock();
        state.prune(now_ms);
        state.sequences.len()
    }

    fn load(&self, source: &str) -> ScriptHandle {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);

        let mut state = self.state.lock();
        let handle = format!("memory-{}-{:016x}", state.generation, hasher.finish());
        state.scripts.insert(handle.clone());
        ScriptHandle::new(handle)
    }

    fn run(
        &self,
        handle: &ScriptHandle,
        request: &ReservationRequest,
    ) -> Result<Reservation, StoreError> {
        let now_micros = self.clock.current_micros();
        let mut state = self.state.lock();
        if !state.scripts.contains(handle.as_str()) {
            return Err(StoreError::NoScript {
                handle: handle.to_string(),
            });
        }
        if request.count < 1 {
            return Err(StoreError::Rejected {
                reason: format!(
                    "count must be a positive integer, got {}",
                    request.count
                ),
            });
        }

        let now_ms = now_micros / 1_000;
        let retention_ms = self.config.sequence_retention_ms();
        let (seconds, microseconds) = match request.timestamp {
            Some(millis) if millis.saturating_add(retention_ms) <= now_ms => {
                return Err(StoreError::Stale {
                    reason: format!(
                        "timestamp {millis} is more than {retention_ms} ms before the store \
                         clock {now_ms}"
                    ),
                });
            }
            Some(millis) => (millis / 1_000, (millis % 1_000) as u32 * 1_000),
            None => (
                now_micros / 1_000_000,
                (now_micros % 1_000_000) as u32,
            ),
        };
        let millis = seconds * 1_000 + u64::from(microseconds / 1_000);

        let range = self.config.logical_shard_id_range();
        let shard_count = range.end() - range.start() + 1;
        state.cursor += 1;
        let cursor = state.cursor;
        if cursor >= shard_count {
            state.cursor = 0;
        }
        let logical_shard_id = range.start() + (cursor - 1) % shard_count;

        state.prune(now_ms);
        let counter = state
            .sequences
            .entry((logical_shard_id, millis))
            .or_insert(Counter {
                next: 0,
                expires_at_ms: millis.saturating_add(retention_ms),
            });
        let next = counter
            .next
            .checked_add(request.count)
            .ok_or_else(|| StoreError::Rejected {
                reason: format!(
                    "sequence counter of logical shard {logical_shard_id} overflowed in \
                     millisecond {millis}"
                ),
            })?;
        counter.next = next;

        let start_sequence = next - request.count;
        let max_sequence = self.config.layout().max_sequence();
        if start_sequence > max_sequence {
            return Err(StoreError::Rejected {
                reason: format!(
                    "EXHAUSTED logical shard {logical_shard_id} has no sequences left in \
                     millisecond {millis}"
                ),
            });
        }

        Ok(Reservation {
            start_sequence,
            end_sequence: (next - 1).min(max_sequence),
            logical_shard_id,
            seconds,
            microseconds,
        })
    }
}

impl State {
    fn prune(&mut self, now_ms: u64) {
        self.sequences.retain(|_, counter| counter.expires_at_ms > now_ms);
    }
}

impl<T> ReservationStore for MemoryStore<T>
where
    T: TimeSource,
{
    fn load_script(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<ScriptHandle, StoreError>> + Send {
        ready(Ok(self.load(source)))
    }

    fn reserve(
        &self,
        handle: &ScriptHandle,
        request: &ReservationRequest,
    ) -> impl Future<Output = Result<Reservation, StoreError>> + Send {
        ready(self.run(handle, request))
    }
}
