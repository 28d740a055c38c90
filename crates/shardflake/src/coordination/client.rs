use core::{marker::PhantomData, time::Duration};

use parking_lot::RwLock;

use crate::{
    Config, DEFAULT_KEY_PREFIX, Reservation, ReservationRequest, ReservationScript,
    ReservationStore, ScriptHandle, SleepProvider, StoreError, TokioSleep,
};

/// Attempts per reservation, the first one included.
pub const MAX_ATTEMPTS: u32 = 5;

/// Delay before retrying after failed attempt number `attempt` (1-based):
/// `attempt² / 900` seconds, kept in whole microseconds.
///
/// ```
/// use core::time::Duration;
/// use shardflake::backoff_delay;
///
/// assert_eq!(backoff_delay(1), Duration::from_micros(1_111));
/// assert_eq!(backoff_delay(3), Duration::from_micros(10_000));
/// ```
pub const fn backoff_delay(attempt: u32) -> Duration {
    let attempt = attempt as u64;
    Duration::from_micros(attempt * attempt * 10_000 / 9)
}

/// Runs reservations against a [`ReservationStore`].
///
/// The client owns the only mutable state of the coordination path: the
/// cached script handle. It is loaded on first use, reused by every call and
/// dropped after any transient failure so the next attempt reloads it. The
/// cache is never locked across an `.await`; concurrent reloads at worst load
/// the script twice.
///
/// Transient failures (see [`StoreError::is_transient`]) are retried up to
/// [`MAX_ATTEMPTS`] times with [`backoff_delay`] between attempts, waiting
/// through `Z`.
pub struct CoordinationClient<S, Z = TokioSleep> {
    store: S,
    script: ReservationScript,
    handle: RwLock<Option<ScriptHandle>>,
    _sleep: PhantomData<fn() -> Z>,
}

impl<S> CoordinationClient<S>
where
    S: ReservationStore,
{
    pub fn new(store: S, config: &Config) -> Self {
        Self::with_key_prefix(store, config, DEFAULT_KEY_PREFIX)
    }

    /// Creates a client whose script keeps its keys under `key_prefix`.
    pub fn with_key_prefix(store: S, config: &Config, key_prefix: &str) -> Self {
        Self {
            store,
            script: ReservationScript::render(config, key_prefix),
            handle: RwLock::new(None),
            _sleep: PhantomData,
        }
    }
}

impl<S, Z> CoordinationClient<S, Z>
where
    S: ReservationStore,
    Z: SleepProvider,
{
    /// Switches how the client waits between attempts.
    pub fn with_sleeper<Y: SleepProvider>(self) -> CoordinationClient<S, Y> {
        CoordinationClient {
            store: self.store,
            script: self.script,
            handle: self.handle,
            _sleep: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn script(&self) -> &ReservationScript {
        &self.script
    }

    /// The handle currently cached, if any.
    pub fn cached_script_handle(&self) -> Option<ScriptHandle> {
        self.handle.read().clone()
    }

    /// Returns the cached handle, loading the script first if needed.
    ///
    /// # Errors
    ///
    /// Propagates the store's failure to load the script.
    pub async fn script_handle(&self) -> Result<ScriptHandle, StoreError> {
        let cached = self.handle.read().clone();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let handle = self.store.load_script(self.script.source()).await?;
        #[cfg(feature = "tracing")]
        tracing::debug!("Loaded reservation script as {handle}");
        *self.handle.write() = Some(handle.clone());
        Ok(handle)
    }

    /// Forgets the cached handle; the next call reloads the script.
    pub fn invalidate_script(&self) {
        self.handle.write().take();
    }

    /// Reserves up to `request.count` sequences.
    ///
    /// # Errors
    ///
    /// Returns the last [`StoreError`] once [`MAX_ATTEMPTS`] transient
    /// failures have been seen, or the first non-transient one.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(prefix = self.script.key_prefix()))
    )]
    pub async fn reserve(&self, request: &ReservationRequest) -> Result<Reservation, StoreError> {
        let mut attempt = 1;
        loop {
            match self.try_reserve(request).await {
                Ok(reservation) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Reserved sequences {}..={} on logical shard {}",
                        reservation.start_sequence,
                        reservation.end_sequence,
                        reservation.logical_shard_id
                    );
                    return Ok(reservation);
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Reservation attempt {attempt}/{MAX_ATTEMPTS} failed: {e}");
                    self.invalidate_script();
                    Z::sleep_for(backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Reservation failed after {attempt} attempt(s): {e}");
                    return Err(e);
                }
            }
        }
    }

    async fn try_reserve(&self, request: &ReservationRequest) -> Result<Reservation, StoreError> {
        let handle = self.script_handle().await?;
        self.store.reserve(&handle, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Layout, MemoryStore, TokioYield};
    use core::future::{Future, ready};
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn config() -> Config {
        Config::new(0, Layout::new(41, 3, 9, 11).unwrap()).unwrap()
    }

    /// Fails the first `failures` reservations with `fail`, then grants what
    /// the request asked for.
    struct FlakyStore {
        failures: u32,
        fail: fn() -> StoreError,
        loads: AtomicU32,
        reserves: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32, fail: fn() -> StoreError) -> Self {
            Self {
                failures,
                fail,
                loads: AtomicU32::new(0),
                reserves: AtomicU32::new(0),
            }
        }
    }

    impl ReservationStore for FlakyStore {
        fn load_script(
            &self,
            _source: &str,
        ) -> impl Future<Output = Result<ScriptHandle, StoreError>> + Send {
            let n = self.loads.fetch_add(1, Ordering::Relaxed);
            ready(Ok(ScriptHandle::new(format!("handle-{n}"))))
        }

        fn reserve(
            &self,
            _handle: &ScriptHandle,
            request: &ReservationRequest,
        ) -> impl Future<Output = Result<Reservation, StoreError>> + Send {
            let n = self.reserves.fetch_add(1, Ordering::Relaxed);
            let millis = request.timestamp.unwrap_or(1_694_563_200_000);
            let result = if n < self.failures {
                Err((self.fail)())
            } else {
                Ok(Reservation {
                    start_sequence: 0,
                    end_sequence: request.count - 1,
                    logical_shard_id: request.data_type % 8,
                    seconds: millis / 1_000,
                    microseconds: (millis % 1_000) as u32 * 1_000,
                })
            };
            ready(result)
        }
    }

    fn rejected() -> StoreError {
        StoreError::Rejected {
            reason: "EXHAUSTED".into(),
        }
    }

    fn malformed() -> StoreError {
        StoreError::MalformedResponse {
            reason: "not an array".into(),
        }
    }

    fn client(store: FlakyStore) -> CoordinationClient<FlakyStore, TokioYield> {
        CoordinationClient::new(store, &config()).with_sleeper::<TokioYield>()
    }

    #[test]
    fn backoff_grows_quadratically() {
        let delays: Vec<_> = (1..=MAX_ATTEMPTS)
            .map(|attempt| backoff_delay(attempt).as_micros())
            .collect();
        assert_eq!(delays, vec![1_111, 4_444, 10_000, 17_777, 27_777]);
    }

    #[tokio::test]
    async fn four_failures_then_success() {
        let request = ReservationRequest::new(3, 7, Some(1_694_563_200_123));
        let immediate = client(FlakyStore::new(0, rejected))
            .reserve(&request)
            .await
            .unwrap();

        let client = client(FlakyStore::new(4, rejected));
        let reservation = client.reserve(&request).await.unwrap();
        assert_eq!(reservation, immediate);
        assert_eq!(reservation.len(), 7);
        assert_eq!(client.store().reserves.load(Ordering::Relaxed), 5);
        // Every failure drops the handle, so each attempt reloads it.
        assert_eq!(client.store().loads.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn fifth_failure_is_returned() {
        let client = client(FlakyStore::new(5, rejected));
        let err = client
            .reserve(&ReservationRequest::new(0, 1, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert_eq!(client.store().reserves.load(Ordering::Relaxed), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let client = client(FlakyStore::new(1, malformed));
        let err = client
            .reserve(&ReservationRequest::new(0, 1, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse { .. }));
        assert_eq!(client.store().reserves.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn stale_timestamp_is_not_retried() {
        let client = client(FlakyStore::new(1, || StoreError::Stale {
            reason: "older than the retention window".into(),
        }));
        let err = client
            .reserve(&ReservationRequest::new(0, 1, Some(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Stale { .. }));
        assert_eq!(client.store().reserves.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn handle_is_cached_between_calls() {
        let client = client(FlakyStore::new(0, rejected));
        assert!(client.cached_script_handle().is_none());
        for _ in 0..3 {
            client
                .reserve(&ReservationRequest::new(0, 1, None))
                .await
                .unwrap();
        }
        assert_eq!(client.store().loads.load(Ordering::Relaxed), 1);
        assert_eq!(
            client.cached_script_handle(),
            Some(ScriptHandle::new("handle-0"))
        );

        client.invalidate_script();
        assert!(client.cached_script_handle().is_none());
        assert_eq!(
            client.script_handle().await.unwrap(),
            ScriptHandle::new("handle-1")
        );
    }

    #[tokio::test]
    async fn reloads_script_after_flush() {
        let store = Arc::new(MemoryStore::new(config()));
        let client = CoordinationClient::new(store.clone(), &config()).with_sleeper::<TokioYield>();

        let request = ReservationRequest::new(0, 1, None);
        client.reserve(&request).await.unwrap();
        let before = client.cached_script_handle().unwrap();

        store.flush_scripts();
        let err = store.reserve(&before, &request).await.unwrap_err();
        assert!(matches!(err, StoreError::NoScript { .. }));

        client.reserve(&request).await.unwrap();
        let after = client.cached_script_handle().unwrap();
        assert_ne!(before, after);
    }
}
