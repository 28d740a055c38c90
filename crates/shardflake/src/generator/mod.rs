use crate::{
    Config, CoordinationClient, Error, Id, Reservation, ReservationRequest, ReservationStore,
    Result, SleepProvider, TokioSleep,
};


/// Turns one reservation into a batch of IDs.
///
/// Every call validates its arguments locally, then makes exactly one
/// (retried) reservation through its [`CoordinationClient`]. The generator
/// holds no counters: uniqueness comes from the store.
pub struct Generator<S, Z = TokioSleep> {
    config: Config,
    client: CoordinationClient<S, Z>,
}

impl<S> Generator<S>
where
    S: ReservationStore,
{
    pub fn new(config: Config, store: S) -> Self {
        let client = CoordinationClient::new(store, &config);
        Self { config, client }
    }

    /// Creates a generator whose store keys live under `key_prefix`.
    pub fn with_key_prefix(config: Config, store: S, key_prefix: &str) -> Self {
        let client = CoordinationClient::with_key_prefix(store, &config, key_prefix);
        Self { config, client }
    }
}

impl<S, Z> Generator<S, Z>
where
    S: ReservationStore,
    Z: SleepProvider,
{
    /// Switches how the client waits between reservation attempts.
    pub fn with_sleeper<Y: SleepProvider>(self) -> Generator<S, Y> {
        Generator {
            config: self.config,
            client: self.client.with_sleeper::<Y>(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &CoordinationClient<S, Z> {
        &self.client
    }

    /// Generates up to `count` IDs of `data_type` from a single reservation.
    ///
    /// With `timestamp` (Unix milliseconds) every ID carries that instant;
    /// otherwise the store's clock decides. The store may grant fewer than
    /// `count` sequences, including none.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for a data type outside the layout, a zero
    ///   `count` or a timestamp outside the encodable window. Nothing is sent
    ///   to the store.
    /// - [`Error::Store`] once the client gives up.
    /// - [`Error::InvalidReservation`] if the grant cannot be encoded.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn generate_batch(
        &self,
        data_type: u64,
        count: u64,
        timestamp: Option<u64>,
    ) -> Result<Vec<Id>> {
        self.validate(data_type, count, timestamp)?;

        let request = ReservationRequest::new(data_type, count, timestamp);
        let reservation = self.client.reserve(&request).await?;
        let relative_ms = self.check_reservation(&reservation, count, timestamp)?;

        Ok(reservation
            .sequences()
            .map(|sequence| {
                self.config
                    .encode(relative_ms, reservation.logical_shard_id, data_type, sequence)
            })
            .collect())
    }

    fn validate(&self, data_type: u64, count: u64, timestamp: Option<u64>) -> Result<()> {
        let allowed = self.config.data_type_allowed_range();
        if !allowed.contains(&data_type) {
            return Err(Error::argument(format!(
                "data type {data_type} is outside the allowed range {}..={}",
                allowed.start(),
                allowed.end()
            )));
        }
        if count < 1 {
            return Err(Error::argument(format!(
                "count must be at least 1, got {count}"
            )));
        }
        if let Some(timestamp) = timestamp {
            self.relative_millis(timestamp)?;
        }
        Ok(())
    }

    /// Milliseconds between the custom epoch and `timestamp` (Unix
    /// milliseconds), if encodable.
    fn relative_millis(&self, timestamp: u64) -> Result<u64> {
        let epoch = self.config.custom_epoch();
        let Some(relative) = timestamp.checked_sub(epoch) else {
            return Err(Error::argument(format!(
                "timestamp cannot be before the custom epoch: {timestamp} < {epoch}"
            )));
        };
        let max = self.config.layout().max_timestamp();
        if relative > max {
            return Err(Error::argument(format!(
                "timestamp {timestamp} is {relative}ms past the custom epoch {epoch}, more than \
                 the {max}ms the timestamp field can hold"
            )));
        }
        Ok(relative)
    }

    /// Checks a grant against what was asked and returns the timestamp to
    /// encode, relative to the custom epoch.
    fn check_reservation(
        &self,
        reservation: &Reservation,
        count: u64,
        timestamp: Option<u64>,
    ) -> Result<u64> {
        let max_sequence = self.config.layout().max_sequence();
        if reservation.end_sequence > max_sequence && !reservation.is_empty() {
            return Err(Error::reservation(format!(
                "end sequence {} exceeds the maximum sequence {max_sequence}",
                reservation.end_sequence
            )));
        }
        if reservation.len() > count {
            return Err(Error::reservation(format!(
                "granted {} sequences but only {count} were requested",
                reservation.len()
            )));
        }
        let shards = self.config.logical_shard_id_range();
        if !shards.contains(&reservation.logical_shard_id) {
            return Err(Error::reservation(format!(
                "logical shard id {} is outside the configured range {}..={}",
                reservation.logical_shard_id,
                shards.start(),
                shards.end()
            )));
        }

        if let Some(timestamp) = timestamp {
            return self.relative_millis(timestamp);
        }

        if reservation.seconds >= (i64::MAX / 1_000) as u64 || reservation.microseconds >= 1_000_000
        {
            return Err(Error::reservation(format!(
                "store clock {}s {}us is not a valid instant",
                reservation.seconds, reservation.microseconds
            )));
        }
        let unix_millis = reservation.timestamp().unix_millis() as u64;
        self.relative_millis(unix_millis).map_err(|_| {
            Error::reservation(format!(
                "store clock {unix_millis}ms lies outside the window of the custom epoch {}",
                self.config.custom_epoch()
            ))
        })
    }
}
