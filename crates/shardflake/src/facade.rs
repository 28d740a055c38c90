use crate::{
    Config, DecodedId, Error, Generator, Id, ReservationStore, Result, SleepProvider, TokioSleep,
};

/// Entry point for generating and decoding IDs.
///
/// Wraps a [`Generator`] and keeps reserving until a request is filled. Share
/// one instance across tasks; every method takes `&self`.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> shardflake::Result<()> {
/// use shardflake::{Config, Layout, MemoryStore, Shardflake};
///
/// let config = Config::new(1_646_160_000_000, Layout::new(41, 3, 9, 11)?)?;
/// let ids = Shardflake::new(config.clone(), MemoryStore::new(config));
///
/// let batch = ids.generate_ids(3, 100, None).await?;
/// assert_eq!(batch.len(), 100);
/// assert!(batch.windows(2).all(|w| w[0] != w[1]));
/// assert_eq!(ids.decode(batch[0].to_raw()).data_type, 3);
/// # Ok(())
/// # }
/// ```
pub struct Shardflake<S, Z = TokioSleep> {
    generator: Generator<S, Z>,
}

impl<S> Shardflake<S>
where
    S: ReservationStore,
{
    pub fn new(config: Config, store: S) -> Self {
        Self::from_generator(Generator::new(config, store))
    }

    /// Creates a facade whose store keys live under `key_prefix`.
    pub fn with_key_prefix(config: Config, store: S, key_prefix: &str) -> Self {
        Self::from_generator(Generator::with_key_prefix(config, store, key_prefix))
    }
}

impl<S, Z> Shardflake<S, Z>
where
    S: ReservationStore,
    Z: SleepProvider,
{
    pub fn from_generator(generator: Generator<S, Z>) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &Generator<S, Z> {
        &self.generator
    }

    pub fn config(&self) -> &Config {
        self.generator.config()
    }

    /// Generates one ID of `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if the store granted nothing, otherwise
    /// the errors of [`Generator::generate_batch`].
    pub async fn generate_id(&self, data_type: u64, timestamp: Option<u64>) -> Result<Id> {
        self.generate_ids(data_type, 1, timestamp)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::Exhausted)
    }

    /// Generates `count` IDs of `data_type`, reserving as many batches as it
    /// takes.
    ///
    /// Stops early if a batch comes back empty, so the result may hold fewer
    /// than `count` IDs. Callers that need all of them must check the length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `count` is zero, otherwise the
    /// first error of [`Generator::generate_batch`].
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn generate_ids(
        &self,
        data_type: u64,
        count: u64,
        timestamp: Option<u64>,
    ) -> Result<Vec<Id>> {
        if count < 1 {
            return Err(Error::argument(format!(
                "count must be at least 1, got {count}"
            )));
        }

        let mut ids = Vec::new();
        while (ids.len() as u64) < count {
            let remaining = count - ids.len() as u64;
            let batch = self
                .generator
                .generate_batch(data_type, remaining, timestamp)
                .await?;
            if batch.is_empty() {
                #[cfg(feature = "tracing")]
                tracing::warn!("Store granted no ids; returning {} of {count}", ids.len());
                break;
            }
            ids.extend(batch);
        }
        Ok(ids)
    }

    /// Decodes a raw ID with this facade's configuration.
    pub fn decode(&self, raw: u64) -> DecodedId {
        self.config().decode(Id::from_raw(raw))
    }
}
