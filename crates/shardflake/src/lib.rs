//! Coordinated Snowflake-style identifiers.
//!
//! Every [`Id`] packs four fields, low to high: sequence, data type, logical
//! shard id and a millisecond timestamp relative to a custom epoch. Callers
//! hold no counters of their own; each batch is an atomic reservation of a
//! contiguous sequence range in a shared store (see [`ReservationStore`]),
//! which picks the logical shard and the timestamp.
//!
//! ```no_run
//! # async fn run() -> shardflake::Result<()> {
//! use shardflake::{Config, Layout, RedisStore, Shardflake};
//!
//! let config = Config::new(1_646_160_000_000, Layout::new(41, 3, 9, 11)?)?;
//! let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
//! let ids = Shardflake::new(config, store);
//!
//! let id = ids.generate_id(7, None).await?;
//! assert_eq!(ids.decode(id.to_raw()).data_type, 7);
//! # Ok(())
//! # }
//! ```

mod config;
mod coordination;
mod error;
mod facade;
mod generator;
mod id;
mod layout;
mod time;

pub use crate::config::*;
pub use crate::coordination::*;
pub use crate::error::*;
pub use crate::facade::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::layout::*;
pub use crate::time::*;
