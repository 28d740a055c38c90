//! Atomic sequence reservation against a shared store.
//!
//! A [`ReservationStore`] runs the reservation script; the
//! [`CoordinationClient`] owns the cached script handle and the retry policy.

mod client;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod script;
mod sleep;
mod store;

pub use client::*;
pub use memory::*;
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
#[cfg(feature = "redis")]
pub use self::redis::*;
pub use script::*;
pub use sleep::*;
pub use store::*;
