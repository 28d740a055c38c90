use core::{future::Future, time::Duration};

/// Abstracts over how the client waits between reservation attempts.
pub trait SleepProvider {
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;
}

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider of [`CoordinationClient`].
///
/// [`CoordinationClient`]: crate::CoordinationClient
#[derive(Copy, Clone, Debug, Default)]
pub struct TokioSleep;
impl SleepProvider for TokioSleep {
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}

/// An implementation of [`SleepProvider`] using Tokio's yield.
///
/// Skips the backoff delay and only yields to the scheduler. Useful in tests
/// that script failures and should not wait on the timer.
#[derive(Copy, Clone, Debug, Default)]
pub struct TokioYield;
impl SleepProvider for TokioYield {
    fn sleep_for(_dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::task::yield_now()
    }
}
