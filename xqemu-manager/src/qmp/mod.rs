//! Control channel to the running emulator.
//!
//! The emulator exposes QMP on a loopback TCP port. [`QmpClient`] connects
//! with bounded retry, negotiates capabilities and then issues lifecycle
//! commands one at a time.

mod client;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{QmpClient, QmpOptions};
pub use retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper, retry};

#[cfg(test)]
pub(crate) use retry::test_support;
