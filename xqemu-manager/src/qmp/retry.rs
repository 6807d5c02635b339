//! Bounded linear retry.
//!
//! The emulator needs a variable amount of time before its QMP listener is
//! up, so connecting is retried a fixed number of times with a fixed pause.
//! There is no pause before the first attempt: N attempts sleep N-1 times.
//! Dropping the returned future cancels the loop at the next await point.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use xqemu_shared::constants::qmp::{CONNECT_ATTEMPTS, CONNECT_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(CONNECT_ATTEMPTS, CONNECT_DELAY)
    }
}

/// Source of the pause between attempts.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Every attempt failed.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// `operation` receives the zero-based attempt number.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            sleeper.sleep(policy.delay).await;
        }

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(RetryError { attempts: attempt, last: e });
                }
                tracing::debug!(
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed, retrying"
                );
            }
        }
    }
}
