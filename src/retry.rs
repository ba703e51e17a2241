//! Bounded retry with a fixed inter-attempt delay.
//!
//! Every fallible bus transaction in the node goes through [`with_retries`]
//! instead of an ad-hoc retry loop; the policy (attempt count, delay) is
//! configuration, not logic.

use embassy_time::{Duration, Timer};

/// How often and how patiently to retry one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least one.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Per-transaction policy for sensor bus transfers.
    pub const TRANSACTION: Self = Self {
        attempts: 3,
        delay: Duration::from_millis(50),
    };

    /// Policy for one-time peripheral setup exchanges.
    pub const SETUP: Self = Self {
        attempts: 3,
        delay: Duration::from_millis(100),
    };
}

/// Run `op` up to `policy.attempts` times, sleeping `policy.delay` between
/// attempts, and return the first success or the last error.
///
/// The first attempt runs immediately; the delay only separates retries.
pub async fn with_retries<T, E, F>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: AsyncFnMut() -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.attempts => return Err(e),
            Err(_) => {
                attempt += 1;
                Timer::after(policy.delay).await;
            }
        }
    }
}
