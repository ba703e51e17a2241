//! The generic sensor producer contract.
//!
//! A [`SensorDriver`] is the chip-specific part of one sensor family: a
//! fixed command/response exchange against an exclusively-held bus, plus a
//! sentinel to report in place of a reading. [`read_guarded`] wraps any
//! driver into the producer contract: acquire the bus guard, retry the
//! exchange a bounded number of times, and never fail outwardly.

use log::error;

use crate::bus::SharedBus;
use crate::error::BusError;
use crate::retry::{with_retries, RetryPolicy};

/// One sensor family's chip codec, kept deliberately narrow: everything the
/// pipeline needs to know about a sensor is "a reading or a bus error".
pub trait SensorDriver<B> {
    type Reading;

    /// The sentinel substituted when all retries are exhausted.
    fn fallback(&self) -> Self::Reading;

    /// Run one full command/response exchange on the exclusively-held bus.
    async fn exchange(&mut self, bus: &mut B) -> Result<Self::Reading, BusError>;
}

/// Take one reading: lock the bus guard for the duration of the exchange,
/// retry per `policy`, and substitute the driver's sentinel on exhaustion.
///
/// This never returns an error; a failed sensor shows up downstream as its
/// sentinel value, not as a stalled or aborted cycle.
pub async fn read_guarded<B, D>(bus: &SharedBus<B>, driver: &mut D, policy: RetryPolicy) -> D::Reading
where
    D: SensorDriver<B>,
{
    let mut guard = bus.lock().await;
    let bus = &mut *guard;
    match with_retries(policy, async || driver.exchange(bus).await).await {
        Ok(reading) => reading,
        Err(e) => {
            error!(
                "sensor exchange failed after {} attempts ({}), using dummy reading",
                policy.attempts, e
            );
            driver.fallback()
        }
    }
}
