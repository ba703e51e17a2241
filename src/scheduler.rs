//! The fixed-period cycle scheduler.
//!
//! One auto-reloading ticker drives the whole acquisition pipeline: each
//! tick raises the ready signal of every enabled non-vibration family. The
//! vibration task is gated on the other families' done signals instead, and
//! the battery monitor free-runs on its own cadence.
//!
//! If a producer is still busy when the next tick lands, its ready signal
//! coalesces and that family simply skips a cycle; the period is sized so
//! this does not happen in normal operation.

use embassy_time::{Duration, Ticker};
use log::debug;

use crate::config::StationProfile;
use crate::signals::CycleSignals;

/// Raise the ready set once per `period`, forever.
pub async fn run_cycle_scheduler(
    signals: &CycleSignals,
    profile: &StationProfile,
    period: Duration,
) -> ! {
    let mut ticker = Ticker::every(period);
    loop {
        ticker.next().await;
        debug!("cycle tick");
        signals.raise_ready(profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Station;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_time::Timer;

    #[test]
    fn ticks_raise_ready_for_enabled_families_only() {
        let signals = CycleSignals::new();
        let profile = Station::SpinCoating.profile();

        let consumer = async {
            let mut cycles = 0;
            while cycles < 3 {
                signals.ready_thermal.wait().await;
                signals.ready_particulate.wait().await;
                cycles += 1;
            }
            cycles
        };
        let scheduler = run_cycle_scheduler(&signals, &profile, Duration::from_millis(10));

        let outcome = block_on(select(
            select(scheduler, consumer),
            Timer::after(Duration::from_millis(2000)),
        ));
        match outcome {
            Either::First(Either::Second(cycles)) => assert_eq!(cycles, 3),
            _ => panic!("scheduler did not deliver three cycles in time"),
        }
        // The disabled light family never became ready.
        assert!(!signals.ready_light.signaled());
    }
}
