//! Battery monitoring: smoothing, discharge-curve interpolation and the
//! independent publish loop.
//!
//! The monitor is not gated by the cycle scheduler; it free-runs on its own
//! cadence, smooths the measured pack voltage with an exponential filter to
//! damp ADC noise, converts it to a charge percentage via a piecewise-linear
//! discharge table and publishes on the battery topic. Publish failures
//! feed the same process-wide error counter as the aggregator.

use embassy_time::Ticker;
use log::error;

use crate::config::{NodeConfig, StationProfile};
use crate::context::ErrorCounter;
use crate::error::BusError;
use crate::message::{format_battery_message, BatteryMessageBuf};
use crate::publish::{Publisher, Restart};
use crate::retry::with_retries;

/// Voltage reported when the ADC read is exhausted, in millivolts.
/// Negative, so downstream cannot mistake it for a real pack voltage.
pub const BATTERY_SENTINEL_MV: f32 = -1000.0;

/// Raw battery voltage source: a calibrated ADC read at the divider tap,
/// in millivolts.
pub trait BatteryAdc {
    async fn read_millivolts(&mut self) -> Result<u32, BusError>;
}

/// First-order exponential smoothing. The first sample seeds the filter.
#[derive(Debug, Clone, Copy)]
pub struct SmoothingFilter {
    alpha: f32,
    state: Option<f32>,
}

impl SmoothingFilter {
    pub const fn new(alpha: f32) -> Self {
        Self { alpha, state: None }
    }

    /// Feed one sample and return the new smoothed value.
    pub fn update(&mut self, sample: f32) -> f32 {
        let next = match self.state {
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        };
        self.state = Some(next);
        next
    }

    pub fn value(&self) -> Option<f32> {
        self.state
    }
}

/// Monotone decreasing (millivolts, percent) breakpoints. Voltages between
/// breakpoints interpolate linearly; voltages beyond the table clamp to the
/// end percentages.
#[derive(Debug, Clone, Copy)]
pub struct DischargeCurve {
    points: &'static [(f32, f32)],
}

impl DischargeCurve {
    /// Conventional single-cell Li-ion discharge curve.
    pub const LI_ION_1S: Self = Self::new(&[
        (4200.0, 100.0),
        (4060.0, 90.0),
        (3980.0, 80.0),
        (3920.0, 70.0),
        (3870.0, 60.0),
        (3820.0, 50.0),
        (3790.0, 40.0),
        (3770.0, 30.0),
        (3740.0, 20.0),
        (3680.0, 10.0),
        (3450.0, 5.0),
        (3000.0, 0.0),
    ]);

    /// `points` must be sorted by strictly decreasing voltage with
    /// non-increasing percentages.
    pub const fn new(points: &'static [(f32, f32)]) -> Self {
        Self { points }
    }

    /// Charge percentage for a pack voltage, clamped to [0, 100] at the
    /// table extremes.
    pub fn percent_for(&self, millivolts: f32) -> f32 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if millivolts >= first.0 {
            return first.1;
        }
        if millivolts <= last.0 {
            return last.1;
        }
        for pair in self.points.windows(2) {
            let (hi, lo) = (pair[0], pair[1]);
            if millivolts >= lo.0 {
                let t = (millivolts - lo.0) / (hi.0 - lo.0);
                return lo.1 + t * (hi.1 - lo.1);
            }
        }
        last.1
    }
}

/// Sample, smooth, convert and publish forever on the battery cadence.
pub async fn run_battery_monitor<A, P, R>(
    adc: &mut A,
    cfg: &NodeConfig,
    profile: &StationProfile,
    errors: &ErrorCounter,
    publisher: &mut P,
    restart: &R,
) -> !
where
    A: BatteryAdc,
    P: Publisher,
    R: Restart,
{
    let battery = cfg.battery;
    let mut ticker = Ticker::every(battery.period);
    let mut filter = SmoothingFilter::new(battery.smoothing);
    let mut restart_requested = false;
    loop {
        let read = with_retries(battery.adc_retries, async || adc.read_millivolts().await).await;
        let (volts, percent) = match read {
            Ok(raw_mv) => {
                let pack_mv = raw_mv as f32 * battery.divider;
                let smoothed = filter.update(pack_mv);
                (smoothed / 1000.0, battery.curve.percent_for(smoothed))
            }
            Err(e) => {
                error!("battery read failed ({}), publishing sentinel", e);
                (BATTERY_SENTINEL_MV / 1000.0, 0.0)
            }
        };

        let mut message = BatteryMessageBuf::new();
        if format_battery_message(volts, percent, &mut message).is_err() {
            error!("failed to assemble battery message");
            errors.record();
        }
        if let Err(e) = publisher.publish(profile.battery_topic(), &message).await {
            error!("battery publish failed: {}", e);
            errors.record();
        }
        if !restart_requested && errors.exceeded(cfg.error_threshold) {
            error!("error budget exhausted, requesting restart");
            restart.request_restart();
            restart_requested = true;
        }

        ticker.next().await;
    }
}
