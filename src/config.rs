//! Station profiles and node configuration.
//!
//! Which sensor families exist on a deployment is a property of the process
//! station the node is bolted to. The profile is plain runtime data: the
//! aggregator's output schema, the vibration task's wait set and the task
//! spawn set are all pure functions of it. Cadences, retry bounds and
//! calibration constants live in [`NodeConfig`] so that per-station tuning
//! stays configuration, not code.

use embassy_time::Duration;

use crate::battery::DischargeCurve;
use crate::readings::{BURST_SAMPLES, FRAME_BYTES};
use crate::retry::RetryPolicy;

/// The process station a node is deployed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Station {
    Photolithography,
    Sputtering,
    SpinCoating,
    /// Bench configuration with every sensor attached.
    Combined,
}

impl Station {
    /// Sensor families present at this station. Thermal/humidity is always
    /// attached; the rest varies per station.
    pub const fn profile(self) -> StationProfile {
        match self {
            Station::Photolithography => StationProfile {
                station: self,
                light: true,
                particulate: false,
                vibration: true,
            },
            Station::Sputtering => StationProfile {
                station: self,
                light: true,
                particulate: false,
                vibration: false,
            },
            Station::SpinCoating => StationProfile {
                station: self,
                light: false,
                particulate: true,
                vibration: true,
            },
            Station::Combined => StationProfile {
                station: self,
                light: true,
                particulate: true,
                vibration: true,
            },
        }
    }
}

/// Which sensor families are enabled, and under which topics the node
/// publishes.
#[derive(Debug, Clone, Copy)]
pub struct StationProfile {
    pub station: Station,
    pub light: bool,
    pub particulate: bool,
    pub vibration: bool,
}

impl StationProfile {
    /// Topic for the per-cycle aggregate record.
    pub const fn topic(&self) -> &'static str {
        match self.station {
            Station::Photolithography => "topic/PL",
            Station::Sputtering => "topic/SP",
            Station::SpinCoating => "topic/SC",
            Station::Combined => "topic/test",
        }
    }

    /// Topic for the independent battery record.
    pub const fn battery_topic(&self) -> &'static str {
        match self.station {
            Station::Photolithography => "topic/PL_battery",
            Station::Sputtering => "topic/SP_battery",
            Station::SpinCoating => "topic/SC_battery",
            Station::Combined => "topic/test_battery",
        }
    }
}

/// Vibration burst shape: sample count and rate.
#[derive(Debug, Clone, Copy)]
pub struct BurstConfig {
    pub samples: usize,
    pub sample_rate_hz: u32,
}

impl BurstConfig {
    pub const DEFAULT: Self = Self {
        samples: BURST_SAMPLES,
        sample_rate_hz: 500,
    };

    /// Nominal per-sample period.
    pub fn sample_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.sample_rate_hz as u64)
    }

    pub const fn burst_bytes(&self) -> usize {
        self.samples * FRAME_BYTES
    }

    /// Expected hex payload length for a full burst.
    pub const fn hex_chars(&self) -> usize {
        self.burst_bytes() * 2
    }
}

/// Battery monitor tuning.
#[derive(Debug, Clone, Copy)]
pub struct BatteryConfig {
    /// Sampling and publish cadence.
    pub period: Duration,
    /// Exponential smoothing factor applied to the measured voltage.
    pub smoothing: f32,
    /// Voltage divider ratio between the battery and the ADC pin. Divider
    /// resistors vary slightly between boards.
    pub divider: f32,
    /// Retry bound for the raw ADC read.
    pub adc_retries: RetryPolicy,
    /// Discharge curve used for the voltage-to-percent conversion.
    pub curve: DischargeCurve,
}

impl BatteryConfig {
    pub const DEFAULT: Self = Self {
        period: Duration::from_millis(1000),
        smoothing: 0.2,
        divider: 3.255,
        adc_retries: RetryPolicy::TRANSACTION,
        curve: DischargeCurve::LI_ION_1S,
    };
}

/// Everything tunable about one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig {
    /// Cycle scheduler period. Must exceed the worst-case duration of the
    /// slowest gated producer, or that producer silently skips cycles.
    pub cycle_period: Duration,
    /// Retry bound for per-reading bus transactions.
    pub bus_retries: RetryPolicy,
    /// Retry bound for one-time peripheral setup.
    pub setup_retries: RetryPolicy,
    /// Consecutive-error budget before the node restarts itself.
    pub error_threshold: u32,
    pub burst: BurstConfig,
    pub battery: BatteryConfig,
}

impl NodeConfig {
    pub const DEFAULT: Self = Self {
        cycle_period: Duration::from_millis(1000),
        bus_retries: RetryPolicy::TRANSACTION,
        setup_retries: RetryPolicy::SETUP,
        error_threshold: 10,
        burst: BurstConfig::DEFAULT,
        battery: BatteryConfig::DEFAULT,
    };
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
