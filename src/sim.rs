//! Simulated drivers.
//!
//! Waveform-generating stand-ins for every sensor family, bus-agnostic so
//! they run against any `SharedBus` payload. The `station-sim` binary wires
//! the full pipeline with these; tests use them plus the fault-injecting
//! wrappers at the bottom.

use log::warn;

use crate::battery::BatteryAdc;
use crate::error::BusError;
use crate::publish::Restart;
use crate::readings::{AccelSample, LightLevels, ParticleCount, TempHumidity, FRAME_BYTES};
use crate::sensor::SensorDriver;
use crate::vibration::VibrationProbe;

/// Slow sinusoid around fab-floor ambient conditions.
pub struct SimThermal {
    counter: u32,
}

impl SimThermal {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for SimThermal {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SensorDriver<B> for SimThermal {
    type Reading = TempHumidity;

    fn fallback(&self) -> TempHumidity {
        TempHumidity::DUMMY
    }

    async fn exchange(&mut self, _bus: &mut B) -> Result<TempHumidity, BusError> {
        self.counter += 1;
        let phase = libm::sinf(self.counter as f32 * 0.1);
        Ok(TempHumidity {
            temp_centi: 2300 + (phase * 150.0) as i32,
            humidity_q10: (((45.0 + phase * 5.0) * 1024.0) as i32) as u32,
        })
    }
}

pub struct SimLight {
    counter: u32,
}

impl SimLight {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for SimLight {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SensorDriver<B> for SimLight {
    type Reading = LightLevels;

    fn fallback(&self) -> LightLevels {
        LightLevels::DUMMY
    }

    async fn exchange(&mut self, _bus: &mut B) -> Result<LightLevels, BusError> {
        self.counter += 1;
        let phase = libm::sinf(self.counter as f32 * 0.05);
        Ok(LightLevels {
            als_lux: 320.0 + phase * 40.0,
            white_lux: 280.0 + phase * 35.0,
        })
    }
}

pub struct SimParticulate {
    counter: u32,
}

impl SimParticulate {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for SimParticulate {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SensorDriver<B> for SimParticulate {
    type Reading = ParticleCount;

    fn fallback(&self) -> ParticleCount {
        ParticleCount::DUMMY
    }

    async fn exchange(&mut self, _bus: &mut B) -> Result<ParticleCount, BusError> {
        self.counter += 1;
        let phase = libm::sinf(self.counter as f32 * 0.3);
        Ok(ParticleCount((12.0 + phase * 8.0) as u16))
    }
}

/// Emits packed acceleration frames tracing a small oscillation, so decoded
/// bursts look like a real idle machine rather than noise.
pub struct SimVibrationProbe {
    counter: u32,
}

impl SimVibrationProbe {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for SimVibrationProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> VibrationProbe<B> for SimVibrationProbe {
    async fn sample(
        &mut self,
        _bus: &mut B,
        frame: &mut [u8; FRAME_BYTES],
    ) -> Result<(), BusError> {
        self.counter += 1;
        let phase = self.counter as f32 * 0.25;
        let sample = AccelSample {
            x: (libm::sinf(phase) * 2000.0) as i32,
            y: (libm::cosf(phase) * 2000.0) as i32,
            z: 64000 + (libm::sinf(phase * 3.0) * 500.0) as i32,
        };
        *frame = sample.to_frame();
        Ok(())
    }
}

/// Mid-curve pack voltage at the divider tap with a slow ripple.
pub struct SimBatteryAdc {
    counter: u32,
}

impl SimBatteryAdc {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for SimBatteryAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryAdc for SimBatteryAdc {
    async fn read_millivolts(&mut self) -> Result<u32, BusError> {
        self.counter += 1;
        let ripple = libm::sinf(self.counter as f32 * 0.02) * 6.0;
        // ~3.87 V pack seen through the 3.255 divider.
        Ok((1189.0 + ripple) as u32)
    }
}

/// Logs restart requests instead of rebooting.
pub struct SimRestart;

impl Restart for SimRestart {
    fn request_restart(&self) {
        warn!("device restart requested");
    }
}

/// Fails the first `failures` exchanges with a timeout, then delegates.
pub struct FlakyDriver<D> {
    inner: D,
    failures: u32,
}

impl<D> FlakyDriver<D> {
    pub fn new(inner: D, failures: u32) -> Self {
        Self { inner, failures }
    }

    pub fn failures_remaining(&self) -> u32 {
        self.failures
    }
}

impl<B, D> SensorDriver<B> for FlakyDriver<D>
where
    D: SensorDriver<B>,
{
    type Reading = D::Reading;

    fn fallback(&self) -> D::Reading {
        self.inner.fallback()
    }

    async fn exchange(&mut self, bus: &mut B) -> Result<D::Reading, BusError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(BusError::Timeout);
        }
        self.inner.exchange(bus).await
    }
}

/// Delivers `good` zeroed frames, then fails every sample.
pub struct FailingProbe {
    good: u32,
}

impl FailingProbe {
    pub fn after(good: u32) -> Self {
        Self { good }
    }
}

impl<B> VibrationProbe<B> for FailingProbe {
    async fn sample(
        &mut self,
        _bus: &mut B,
        frame: &mut [u8; FRAME_BYTES],
    ) -> Result<(), BusError> {
        if self.good == 0 {
            return Err(BusError::Frame);
        }
        self.good -= 1;
        frame.fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn sim_thermal_stays_in_ambient_range() {
        let mut sensor = SimThermal::new();
        for _ in 0..50 {
            let reading: TempHumidity = block_on(sensor.exchange(&mut ())).unwrap();
            assert!((2000..2600).contains(&reading.temp_centi));
            let humidity = reading.humidity_percent();
            assert!((35.0..55.0).contains(&humidity));
        }
    }

    #[test]
    fn sim_probe_frames_decode_to_plausible_gravity() {
        let mut probe = SimVibrationProbe::new();
        let mut frame = [0u8; FRAME_BYTES];
        block_on(probe.sample(&mut (), &mut frame)).unwrap();
        let sample = AccelSample::from_frame(&frame);
        // z sits near 1 g in ADXL355 2g counts.
        assert!((63000..65500).contains(&sample.z));
        assert!(sample.x.abs() <= 2100);
    }

    #[test]
    fn flaky_driver_counts_down_then_delegates() {
        let mut driver = FlakyDriver::new(SimParticulate::new(), 1);
        assert_eq!(
            block_on(driver.exchange(&mut ())),
            Err(BusError::Timeout)
        );
        assert_eq!(driver.failures_remaining(), 0);
        assert!(block_on(driver.exchange(&mut ())).is_ok());
    }
}
