//! Chip drivers for the deployed sensor boards.
//!
//! Each driver is a [`SensorDriver`] or [`VibrationProbe`] over a generic
//! HAL bus: the VEML7700 ambient light sensor and the ADXL355 accelerometer
//! speak I2C (`embedded-hal-async`), the IH-IPM particulate counter speaks
//! a small framed protocol over UART (`embedded-io-async`). The thermal
//! sensor's compensation pipeline lives in its own vendor driver; the target
//! binary wraps it as a `SensorDriver<Reading = TempHumidity>` and hands it
//! to [`crate::tasks::run_thermal_producer`] like any other family.

use embedded_hal_async::i2c::{Error as I2cError, ErrorKind, I2c};
use embedded_io_async::{Read, ReadExactError, Write};

use crate::error::BusError;
use crate::readings::{LightLevels, ParticleCount, FRAME_BYTES};
use crate::retry::{with_retries, RetryPolicy};
use crate::sensor::SensorDriver;
use crate::vibration::VibrationProbe;

fn map_i2c_err<E: I2cError>(e: E) -> BusError {
    match e.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        _ => BusError::Frame,
    }
}

/// VEML7700 ambient light sensor.
pub const VEML7700_ADDR: u8 = 0x10;

const VEML_CONFIG_REG: u8 = 0x00;
const VEML_ALS_REG: u8 = 0x04;
const VEML_WHITE_REG: u8 = 0x05;
/// Lux per raw count at 1x gain, 400 ms integration (VEML7700 app note).
const LUX_PER_COUNT: f32 = 0.0168;

pub struct LightSensor {
    addr: u8,
}

impl LightSensor {
    pub const fn new() -> Self {
        Self {
            addr: VEML7700_ADDR,
        }
    }

    /// One-time setup: 1x gain, 400 ms integration time, power on. Must run
    /// before the first reading.
    pub async fn configure<B: I2c>(
        &mut self,
        bus: &mut B,
        policy: RetryPolicy,
    ) -> Result<(), BusError> {
        // 16-bit config value 0x0080 sent little endian after the register.
        let frame = [VEML_CONFIG_REG, 0x80, 0x00];
        with_retries(policy, async || {
            bus.write(self.addr, &frame).await.map_err(map_i2c_err)
        })
        .await
    }

    async fn read_channel<B: I2c>(&mut self, bus: &mut B, reg: u8) -> Result<u16, BusError> {
        let mut raw = [0u8; 2];
        bus.write_read(self.addr, &[reg], &mut raw)
            .await
            .map_err(map_i2c_err)?;
        Ok(u16::from_le_bytes(raw))
    }
}

impl Default for LightSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: I2c> SensorDriver<B> for LightSensor {
    type Reading = LightLevels;

    fn fallback(&self) -> LightLevels {
        LightLevels::DUMMY
    }

    async fn exchange(&mut self, bus: &mut B) -> Result<LightLevels, BusError> {
        let als = self.read_channel(bus, VEML_ALS_REG).await?;
        let white = self.read_channel(bus, VEML_WHITE_REG).await?;
        Ok(LightLevels {
            als_lux: als as f32 * LUX_PER_COUNT,
            white_lux: white as f32 * LUX_PER_COUNT,
        })
    }
}

const PM_REQUEST: [u8; 5] = [0xFE, 0xA5, 0x00, 0x00, 0xA5];
const PM_REPLY_LEN: usize = 7;

/// IH-IPM particle counter behind a request/response UART protocol:
/// 5-byte read command, 7-byte reply `FE A5 02 <flags> <hi> <lo> <cksum>`.
pub struct ParticulateSensor;

impl ParticulateSensor {
    pub const fn new() -> Self {
        Self
    }
}

fn parse_pm_reply(reply: &[u8; PM_REPLY_LEN]) -> Result<ParticleCount, BusError> {
    if reply[0] != 0xFE || reply[1] != 0xA5 || reply[2] != 0x02 {
        return Err(BusError::Frame);
    }
    // Low byte of the 16-bit sum over command id, flags and count words.
    let sum = 0xA5u32
        + reply[2] as u32
        + reply[3] as u32
        + reply[4] as u32 * 256
        + reply[5] as u32;
    if reply[6] != (sum & 0xFF) as u8 {
        return Err(BusError::Checksum);
    }
    Ok(ParticleCount(u16::from(reply[4]) * 256 + u16::from(reply[5])))
}

impl<B: Read + Write> SensorDriver<B> for ParticulateSensor {
    type Reading = ParticleCount;

    fn fallback(&self) -> ParticleCount {
        ParticleCount::DUMMY
    }

    async fn exchange(&mut self, port: &mut B) -> Result<ParticleCount, BusError> {
        port.write_all(&PM_REQUEST)
            .await
            .map_err(|_| BusError::Frame)?;
        let mut reply = [0u8; PM_REPLY_LEN];
        port.read_exact(&mut reply).await.map_err(|e| match e {
            ReadExactError::UnexpectedEof => BusError::Timeout,
            ReadExactError::Other(_) => BusError::Frame,
        })?;
        parse_pm_reply(&reply)
    }
}

/// ADXL355 accelerometer.
pub const ADXL355_ADDR: u8 = 0x53;

const ADXL_POWER_CTL_REG: u8 = 0x2D;
const ADXL_FILTER_REG: u8 = 0x28;
const ADXL_RANGE_REG: u8 = 0x2C;
/// XDATA3: start of the 9-byte x/y/z data block.
const ADXL_DATA_REG: u8 = 0x08;

pub struct VibrationSensor {
    addr: u8,
}

impl VibrationSensor {
    pub const fn new() -> Self {
        Self { addr: ADXL355_ADDR }
    }

    /// One-time setup: leave standby, default ODR/filter, 2g range. Each
    /// register write retried per `policy`.
    pub async fn configure<B: I2c>(
        &mut self,
        bus: &mut B,
        policy: RetryPolicy,
    ) -> Result<(), BusError> {
        let settings = [
            [ADXL_POWER_CTL_REG, 0x00],
            [ADXL_FILTER_REG, 0x00],
            [ADXL_RANGE_REG, 0x01],
        ];
        for setting in settings {
            with_retries(policy, async || {
                bus.write(self.addr, &setting).await.map_err(map_i2c_err)
            })
            .await?;
        }
        Ok(())
    }
}

impl Default for VibrationSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: I2c> VibrationProbe<B> for VibrationSensor {
    async fn sample(
        &mut self,
        bus: &mut B,
        frame: &mut [u8; FRAME_BYTES],
    ) -> Result<(), BusError> {
        bus.write_read(self.addr, &[ADXL_DATA_REG], frame)
            .await
            .map_err(map_i2c_err)
    }
}
