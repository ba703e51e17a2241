//! Reading types, sentinel values and the vibration frame format.
//!
//! Every reading type reserves an out-of-range sentinel that a producer
//! substitutes when its bus transactions are exhausted. Downstream analysis
//! recognizes "sensor failed this cycle" from the value itself; the pipeline
//! never stalls or propagates bus errors.

use heapless::{String, Vec};

/// Bytes per vibration sample frame: three 20-bit signed axis values packed
/// into 9 bytes, low nibble of every third byte unused.
pub const FRAME_BYTES: usize = 9;

/// Maximum samples per vibration burst (one second at the default rate).
pub const BURST_SAMPLES: usize = 500;

/// Maximum raw burst size in bytes.
pub const BURST_BYTES: usize = FRAME_BYTES * BURST_SAMPLES;

/// Maximum hex-encoded burst length in characters.
pub const HEX_CHARS: usize = BURST_BYTES * 2;

/// Byte used to fill a burst when any sample transaction fails.
pub const DUMMY_SAMPLE_BYTE: u8 = 0xFF;

/// Raw burst buffer, sized for the largest configured burst.
pub type BurstBytes = Vec<u8, BURST_BYTES>;

/// Hex-encoded burst as it travels through the vibration channel.
pub type VibrationHex = String<HEX_CHARS>;

/// Temperature and humidity in the sensor's fixed-point representations:
/// 0.01 degree steps for temperature, Q22.10 for relative humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempHumidity {
    pub temp_centi: i32,
    pub humidity_q10: u32,
}

impl TempHumidity {
    /// Sentinel: -500 degrees / 150 % RH, both impossible.
    pub const DUMMY: Self = Self {
        temp_centi: -50_000,
        humidity_q10: 150 * 1024,
    };

    pub fn temp_celsius(&self) -> f32 {
        self.temp_centi as f32 / 100.0
    }

    pub fn humidity_percent(&self) -> f32 {
        self.humidity_q10 as f32 / 1024.0
    }

    pub fn is_dummy(&self) -> bool {
        *self == Self::DUMMY
    }
}

/// Ambient and white light channels in lux.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightLevels {
    pub als_lux: f32,
    pub white_lux: f32,
}

impl LightLevels {
    /// Sentinel: negative lux.
    pub const DUMMY: Self = Self {
        als_lux: -1000.0,
        white_lux: -1000.0,
    };

    pub fn is_dummy(&self) -> bool {
        self.als_lux < 0.0
    }
}

/// PM2.5 particle count reported by the particulate sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleCount(pub u16);

impl ParticleCount {
    /// Sentinel: the maximum representable count.
    pub const DUMMY: Self = Self(0xFFFF);

    pub fn is_dummy(&self) -> bool {
        *self == Self::DUMMY
    }
}

/// One decoded acceleration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Sign-extend a 20-bit two's-complement value to 32 bits.
pub fn sign_extend_20bit(value: u32) -> i32 {
    if value & 0x8_0000 != 0 {
        (value | 0xFFF0_0000) as i32
    } else {
        value as i32
    }
}

fn unpack_axis(b: &[u8]) -> i32 {
    let raw = ((b[0] as u32) << 12) | ((b[1] as u32) << 4) | ((b[2] as u32) >> 4);
    sign_extend_20bit(raw)
}

fn pack_axis(value: i32, out: &mut [u8]) {
    let raw = (value as u32) & 0xF_FFFF;
    out[0] = (raw >> 12) as u8;
    out[1] = (raw >> 4) as u8;
    out[2] = ((raw & 0xF) << 4) as u8;
}

impl AccelSample {
    /// Decode one 9-byte frame as laid out by the vibration sensor.
    pub fn from_frame(frame: &[u8; FRAME_BYTES]) -> Self {
        Self {
            x: unpack_axis(&frame[0..3]),
            y: unpack_axis(&frame[3..6]),
            z: unpack_axis(&frame[6..9]),
        }
    }

    /// Encode this sample into the sensor's frame layout. Axis values are
    /// truncated to 20 bits.
    pub fn to_frame(&self) -> [u8; FRAME_BYTES] {
        let mut frame = [0u8; FRAME_BYTES];
        pack_axis(self.x, &mut frame[0..3]);
        pack_axis(self.y, &mut frame[3..6]);
        pack_axis(self.z, &mut frame[6..9]);
        frame
    }
}

/// The per-cycle aggregate. Optional fields are populated exactly when the
/// station profile enables the corresponding sensor family.
#[derive(Debug, Clone)]
pub struct CycleReadings {
    pub thermal: TempHumidity,
    pub light: Option<LightLevels>,
    pub particulate: Option<ParticleCount>,
    pub vibration: Option<VibrationHex>,
}
