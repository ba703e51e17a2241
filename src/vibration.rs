//! Vibration burst capture and the hex transport encoding.
//!
//! The burst has a hard real-time constraint: a fixed number of samples at
//! a fixed rate, taken while every other producer is quiescent. Sample
//! pacing uses absolute deadlines (`Timer::at`) so transaction latency
//! jitter does not accumulate into drift. There are no per-sample retries;
//! the first failed transaction abandons the burst and the whole buffer is
//! dummy-filled, which downstream recognizes as "no vibration data".

use core::fmt::{self, Write as _};

use embassy_time::{Instant, Timer};
use heapless::{String, Vec};
use log::error;

use crate::bus::SharedBus;
use crate::config::BurstConfig;
use crate::error::BusError;
use crate::readings::{BurstBytes, DUMMY_SAMPLE_BYTE, FRAME_BYTES};

/// One vibration sample transaction: fill `frame` with the sensor's current
/// 9-byte acceleration frame.
pub trait VibrationProbe<B> {
    async fn sample(&mut self, bus: &mut B, frame: &mut [u8; FRAME_BYTES]) -> Result<(), BusError>;
}

/// Capture one burst into `out`, holding the bus guard for the whole run.
///
/// On success `out` holds `cfg.samples` frames in capture order. On any
/// sample failure the entire buffer is dummy-filled instead (the burst's
/// timing budget leaves no room to retry, and a partially real burst would
/// be indistinguishable from a healthy one).
pub async fn capture_burst<B, P>(
    bus: &SharedBus<B>,
    probe: &mut P,
    cfg: &BurstConfig,
    out: &mut BurstBytes,
) where
    P: VibrationProbe<B>,
{
    out.clear();
    let burst_bytes = cfg.burst_bytes().min(out.capacity());

    let mut guard = bus.lock().await;
    let period = cfg.sample_period();
    let mut deadline = Instant::now();
    let mut frame = [0u8; FRAME_BYTES];
    let mut failed = false;

    for _ in 0..cfg.samples {
        match probe.sample(&mut guard, &mut frame).await {
            Ok(()) => {
                if out.extend_from_slice(&frame).is_err() {
                    failed = true;
                    break;
                }
            }
            Err(e) => {
                error!("vibration sample failed ({}), dummy-filling burst", e);
                failed = true;
                break;
            }
        }
        deadline += period;
        Timer::at(deadline).await;
    }
    drop(guard);

    if failed || out.len() != burst_bytes {
        out.clear();
        for _ in 0..burst_bytes {
            // Capacity checked above.
            let _ = out.push(DUMMY_SAMPLE_BYTE);
        }
    }
}

/// Encode `bytes` as uppercase hex, two characters per byte.
pub fn encode_hex<const N: usize>(bytes: &[u8], out: &mut String<N>) -> fmt::Result {
    out.clear();
    for b in bytes {
        write!(out, "{:02X}", b)?;
    }
    Ok(())
}

/// Error decoding a hex payload back into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexDecodeError {
    OddLength,
    InvalidDigit,
    Overflow,
}

/// Decode a hex payload produced by [`encode_hex`].
pub fn decode_hex<const N: usize>(hex: &str, out: &mut Vec<u8, N>) -> Result<(), HexDecodeError> {
    if hex.len() % 2 != 0 {
        return Err(HexDecodeError::OddLength);
    }
    out.clear();
    let digits = hex.as_bytes();
    for pair in digits.chunks_exact(2) {
        let hi = nibble(pair[0])?;
        let lo = nibble(pair[1])?;
        out.push((hi << 4) | lo)
            .map_err(|_| HexDecodeError::Overflow)?;
    }
    Ok(())
}

fn nibble(digit: u8) -> Result<u8, HexDecodeError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        _ => Err(HexDecodeError::InvalidDigit),
    }
}
