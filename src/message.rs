//! Textual record assembly.
//!
//! The broker side consumes flat JSON text; which fields appear is fixed by
//! the station profile, and the aggregator fills [`CycleReadings`] options
//! accordingly, so the emitted schema is a pure function of the profile.
//! Sentinel readings are formatted like any other value: "sensor failed
//! this cycle" travels as an impossible number, not as a missing field.

use core::fmt::{self, Write as _};

use heapless::String;

use crate::readings::{CycleReadings, HEX_CHARS};

/// Capacity of one assembled cycle message: the hex burst plus generous
/// headroom for the scalar fields.
pub const MESSAGE_CHARS: usize = HEX_CHARS + 1024;

/// Buffer type for one assembled cycle message.
pub type MessageBuf = String<MESSAGE_CHARS>;

/// Buffer type for one battery message.
pub type BatteryMessageBuf = String<96>;

/// Assemble the per-cycle record. Field order is fixed: temperature,
/// humidity, ambient light, white light, particle count, vibration.
pub fn format_cycle_message<const N: usize>(
    readings: &CycleReadings,
    out: &mut String<N>,
) -> fmt::Result {
    out.clear();
    write!(
        out,
        "{{ \"temperature\": {:.2}, \"humidity\": {:.2}",
        readings.thermal.temp_celsius(),
        readings.thermal.humidity_percent()
    )?;
    if let Some(light) = &readings.light {
        write!(
            out,
            ", \"ambient_light\": {:.2}, \"white_light\": {:.2}",
            light.als_lux, light.white_lux
        )?;
    }
    if let Some(count) = &readings.particulate {
        write!(out, ", \"particle_count\": {}", count.0)?;
    }
    if let Some(hex) = &readings.vibration {
        write!(out, ", \"vibration\": \"{}\"", hex)?;
    }
    write!(out, " }}")
}

/// Assemble the independent battery record.
pub fn format_battery_message<const N: usize>(
    voltage_v: f32,
    percent: f32,
    out: &mut String<N>,
) -> fmt::Result {
    out.clear();
    write!(
        out,
        "{{\"battery_voltage\": {:.2}, \"battery_percent\": {:.1}}}",
        voltage_v, percent
    )
}
