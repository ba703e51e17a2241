//! Shared state for one node, constructed once at startup.
//!
//! The signal set, the per-family channels and the error counter are fields
//! of [`SystemContext`] rather than file-scope globals; the binary places
//! one instance in a `StaticCell` and hands `&'static` references to every
//! task it spawns. Bus guards stay separate [`crate::bus::SharedBus`]
//! values because they are generic over the HAL bus type.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::readings::{LightLevels, ParticleCount, TempHumidity, VibrationHex};
use crate::signals::CycleSignals;

/// Channel capacity: one in-flight record per family. A full channel blocks
/// the sender, so a slow aggregator exerts backpressure all the way to the
/// scheduler tick.
pub const CHANNEL_DEPTH: usize = 1;

type Chan<T> = Channel<CriticalSectionRawMutex, T, CHANNEL_DEPTH>;

/// One bounded single-producer/single-consumer channel per sensor family.
pub struct SensorChannels {
    pub thermal: Chan<TempHumidity>,
    pub light: Chan<LightLevels>,
    pub particulate: Chan<ParticleCount>,
    pub vibration: Chan<VibrationHex>,
}

impl SensorChannels {
    pub const fn new() -> Self {
        Self {
            thermal: Channel::new(),
            light: Channel::new(),
            particulate: Channel::new(),
            vibration: Channel::new(),
        }
    }
}

/// Process-wide publish/encode error tally. Increments are relaxed: the
/// counter only gates a coarse restart threshold, and a lost update near
/// the threshold merely delays the restart by one failure.
pub struct ErrorCounter(AtomicU32);

impl ErrorCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Count one error and return the new total.
    pub fn record(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// True once the tally has gone past `threshold`.
    pub fn exceeded(&self, threshold: u32) -> bool {
        self.get() > threshold
    }
}

impl Default for ErrorCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the tasks of one node share.
pub struct SystemContext {
    pub signals: CycleSignals,
    pub channels: SensorChannels,
    pub errors: ErrorCounter,
}

impl SystemContext {
    pub const fn new() -> Self {
        Self {
            signals: CycleSignals::new(),
            channels: SensorChannels::new(),
            errors: ErrorCounter::new(),
        }
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}
