//! The per-cycle ready/done signal set.
//!
//! The cycle scheduler raises one "ready" signal per enabled non-vibration
//! family on each tick; each producer consumes its own ready signal, takes a
//! reading and raises its "done" signal. The vibration task waits for the
//! logical AND of every enabled family's done signal, which guarantees the
//! shared buses are quiescent before its burst starts.
//!
//! Each flag is a one-shot `Signal` with consume-on-wait semantics, so a
//! scheduler tick that lands while a producer is still busy coalesces
//! instead of queueing.

use embassy_futures::join::join3;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::config::StationProfile;

type Flag = Signal<CriticalSectionRawMutex, ()>;

/// All ready/done flags for one node.
pub struct CycleSignals {
    pub ready_thermal: Flag,
    pub ready_light: Flag,
    pub ready_particulate: Flag,
    pub done_thermal: Flag,
    pub done_light: Flag,
    pub done_particulate: Flag,
}

impl CycleSignals {
    pub const fn new() -> Self {
        Self {
            ready_thermal: Signal::new(),
            ready_light: Signal::new(),
            ready_particulate: Signal::new(),
            done_thermal: Signal::new(),
            done_light: Signal::new(),
            done_particulate: Signal::new(),
        }
    }

    /// Scheduler-side: mark every enabled non-vibration family ready.
    pub fn raise_ready(&self, profile: &StationProfile) {
        self.ready_thermal.signal(());
        if profile.light {
            self.ready_light.signal(());
        }
        if profile.particulate {
            self.ready_particulate.signal(());
        }
    }

    /// Vibration-side: wait until every enabled family has finished its bus
    /// work this cycle. Consumes all the done flags it waits on.
    pub async fn wait_all_done(&self, profile: &StationProfile) {
        join3(
            self.done_thermal.wait(),
            wait_if(&self.done_light, profile.light),
            wait_if(&self.done_particulate, profile.particulate),
        )
        .await;
    }
}

impl Default for CycleSignals {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_if(flag: &Flag, enabled: bool) {
    if enabled {
        flag.wait().await;
    }
}
