//! Host simulation of a full station node.
//!
//! Runs the complete pipeline on the embassy std executor with simulated
//! drivers and a log-only publisher. The station is selected on the command
//! line (`PL`, `SP`, `SC`; anything else runs the combined bench profile):
//!
//! ```text
//! cargo run --features std --bin station-sim -- SC
//! ```

use embassy_executor::{SpawnToken, Spawner};
use embassy_time::Duration;
use log::{info, Level, LevelFilter, Metadata, Record};
use static_cell::StaticCell;

use fabnode::battery::run_battery_monitor;
use fabnode::bus::{fatal_init, SharedBus};
use fabnode::config::{NodeConfig, Station, StationProfile};
use fabnode::context::SystemContext;
use fabnode::publish::LogPublisher;
use fabnode::scheduler::run_cycle_scheduler;
use fabnode::sim::{
    SimBatteryAdc, SimLight, SimParticulate, SimRestart, SimThermal, SimVibrationProbe,
};
use fabnode::tasks::{
    run_aggregator, run_light_producer, run_particulate_producer, run_thermal_producer,
    run_vibration_task,
};

/// Simulated buses carry no HAL state; the guards still serialize access.
type SimBus = SharedBus<()>;

static CONTEXT: StaticCell<SystemContext> = StaticCell::new();
static PROFILE: StaticCell<StationProfile> = StaticCell::new();
static CONFIG: StaticCell<NodeConfig> = StaticCell::new();
static PRIMARY_BUS: StaticCell<SimBus> = StaticCell::new();
static VIBRATION_BUS: StaticCell<SimBus> = StaticCell::new();

#[embassy_executor::task]
async fn scheduler_task(
    ctx: &'static SystemContext,
    profile: &'static StationProfile,
    period: Duration,
) -> ! {
    run_cycle_scheduler(&ctx.signals, profile, period).await
}

#[embassy_executor::task]
async fn thermal_task(
    ctx: &'static SystemContext,
    bus: &'static SimBus,
    cfg: &'static NodeConfig,
) -> ! {
    let mut driver = SimThermal::new();
    run_thermal_producer(ctx, bus, &mut driver, cfg).await
}

#[embassy_executor::task]
async fn light_task(
    ctx: &'static SystemContext,
    bus: &'static SimBus,
    cfg: &'static NodeConfig,
) -> ! {
    let mut driver = SimLight::new();
    run_light_producer(ctx, bus, &mut driver, cfg).await
}

#[embassy_executor::task]
async fn particulate_task(
    ctx: &'static SystemContext,
    bus: &'static SimBus,
    cfg: &'static NodeConfig,
) -> ! {
    let mut driver = SimParticulate::new();
    run_particulate_producer(ctx, bus, &mut driver, cfg).await
}

#[embassy_executor::task]
async fn vibration_task(
    ctx: &'static SystemContext,
    profile: &'static StationProfile,
    bus: &'static SimBus,
    cfg: &'static NodeConfig,
) -> ! {
    let mut probe = SimVibrationProbe::new();
    run_vibration_task(ctx, profile, bus, &mut probe, cfg).await
}

#[embassy_executor::task]
async fn aggregator_task(
    ctx: &'static SystemContext,
    profile: &'static StationProfile,
    cfg: &'static NodeConfig,
) -> ! {
    let mut publisher = LogPublisher;
    run_aggregator(ctx, profile, cfg, &mut publisher, &SimRestart).await
}

#[embassy_executor::task]
async fn battery_task(
    ctx: &'static SystemContext,
    profile: &'static StationProfile,
    cfg: &'static NodeConfig,
) -> ! {
    let mut adc = SimBatteryAdc::new();
    let mut publisher = LogPublisher;
    run_battery_monitor(
        &mut adc,
        cfg,
        profile,
        &ctx.errors,
        &mut publisher,
        &SimRestart,
    )
    .await
}

struct StdoutLogger;

impl log::Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn station_from_args() -> Station {
    match std::env::args().nth(1).as_deref() {
        Some("PL") => Station::Photolithography,
        Some("SP") => Station::Sputtering,
        Some("SC") => Station::SpinCoating,
        _ => Station::Combined,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .expect("logger already set");

    let station = station_from_args();
    let profile: &'static StationProfile = PROFILE.init(station.profile());
    let cfg: &'static NodeConfig = CONFIG.init(NodeConfig::DEFAULT);
    let ctx: &'static SystemContext = CONTEXT.init(SystemContext::new());
    let primary_bus: &'static SimBus = PRIMARY_BUS.init(SharedBus::new(()));
    let vibration_bus: &'static SimBus = VIBRATION_BUS.init(SharedBus::new(()));

    info!(
        "station node simulation starting: {:?} -> {}",
        station,
        profile.topic()
    );

    spawn_or_die(&spawner, thermal_task(ctx, primary_bus, cfg));
    if profile.light {
        spawn_or_die(&spawner, light_task(ctx, primary_bus, cfg));
    }
    if profile.particulate {
        spawn_or_die(&spawner, particulate_task(ctx, primary_bus, cfg));
    }
    if profile.vibration {
        spawn_or_die(&spawner, vibration_task(ctx, profile, vibration_bus, cfg));
    }
    spawn_or_die(&spawner, aggregator_task(ctx, profile, cfg));
    spawn_or_die(&spawner, battery_task(ctx, profile, cfg));
    spawn_or_die(&spawner, scheduler_task(ctx, profile, cfg.cycle_period));
}

fn spawn_or_die<S>(spawner: &Spawner, token: SpawnToken<S>) {
    if spawner.spawn(token).is_err() {
        fatal_init("task spawn");
    }
}
