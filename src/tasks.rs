//! The long-running task bodies: producers, the vibration burst task and
//! the aggregator.
//!
//! Every function here loops forever and is generic over the bus, driver
//! and transport seams; the binary wraps each one in a concrete
//! `#[embassy_executor::task]`. The data flow per cycle:
//!
//! scheduler tick -> ready flags -> producers (bus-guarded reading, done
//! flag, channel send) -> vibration task (AND of done flags, burst,
//! channel send) -> aggregator (one receive per enabled family, format,
//! publish).

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, error};

use crate::bus::SharedBus;
use crate::config::{NodeConfig, StationProfile};
use crate::context::{SystemContext, CHANNEL_DEPTH};
use crate::message::{format_cycle_message, MessageBuf};
use crate::publish::{Publisher, Restart};
use crate::readings::{BurstBytes, CycleReadings, VibrationHex};
use crate::retry::RetryPolicy;
use crate::sensor::{read_guarded, SensorDriver};
use crate::vibration::{capture_burst, encode_hex, VibrationProbe};

type Flag = Signal<CriticalSectionRawMutex, ()>;
type Outbox<T> = Channel<CriticalSectionRawMutex, T, CHANNEL_DEPTH>;

/// One gated producer loop: wait for the cycle's ready flag, take one
/// bus-guarded reading, report bus-quiescent via the done flag, then hand
/// the reading to the aggregator.
///
/// The done flag is raised before the channel send so the vibration window
/// can open while the send is still blocked on a slow aggregator.
pub async fn run_producer<B, D>(
    ready: &Flag,
    done: &Flag,
    outbox: &Outbox<D::Reading>,
    bus: &SharedBus<B>,
    driver: &mut D,
    policy: RetryPolicy,
) -> !
where
    D: SensorDriver<B>,
{
    loop {
        ready.wait().await;
        let reading = read_guarded(bus, driver, policy).await;
        done.signal(());
        outbox.send(reading).await;
    }
}

pub async fn run_thermal_producer<B, D>(
    ctx: &SystemContext,
    bus: &SharedBus<B>,
    driver: &mut D,
    cfg: &NodeConfig,
) -> !
where
    D: SensorDriver<B, Reading = crate::readings::TempHumidity>,
{
    run_producer(
        &ctx.signals.ready_thermal,
        &ctx.signals.done_thermal,
        &ctx.channels.thermal,
        bus,
        driver,
        cfg.bus_retries,
    )
    .await
}

pub async fn run_light_producer<B, D>(
    ctx: &SystemContext,
    bus: &SharedBus<B>,
    driver: &mut D,
    cfg: &NodeConfig,
) -> !
where
    D: SensorDriver<B, Reading = crate::readings::LightLevels>,
{
    run_producer(
        &ctx.signals.ready_light,
        &ctx.signals.done_light,
        &ctx.channels.light,
        bus,
        driver,
        cfg.bus_retries,
    )
    .await
}

pub async fn run_particulate_producer<B, D>(
    ctx: &SystemContext,
    bus: &SharedBus<B>,
    driver: &mut D,
    cfg: &NodeConfig,
) -> !
where
    D: SensorDriver<B, Reading = crate::readings::ParticleCount>,
{
    run_producer(
        &ctx.signals.ready_particulate,
        &ctx.signals.done_particulate,
        &ctx.channels.particulate,
        bus,
        driver,
        cfg.bus_retries,
    )
    .await
}

/// The vibration burst loop. Waits until every enabled gated family has
/// finished its bus work this cycle, then owns the bus for one paced burst
/// and ships the hex-encoded capture.
pub async fn run_vibration_task<B, P>(
    ctx: &SystemContext,
    profile: &StationProfile,
    bus: &SharedBus<B>,
    probe: &mut P,
    cfg: &NodeConfig,
) -> !
where
    P: VibrationProbe<B>,
{
    let mut raw = BurstBytes::new();
    loop {
        ctx.signals.wait_all_done(profile).await;
        debug!("bus quiescent, starting vibration burst");
        capture_burst(bus, probe, &cfg.burst, &mut raw).await;

        let mut hex = VibrationHex::new();
        if encode_hex(&raw, &mut hex).is_err() {
            // Ship the truncated payload; the aggregator's length check is
            // the single counting point for a malformed burst.
            error!("vibration hex encode overflowed");
        }
        ctx.channels.vibration.send(hex).await;
    }
}

/// The fan-in side: one receive per enabled family per cycle, in a fixed
/// order, then format and publish. Blocked receives are the backpressure
/// path; a stuck family stalls the whole record rather than publishing a
/// partial one.
pub async fn run_aggregator<P, R>(
    ctx: &SystemContext,
    profile: &StationProfile,
    cfg: &NodeConfig,
    publisher: &mut P,
    restart: &R,
) -> !
where
    P: Publisher,
    R: Restart,
{
    let mut message = MessageBuf::new();
    let mut restart_requested = false;
    loop {
        let readings = CycleReadings {
            thermal: ctx.channels.thermal.receive().await,
            light: if profile.light {
                Some(ctx.channels.light.receive().await)
            } else {
                None
            },
            particulate: if profile.particulate {
                Some(ctx.channels.particulate.receive().await)
            } else {
                None
            },
            vibration: if profile.vibration {
                Some(ctx.channels.vibration.receive().await)
            } else {
                None
            },
        };

        // A short or long burst means the capture path misbehaved; count it
        // but ship the payload anyway.
        if let Some(hex) = &readings.vibration {
            if hex.len() != cfg.burst.hex_chars() {
                error!(
                    "vibration payload is {} chars, expected {}",
                    hex.len(),
                    cfg.burst.hex_chars()
                );
                ctx.errors.record();
            }
        }

        if format_cycle_message(&readings, &mut message).is_err() {
            error!("cycle message overflowed its buffer");
            ctx.errors.record();
        } else if let Err(e) = publisher.publish(profile.topic(), &message).await {
            error!("publish on {} failed: {}", profile.topic(), e);
            ctx.errors.record();
        }

        if !restart_requested && ctx.errors.exceeded(cfg.error_threshold) {
            error!(
                "error count {} exceeds threshold {}, requesting restart",
                ctx.errors.get(),
                cfg.error_threshold
            );
            restart.request_restart();
            restart_requested = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BurstConfig, Station};
    use crate::error::PublishError;
    use crate::readings::{ParticleCount, TempHumidity};
    use crate::sim::SimVibrationProbe;
    use core::cell::{Cell, RefCell};
    use core::future::Future;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_time::{Duration, Timer};

    struct FixedThermal;

    impl<B> SensorDriver<B> for FixedThermal {
        type Reading = TempHumidity;

        fn fallback(&self) -> TempHumidity {
            TempHumidity::DUMMY
        }

        async fn exchange(&mut self, _bus: &mut B) -> Result<TempHumidity, crate::error::BusError> {
            Ok(TempHumidity {
                temp_centi: 2345,
                humidity_q10: 41_984,
            })
        }
    }

    struct FixedParticulate(u16);

    impl<B> SensorDriver<B> for FixedParticulate {
        type Reading = ParticleCount;

        fn fallback(&self) -> ParticleCount {
            ParticleCount::DUMMY
        }

        async fn exchange(&mut self, _bus: &mut B) -> Result<ParticleCount, crate::error::BusError> {
            Ok(ParticleCount(self.0))
        }
    }

    /// Remembers the last publish and fails the first `failures` calls.
    /// Shared-reference friendly so the driving script can inspect it while
    /// the aggregator holds it.
    struct ScriptedPublisher {
        failures: Cell<u32>,
        published: Cell<u32>,
        last_topic: RefCell<heapless::String<32>>,
        last_payload: RefCell<MessageBuf>,
    }

    impl ScriptedPublisher {
        fn new(failures: u32) -> Self {
            Self {
                failures: Cell::new(failures),
                published: Cell::new(0),
                last_topic: RefCell::new(heapless::String::new()),
                last_payload: RefCell::new(MessageBuf::new()),
            }
        }
    }

    impl Publisher for &ScriptedPublisher {
        async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(PublishError::Transient);
            }
            self.published.set(self.published.get() + 1);
            let mut last_topic = self.last_topic.borrow_mut();
            last_topic.clear();
            let _ = last_topic.push_str(topic);
            let mut last_payload = self.last_payload.borrow_mut();
            last_payload.clear();
            let _ = last_payload.push_str(payload);
            Ok(())
        }
    }

    struct CountingRestart(Cell<u32>);

    impl CountingRestart {
        fn new() -> Self {
            Self(Cell::new(0))
        }
    }

    impl Restart for &CountingRestart {
        fn request_restart(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn quick_cfg() -> NodeConfig {
        NodeConfig {
            cycle_period: Duration::from_millis(20),
            bus_retries: RetryPolicy {
                attempts: 3,
                delay: Duration::from_millis(1),
            },
            burst: BurstConfig {
                samples: 5,
                sample_rate_hz: 500,
            },
            ..NodeConfig::DEFAULT
        }
    }

    /// Run a never-ending task future against a finite driving script.
    fn run_script<T>(task: impl Future<Output = T>, script: impl Future) {
        block_on(async {
            match select(task, script).await {
                Either::Second(_) => {}
                Either::First(_) => unreachable!("task loop returned"),
            }
        });
    }

    #[test]
    fn producer_waits_for_ready_and_reports_done() {
        let ctx = SystemContext::new();
        let bus = SharedBus::new(());
        let mut driver = FixedThermal;
        let cfg = quick_cfg();

        let task = run_thermal_producer(&ctx, &bus, &mut driver, &cfg);
        let script = async {
            // No ready flag yet: nothing may be produced.
            Timer::after(Duration::from_millis(20)).await;
            assert!(ctx.channels.thermal.try_receive().is_err());
            assert!(!ctx.signals.done_thermal.signaled());

            ctx.signals.ready_thermal.signal(());
            let reading = ctx.channels.thermal.receive().await;
            assert_eq!(reading.temp_centi, 2345);
            assert!(ctx.signals.done_thermal.signaled());
        };
        run_script(task, script);
    }

    #[test]
    fn vibration_task_waits_for_every_enabled_done_flag() {
        let ctx = SystemContext::new();
        let profile = Station::Combined.profile();
        let bus = SharedBus::new(());
        let mut probe = SimVibrationProbe::new();
        let cfg = quick_cfg();

        let task = run_vibration_task(&ctx, &profile, &bus, &mut probe, &cfg);
        let script = async {
            ctx.signals.done_thermal.signal(());
            ctx.signals.done_light.signal(());
            Timer::after(Duration::from_millis(30)).await;
            // Particulate is still out on the bus: no burst yet.
            assert!(ctx.channels.vibration.try_receive().is_err());

            ctx.signals.done_particulate.signal(());
            let hex = ctx.channels.vibration.receive().await;
            assert_eq!(hex.len(), cfg.burst.hex_chars());
        };
        run_script(task, script);
    }

    #[test]
    fn aggregator_assembles_the_station_record() {
        let ctx = SystemContext::new();
        let profile = Station::SpinCoating.profile();
        // One-sample burst so the 18-char payload below is the expected size.
        let cfg = NodeConfig {
            burst: BurstConfig {
                samples: 1,
                sample_rate_hz: 500,
            },
            ..quick_cfg()
        };
        let publisher = ScriptedPublisher::new(0);
        let restart = CountingRestart::new();

        ctx.channels
            .thermal
            .try_send(TempHumidity {
                temp_centi: 2345,
                humidity_q10: 41_984,
            })
            .unwrap();
        ctx.channels
            .particulate
            .try_send(ParticleCount(17))
            .unwrap();
        let mut hex = VibrationHex::new();
        let _ = hex.push_str("0102AB0405C6070809");
        ctx.channels.vibration.try_send(hex).unwrap();

        {
            let mut sink = &publisher;
            let restart_ref = &restart;
            let task = run_aggregator(&ctx, &profile, &cfg, &mut sink, &restart_ref);
            let script = async {
                while publisher.published.get() == 0 {
                    Timer::after(Duration::from_millis(5)).await;
                }
            };
            run_script(task, script);
        }

        assert_eq!(publisher.last_topic.borrow().as_str(), "topic/SC");
        assert_eq!(
            publisher.last_payload.borrow().as_str(),
            "{ \"temperature\": 23.45, \"humidity\": 41.00, \
             \"particle_count\": 17, \"vibration\": \"0102AB0405C6070809\" }"
        );
        assert_eq!(ctx.errors.get(), 0);
        assert_eq!(restart.0.get(), 0);
    }

    #[test]
    fn malformed_burst_counts_one_error_and_still_ships() {
        let ctx = SystemContext::new();
        let profile = Station::SpinCoating.profile();
        // One-sample burst: 18 hex characters expected.
        let cfg = NodeConfig {
            burst: BurstConfig {
                samples: 1,
                sample_rate_hz: 500,
            },
            ..quick_cfg()
        };
        let publisher = ScriptedPublisher::new(0);
        let restart = CountingRestart::new();

        ctx.channels.thermal.try_send(TempHumidity::DUMMY).unwrap();
        ctx.channels
            .particulate
            .try_send(ParticleCount::DUMMY)
            .unwrap();
        let mut hex = VibrationHex::new();
        let _ = hex.push_str("0102AB");
        ctx.channels.vibration.try_send(hex).unwrap();

        {
            let mut sink = &publisher;
            let restart_ref = &restart;
            let task = run_aggregator(&ctx, &profile, &cfg, &mut sink, &restart_ref);
            let script = async {
                while publisher.published.get() == 0 {
                    Timer::after(Duration::from_millis(5)).await;
                }
            };
            run_script(task, script);
        }

        // The wrong-length payload is counted exactly once and shipped as-is.
        assert_eq!(ctx.errors.get(), 1);
        assert!(publisher
            .last_payload
            .borrow()
            .as_str()
            .contains("\"vibration\": \"0102AB\""));
        assert_eq!(restart.0.get(), 0);
    }

    #[test]
    fn aggregator_requests_restart_past_the_error_threshold() {
        let ctx = SystemContext::new();
        let profile = Station::SpinCoating.profile();
        // Zero-sample burst: the empty payloads below pass the length check,
        // so only the publish failures count.
        let cfg = NodeConfig {
            error_threshold: 2,
            burst: BurstConfig {
                samples: 0,
                sample_rate_hz: 500,
            },
            ..quick_cfg()
        };
        // Three failed publishes push the counter past the threshold of 2.
        let publisher = ScriptedPublisher::new(3);
        let restart = CountingRestart::new();

        {
            let mut sink = &publisher;
            let restart_ref = &restart;
            let task = run_aggregator(&ctx, &profile, &cfg, &mut sink, &restart_ref);
            let script = async {
                for _ in 0..3 {
                    ctx.channels.thermal.send(TempHumidity::DUMMY).await;
                    ctx.channels.particulate.send(ParticleCount::DUMMY).await;
                    ctx.channels.vibration.send(VibrationHex::new()).await;
                }
                while restart.0.get() == 0 {
                    Timer::after(Duration::from_millis(5)).await;
                }
            };
            run_script(task, script);
        }

        assert_eq!(ctx.errors.get(), 3);
        // Restart is requested exactly once, not on every later record.
        assert_eq!(restart.0.get(), 1);
    }

    #[test]
    fn channel_backpressure_stalls_the_producer() {
        let ctx = SystemContext::new();
        let bus = SharedBus::new(());
        let mut driver = FixedParticulate(9);
        let cfg = quick_cfg();

        let task = run_particulate_producer(&ctx, &bus, &mut driver, &cfg);
        let script = async {
            // Two cycles with no consumer: the first reading fills the
            // channel, the second send blocks before consuming cycle three.
            ctx.signals.ready_particulate.signal(());
            Timer::after(Duration::from_millis(20)).await;
            ctx.signals.ready_particulate.signal(());
            Timer::after(Duration::from_millis(20)).await;
            ctx.signals.ready_particulate.signal(());
            Timer::after(Duration::from_millis(20)).await;

            // Draining one record unblocks exactly one pending send.
            assert_eq!(ctx.channels.particulate.receive().await, ParticleCount(9));
            Timer::after(Duration::from_millis(20)).await;
            assert_eq!(ctx.channels.particulate.receive().await, ParticleCount(9));
        };
        run_script(task, script);
    }
}
