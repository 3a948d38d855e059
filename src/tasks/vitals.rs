// VitalGuard - Vitals Task
//
// Single cooperative loop: drain the PPG FIFO every poll, assemble one data
// point per cycle, and hand it to the uplink buffer. Network sends block the
// loop for at most the HTTP timeout.

use std::thread;
use std::time::{Duration, Instant};

use crate::ambient::AmbientSource;
use crate::bus::RegisterBus;
use crate::config::VitalsConfig;
use crate::cycle::CycleCounter;
use crate::drivers::max30102::Max30102;
use crate::dsp::{HeartRateEstimator, Spo2Estimator, WindowManager};
use crate::error::VitalsError;
use crate::events::VitalsDataPoint;
use crate::uplink::{FlushOutcome, Transport, UplinkBuffer};

/// Monotonic milliseconds for cycle and flush timing.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was started (boot, on the device).
pub struct Uptime {
    start: Instant,
}

impl Uptime {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for Uptime {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// What one pass of the loop did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Decimated samples added to the windows.
    pub retained: usize,
    /// The data point assembled this tick, if a cycle was due.
    pub point: Option<VitalsDataPoint>,
    pub flush: FlushOutcome,
}

pub struct VitalsMonitor<B, T, A> {
    sensor: Max30102<B>,
    windows: WindowManager,
    heart_rate: HeartRateEstimator,
    spo2: Spo2Estimator,
    cycles: CycleCounter,
    uplink: UplinkBuffer<T>,
    ambient: A,
    cycle_interval_ms: u64,
    last_cycle_ms: u64,
}

impl<B: RegisterBus, T: Transport, A: AmbientSource> VitalsMonitor<B, T, A> {
    /// Validate the configuration and bring up the sensor.
    ///
    /// Fails with a fatal error on a bad configuration or an unverified part
    /// id; a bus error here is returned as well, since no sensor is running yet.
    pub fn new(config: &VitalsConfig, bus: B, transport: T, ambient: A) -> Result<Self, VitalsError> {
        config.validate()?;

        let mut sensor = Max30102::new(bus, &config.sampling);
        sensor.init()?;

        let rate = config.sampling.effective_rate_hz();
        Ok(Self {
            sensor,
            windows: WindowManager::new(&config.sampling),
            heart_rate: HeartRateEstimator::new(
                config.heart_rate.clone(),
                rate,
                config.sampling.window_seconds,
            ),
            spo2: Spo2Estimator::new(config.spo2.clone()),
            cycles: CycleCounter::new(config.cycle_max),
            uplink: UplinkBuffer::new(config.uplink.clone(), transport),
            ambient,
            cycle_interval_ms: config.cycle_interval_ms,
            last_cycle_ms: 0,
        })
    }

    /// Drain the FIFO into the analysis windows.
    pub fn poll(&mut self) -> usize {
        let samples = self.sensor.read_fifo();
        self.windows.extend(samples)
    }

    /// Run both estimators on the current windows and stamp a new cycle.
    pub fn assemble_cycle(&mut self, now_ms: u64) -> VitalsDataPoint {
        let cycle = self.cycles.advance();
        let heartrate = self.heart_rate.estimate(self.windows.channel_a());
        let spo2 = self.spo2.estimate(self.windows.channel_a(), self.windows.channel_b());
        let ambient = self.ambient.read();

        log::info!(
            "Cycle {}: HR {} SpO2 {} (window {}/{})",
            cycle,
            fmt_reading(heartrate, "bpm"),
            fmt_reading(spo2, "%"),
            self.windows.len(),
            self.windows.capacity()
        );

        VitalsDataPoint::new(cycle, now_ms, self.windows.latest(), heartrate, spo2, ambient)
    }

    /// One pass of the loop at `now_ms`.
    ///
    /// The interval-based flush is only checked on cycle boundaries, so a
    /// collector outage costs at most one blocked send per cycle.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let retained = self.poll();

        if now_ms.saturating_sub(self.last_cycle_ms) < self.cycle_interval_ms {
            return TickReport { retained, point: None, flush: FlushOutcome::Idle };
        }
        self.last_cycle_ms = now_ms;

        let point = self.assemble_cycle(now_ms);
        let flush = match self.uplink.add(point, now_ms) {
            FlushOutcome::Idle => self.uplink.flush_if_due(now_ms),
            outcome => outcome,
        };
        TickReport { retained, point: Some(point), flush }
    }

    pub fn windows(&self) -> &WindowManager {
        &self.windows
    }

    pub fn uplink(&self) -> &UplinkBuffer<T> {
        &self.uplink
    }

    pub fn uplink_mut(&mut self) -> &mut UplinkBuffer<T> {
        &mut self.uplink
    }

    pub fn sensor_bus_mut(&mut self) -> &mut B {
        self.sensor.bus_mut()
    }
}

/// Run the monitor forever, pacing each pass to `poll_interval`.
pub fn vitals_task<B, T, A, C>(mut monitor: VitalsMonitor<B, T, A>, clock: C, poll_interval: Duration) -> !
where
    B: RegisterBus,
    T: Transport,
    A: AmbientSource,
    C: Clock,
{
    log::info!("Vitals task started");

    loop {
        let tick_start = Instant::now();

        if let FlushOutcome::Retained(e) = monitor.tick(clock.now_ms()).flush {
            log::debug!("Uplink retry pending: {}", e);
        }

        // Sleep for the remainder of the poll interval.
        let elapsed = tick_start.elapsed();
        if elapsed < poll_interval {
            thread::sleep(poll_interval - elapsed);
        }
    }
}

fn fmt_reading(value: Option<f32>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1}{}", v, unit),
        None => "--".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambient::NoAmbient;
    use crate::sim::SyntheticPpg;
    use crate::uplink::tests::ScriptedTransport;

    fn config() -> VitalsConfig {
        let mut config = VitalsConfig::default();
        config.sampling.reset_settle_ms = 0;
        config.uplink.batch_size = 5;
        config
    }

    fn monitor() -> VitalsMonitor<SyntheticPpg, ScriptedTransport, NoAmbient> {
        VitalsMonitor::new(&config(), SyntheticPpg::new(72.0, 100), ScriptedTransport::default(), NoAmbient)
            .unwrap()
    }

    #[test]
    fn poll_decimates_fifo_contents() {
        let mut m = monitor();
        m.sensor_bus_mut().produce(30);
        assert_eq!(m.poll(), 3);
        assert_eq!(m.windows().len(), 3);
    }

    #[test]
    fn first_cycle_after_one_interval() {
        let mut m = monitor();
        assert!(m.tick(500).point.is_none());
        let point = m.tick(1000).point.unwrap();
        assert_eq!(point.cycle, 1);
        assert_eq!(point.timestamp, 1000);
        assert!(m.tick(1500).point.is_none());
        assert_eq!(m.tick(2000).point.unwrap().cycle, 2);
    }

    #[test]
    fn early_cycles_have_no_estimates() {
        let mut m = monitor();
        m.sensor_bus_mut().produce(100);
        let point = m.tick(1000).point.unwrap();
        assert_eq!(point.vital_signs.ppg.heartrate, None);
        assert_eq!(point.vital_signs.ppg.spo2, None);
        assert!(point.vital_signs.ppg.ir > 0);
    }

    #[test]
    fn bad_part_id_aborts_construction() {
        let mut bus = SyntheticPpg::new(72.0, 100);
        bus.set_part_id(0x00);
        let result = VitalsMonitor::new(&config(), bus, ScriptedTransport::default(), NoAmbient);
        assert!(matches!(result, Err(ref e) if e.is_fatal()));
    }

    #[test]
    fn invalid_config_aborts_construction() {
        let mut cfg = config();
        cfg.uplink.batch_size = 0;
        let result = VitalsMonitor::new(&cfg, SyntheticPpg::new(72.0, 100), ScriptedTransport::default(), NoAmbient);
        assert!(matches!(result, Err(VitalsError::Config(_))));
    }

    #[test]
    fn ambient_readings_are_copied_into_points() {
        use crate::events::{Acceleration, AmbientReadings};

        let ambient = || AmbientReadings {
            temperature: 36.6,
            humidity: 40.0,
            force: 812.0,
            accel: Acceleration { ax: 0.1, ay: -0.2, az: 0.98 },
        };
        let mut m = VitalsMonitor::new(&config(), SyntheticPpg::new(72.0, 100), ScriptedTransport::default(), ambient)
            .unwrap();
        let signs = m.tick(1000).point.unwrap().vital_signs;
        assert_eq!(signs.temperature, 36.6);
        assert_eq!(signs.force, 812.0);
        assert_eq!(signs.accel.az, 0.98);
    }

    #[test]
    fn fmt_reading_handles_missing_values() {
        assert_eq!(fmt_reading(Some(71.94), "bpm"), "71.9bpm");
        assert_eq!(fmt_reading(None, "%"), "--");
    }
}
