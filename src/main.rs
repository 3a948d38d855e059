// VitalGuard - Firmware Entry Point
//
// Boot sequence (device):
//   1. Join Wi-Fi.
//   2. Bring up I2C and select the PPG channel on the multiplexer.
//   3. Spawn the vitals task, which verifies and configures the MAX30102
//      and then runs the acquisition loop forever.
//
// On the host the same loop runs against a synthetic sensor on simulated
// time, logging each batch instead of posting it.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use vitalguard::ambient::NoAmbient;
    use vitalguard::bus::MuxedBus;
    use vitalguard::config::*;
    use vitalguard::platform::http::EspHttpTransport;
    use vitalguard::platform::i2c::EspI2cBus;
    use vitalguard::platform::wifi;
    use vitalguard::tasks::vitals::{vitals_task, Uptime, VitalsMonitor};

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("VitalGuard firmware starting...");

    let clock = Uptime::start();
    let config = VitalsConfig::default();

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ---- Network ----------------------------------------------------------
    // Kept alive for the lifetime of the firmware.
    let _wifi = wifi::connect(peripherals.modem, sysloop, nvs, WIFI_SSID, WIFI_PASS)?;

    // ---- I2C bus (PPG sensor behind the TCA9548A) --------------------------
    let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio22, // SDA
        peripherals.pins.gpio20, // SCL
        &i2c_config,
    )?;
    log::info!("I2C up on SDA={} SCL={} at {} kHz", PIN_I2C_SDA, PIN_I2C_SCL, I2C_BAUDRATE_KHZ);

    let bus = MuxedBus::new(
        EspI2cBus::new(i2c),
        MUX_CHANNEL_PPG,
        Duration::from_millis(config.sampling.mux_settle_ms),
    )?;

    // ---- Vitals task ------------------------------------------------------
    // The HTTP client is created on the task's own thread and never leaves it.
    let url = format!("{}{}", SERVER_URL, VITALS_ENDPOINT);
    let task = thread::Builder::new()
        .name("vitals".into())
        .stack_size(STACK_VITALS)
        .spawn(move || -> anyhow::Result<()> {
            let transport = EspHttpTransport::new(url, Duration::from_millis(config.uplink.send_timeout_ms));
            let monitor = VitalsMonitor::new(&config, bus, transport, NoAmbient)?;
            vitals_task(monitor, clock, Duration::from_millis(config.poll_interval_ms))
        })?;

    // The task only returns on a fatal start-up error.
    match task.join() {
        Ok(Err(e)) => {
            log::error!("Vitals task stopped: {:#}", e);
            Err(e)
        }
        Ok(Ok(())) => Ok(()),
        Err(_) => anyhow::bail!("vitals task panicked"),
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use vitalguard::ambient::NoAmbient;
    use vitalguard::config::VitalsConfig;
    use vitalguard::sim::{LogTransport, SyntheticPpg};
    use vitalguard::tasks::vitals::VitalsMonitor;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seconds: u64 = match std::env::var("VITALGUARD_SIM_SECONDS") {
        Ok(v) => v.parse()?,
        Err(_) => 60,
    };
    let bpm: f32 = match std::env::var("VITALGUARD_SIM_BPM") {
        Ok(v) => v.parse()?,
        Err(_) => 72.0,
    };
    log::info!("VitalGuard host simulation: {} s at {} bpm", seconds, bpm);

    let mut config = VitalsConfig::default();
    config.sampling.reset_settle_ms = 0;

    let sensor = SyntheticPpg::new(bpm, config.sampling.native_rate_hz);
    let mut monitor = VitalsMonitor::new(&config, sensor, LogTransport::default(), NoAmbient)?;

    let end_ms = seconds * 1000;
    let mut now_ms = 0;
    while now_ms <= end_ms {
        monitor.sensor_bus_mut().produce_until(now_ms);
        monitor.tick(now_ms);
        now_ms += config.poll_interval_ms;
    }

    let pending = monitor.uplink().len();
    let dropped = monitor.uplink().dropped();
    let transport = monitor.uplink_mut().transport_mut();
    log::info!(
        "Simulation done: {} batches ({} bytes) sent, {} points pending, {} dropped",
        transport.batches,
        transport.bytes,
        pending,
        dropped
    );
    Ok(())
}
