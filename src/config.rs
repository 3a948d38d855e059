// VitalGuard - Hardware & System Configuration
// Target: ESP32 with a MAX30102 behind a TCA9548A I2C multiplexer

use crate::error::VitalsError;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_I2C_SDA: i32 = 22;
pub const PIN_I2C_SCL: i32 = 20;
pub const I2C_BAUDRATE_KHZ: u32 = 400;

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MAX30102: u8 = 0x57;
pub const I2C_ADDR_TCA9548A: u8 = 0x70;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// TCA9548A channel assignment (from the board wiring)
pub const MUX_CHANNEL_PPG: u8 = 0;
pub const MUX_CHANNEL_COUNT: u8 = 8;

// MAX30102 FIFO: 32 slots addressed by 5-bit pointers
pub const MAX30102_FIFO_SLOTS: u8 = 32;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_VITALS: usize = 16 * 1024; // JSON envelope + HTTP client

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const POLL_INTERVAL_MS: u64 = 40;      // FIFO holds 320 ms at 100 sps
pub const CYCLE_INTERVAL_MS: u64 = 1000;   // one data point per second
pub const RESET_SETTLE_MS: u64 = 100;
pub const MUX_SETTLE_MS: u64 = 5;

// ---------------------------------------------------------------------------
// Network (build-time overrides)
// ---------------------------------------------------------------------------
pub const WIFI_SSID: &str = match option_env!("VITALGUARD_WIFI_SSID") {
    Some(v) => v,
    None => "vitalguard",
};
pub const WIFI_PASS: &str = match option_env!("VITALGUARD_WIFI_PASS") {
    Some(v) => v,
    None => "",
};
pub const SERVER_URL: &str = match option_env!("VITALGUARD_SERVER_URL") {
    Some(v) => v,
    None => "http://192.168.1.10:9999",
};
pub const VITALS_ENDPOINT: &str = "/api/vitals";
pub const HTTP_TIMEOUT_MS: u64 = 5000;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Acquisition and window sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Native sensor output rate (samples per second after on-chip averaging).
    pub native_rate_hz: u32,
    /// Keep one of every `downsample_factor` raw samples.
    pub downsample_factor: u32,
    /// Length of the analysis window.
    pub window_seconds: u32,
    /// Physical FIFO depth; caps how many records one poll may read.
    pub fifo_depth: u8,
    pub reset_settle_ms: u64,
    pub mux_settle_ms: u64,
}

impl SamplingConfig {
    /// Processing rate after decimation.
    pub fn effective_rate_hz(&self) -> f32 {
        self.native_rate_hz as f32 / self.downsample_factor as f32
    }

    /// Window capacity in decimated samples.
    pub fn window_capacity(&self) -> usize {
        (self.effective_rate_hz() * self.window_seconds as f32).round() as usize
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            native_rate_hz: 100,
            downsample_factor: 10,
            window_seconds: 10,
            fifo_depth: MAX30102_FIFO_SLOTS,
            reset_settle_ms: RESET_SETTLE_MS,
            mux_settle_ms: MUX_SETTLE_MS,
        }
    }
}

/// Peak-detection heart-rate thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateConfig {
    /// Shortest window (seconds) worth analysing.
    pub min_window_seconds: f32,
    /// Moving-average width in samples.
    pub smoothing_width: usize,
    /// Peaks must exceed this fraction of the smoothed maximum.
    pub threshold_fraction: f32,
    /// Minimum spacing between accepted peaks (~300 ms caps the rate near 200 bpm).
    pub refractory_seconds: f32,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            min_window_seconds: 5.0,
            smoothing_width: 5,
            threshold_fraction: 0.3,
            refractory_seconds: 0.3,
        }
    }
}

/// Ratio-of-ratios SpO2 gates and calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Spo2Config {
    /// Minimum paired samples (about 4 s at the effective rate).
    pub min_samples: usize,
    pub max_samples: usize,
    /// Mean raw level below which skin contact is considered poor.
    pub contact_dc_floor: f32,
    /// AC/DC ratio below which a channel carries no usable pulse.
    pub ratio_noise_floor: f32,
    pub r_min: f32,
    pub r_max: f32,
    /// EMA weight of the newest estimate.
    pub alpha: f32,
    pub calibration_offset: f32,
    pub calibration_slope: f32,
    pub clamp_min: f32,
    pub clamp_max: f32,
}

impl Default for Spo2Config {
    fn default() -> Self {
        Self {
            min_samples: 40,
            max_samples: 100,
            contact_dc_floor: 5000.0,
            ratio_noise_floor: 0.001,
            r_min: 0.2,
            r_max: 3.0,
            alpha: 0.3,
            calibration_offset: 110.0,
            calibration_slope: 25.0,
            clamp_min: 70.0,
            clamp_max: 100.0,
        }
    }
}

/// Batching and delivery to the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkConfig {
    pub device_id: String,
    /// Flush as soon as this many points are buffered.
    pub batch_size: usize,
    /// Hard memory cap; oldest points are dropped beyond it.
    pub max_buffer_points: usize,
    /// Flush a non-empty buffer when this long has passed since the last success.
    pub flush_interval_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            device_id: "ESP32_001".into(),
            batch_size: 20,
            max_buffer_points: 100,
            flush_interval_ms: 10_000,
            send_timeout_ms: HTTP_TIMEOUT_MS,
        }
    }
}

/// Every threshold the pipeline uses, injected at the composition root.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsConfig {
    pub sampling: SamplingConfig,
    pub heart_rate: HeartRateConfig,
    pub spo2: Spo2Config,
    pub uplink: UplinkConfig,
    /// Cycle ids run 1..=cycle_max and wrap back to 1.
    pub cycle_max: u32,
    pub poll_interval_ms: u64,
    pub cycle_interval_ms: u64,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            heart_rate: HeartRateConfig::default(),
            spo2: Spo2Config::default(),
            uplink: UplinkConfig::default(),
            cycle_max: 65_535,
            poll_interval_ms: POLL_INTERVAL_MS,
            cycle_interval_ms: CYCLE_INTERVAL_MS,
        }
    }
}

impl VitalsConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), VitalsError> {
        let s = &self.sampling;
        if s.downsample_factor == 0 || s.native_rate_hz == 0 {
            return Err(VitalsError::Config("sample rate and downsample factor must be non-zero".into()));
        }
        if s.window_capacity() == 0 {
            return Err(VitalsError::Config("analysis window holds no samples".into()));
        }
        if s.fifo_depth == 0 || s.fifo_depth > MAX30102_FIFO_SLOTS {
            return Err(VitalsError::Config(format!(
                "fifo depth {} must be in 1..={}",
                s.fifo_depth, MAX30102_FIFO_SLOTS
            )));
        }
        if self.heart_rate.smoothing_width == 0 {
            return Err(VitalsError::Config("smoothing width must be non-zero".into()));
        }
        if self.heart_rate.min_window_seconds > s.window_seconds as f32 {
            return Err(VitalsError::Config(format!(
                "heart-rate minimum window {} s exceeds the {} s analysis window",
                self.heart_rate.min_window_seconds, s.window_seconds
            )));
        }
        if !(self.spo2.alpha > 0.0 && self.spo2.alpha <= 1.0) {
            return Err(VitalsError::Config(format!("alpha {} outside (0, 1]", self.spo2.alpha)));
        }
        if self.spo2.min_samples == 0 || self.spo2.min_samples > self.spo2.max_samples {
            return Err(VitalsError::Config("spo2 sample bounds are inconsistent".into()));
        }
        if self.spo2.min_samples > s.window_capacity() {
            return Err(VitalsError::Config(format!(
                "spo2 needs {} samples but the window holds {}",
                self.spo2.min_samples,
                s.window_capacity()
            )));
        }
        let u = &self.uplink;
        if u.batch_size == 0 || u.batch_size > u.max_buffer_points {
            return Err(VitalsError::Config(format!(
                "batch size {} must be in 1..={}",
                u.batch_size, u.max_buffer_points
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(VitalsError::Config("poll interval must be non-zero".into()));
        }
        if self.cycle_max == 0 {
            return Err(VitalsError::Config("cycle max must be at least 1".into()));
        }
        Ok(())
    }
}
