// VitalGuard - Wearable Vitals Monitor
//
// On-device pipeline: MAX30102 FIFO acquisition, decimation into bounded
// analysis windows, heart-rate and SpO2 estimation, and a bounded batching
// buffer that ships data points to the collector over HTTP.

pub mod ambient;
pub mod bus;
pub mod config;
pub mod cycle;
pub mod drivers;
pub mod dsp;
pub mod error;
pub mod events;
pub mod sim;
pub mod tasks;
pub mod uplink;

#[cfg(target_os = "espidf")]
pub mod platform;
