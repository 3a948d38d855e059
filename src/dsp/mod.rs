// VitalGuard - PPG Signal Processing

pub mod heart_rate;
pub mod spo2;
pub mod window;

pub use heart_rate::HeartRateEstimator;
pub use spo2::Spo2Estimator;
pub use window::WindowManager;
