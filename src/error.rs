// VitalGuard - Error Types
//
// Every failure in the pipeline is tagged fatal or recoverable. Only a bad
// configuration or an unverified sensor stops the firmware; everything else
// means "no value this cycle" or "retry on the next trigger".

use thiserror::Error;

/// Whether the firmware can keep running after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Recoverable,
}

/// A failed register transaction on the shared I2C bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bus error on device 0x{addr:02x} reg 0x{reg:02x}: {reason}")]
pub struct BusError {
    pub addr: u8,
    pub reg: u8,
    pub reason: String,
}

impl BusError {
    pub fn new(addr: u8, reg: u8, reason: impl Into<String>) -> Self {
        Self { addr, reg, reason: reason.into() }
    }
}

/// Which quality gate rejected the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalRejection {
    /// A channel mean is below the contact floor.
    PoorContact { dc_a: f32, dc_b: f32 },
    /// A channel has no peak-to-peak variation.
    NoPulsatileComponent,
    /// Both perfusion ratios are below the noise floor.
    BelowNoiseFloor,
    /// Ratio of ratios outside the plausible band.
    RatioOutOfRange(f32),
    /// Fewer than two usable pulse peaks in the window.
    TooFewPeaks(usize),
}

impl core::fmt::Display for SignalRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PoorContact { dc_a, dc_b } => {
                write!(f, "poor skin contact (dc {:.0}/{:.0})", dc_a, dc_b)
            }
            Self::NoPulsatileComponent => write!(f, "no pulsatile component"),
            Self::BelowNoiseFloor => write!(f, "perfusion below noise floor"),
            Self::RatioOutOfRange(r) => write!(f, "ratio of ratios {:.3} out of range", r),
            Self::TooFewPeaks(n) => write!(f, "{} pulse peaks, need at least 2", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VitalsError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("device identity mismatch: expected part id 0x{expected:02x}, found 0x{found:02x}")]
    DeviceIdentity { expected: u8, found: u8 },

    #[error("insufficient data: {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("signal quality: {0}")]
    SignalQuality(SignalRejection),

    #[error("network: {0}")]
    Network(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VitalsError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::DeviceIdentity { .. } | Self::Config(_) => Severity::Fatal,
            Self::Bus(_)
            | Self::InsufficientData { .. }
            | Self::SignalQuality(_)
            | Self::Network(_) => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_identity_and_config_are_fatal() {
        assert!(VitalsError::DeviceIdentity { expected: 0x15, found: 0x00 }.is_fatal());
        assert!(VitalsError::Config("x".into()).is_fatal());
        assert!(!VitalsError::Bus(BusError::new(0x57, 0x07, "nack")).is_fatal());
        assert!(!VitalsError::InsufficientData { have: 1, need: 2 }.is_fatal());
        assert!(!VitalsError::SignalQuality(SignalRejection::BelowNoiseFloor).is_fatal());
        assert!(!VitalsError::Network("timeout".into()).is_fatal());
    }

    #[test]
    fn bus_error_message_names_register() {
        let err = VitalsError::from(BusError::new(0x57, 0xFF, "nack"));
        assert_eq!(err.to_string(), "bus error on device 0x57 reg 0xff: nack");
    }
}
