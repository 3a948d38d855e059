// VitalGuard - SpO2 Estimator
//
// Ratio-of-ratios SpO2 with signal-quality gating. Each gate either passes
// or rejects the whole window; a rejected window never produces a number.
// Accepted estimates are smoothed with an EMA whose state lives for the
// life of the device.

use crate::config::Spo2Config;
use crate::error::{SignalRejection, VitalsError};

#[derive(Debug, Clone)]
pub struct Spo2Estimator {
    config: Spo2Config,
    smoothed: Option<f32>,
}

impl Spo2Estimator {
    pub fn new(config: Spo2Config) -> Self {
        Self { config, smoothed: None }
    }

    /// Last smoothed estimate, if any window has been accepted yet.
    pub fn last(&self) -> Option<f32> {
        self.smoothed
    }

    /// Smoothed saturation percentage, or `None` when a gate rejects the window.
    /// Rejected windows leave the smoothing state untouched.
    pub fn estimate(&mut self, a: &[f32], b: &[f32]) -> Option<f32> {
        match self.try_estimate(a, b) {
            Ok(spo2) => Some(spo2),
            Err(e) => {
                log::debug!("SpO2 unavailable: {}", e);
                None
            }
        }
    }

    pub fn try_estimate(&mut self, a: &[f32], b: &[f32]) -> Result<f32, VitalsError> {
        let raw = self.raw_estimate(a, b)?;
        let smoothed = match self.smoothed {
            None => raw,
            Some(prior) => (1.0 - self.config.alpha) * prior + self.config.alpha * raw,
        };
        self.smoothed = Some(smoothed);
        Ok(smoothed)
    }

    /// Calibrated, clamped value for one window, before smoothing.
    pub fn raw_estimate(&self, a: &[f32], b: &[f32]) -> Result<f32, VitalsError> {
        let cfg = &self.config;
        let n = a.len().min(b.len());
        if n < cfg.min_samples {
            return Err(VitalsError::InsufficientData { have: n, need: cfg.min_samples });
        }
        let take = n.min(cfg.max_samples);
        let a = &a[a.len() - take..];
        let b = &b[b.len() - take..];

        let dc_a = mean(a);
        let dc_b = mean(b);
        if dc_a < cfg.contact_dc_floor || dc_b < cfg.contact_dc_floor {
            return Err(VitalsError::SignalQuality(SignalRejection::PoorContact { dc_a, dc_b }));
        }

        let ac_a = peak_to_peak(a, dc_a);
        let ac_b = peak_to_peak(b, dc_b);
        if ac_a <= 0.0 || ac_b <= 0.0 {
            return Err(VitalsError::SignalQuality(SignalRejection::NoPulsatileComponent));
        }

        let ratio_a = ac_a / dc_a;
        let ratio_b = ac_b / dc_b;
        if ratio_a < cfg.ratio_noise_floor && ratio_b < cfg.ratio_noise_floor {
            return Err(VitalsError::SignalQuality(SignalRejection::BelowNoiseFloor));
        }

        let r = ratio_a / ratio_b;
        if !(cfg.r_min..=cfg.r_max).contains(&r) {
            return Err(VitalsError::SignalQuality(SignalRejection::RatioOutOfRange(r)));
        }

        let spo2 = cfg.calibration_offset - cfg.calibration_slope * r;
        Ok(spo2.clamp(cfg.clamp_min, cfg.clamp_max))
    }
}

fn mean(signal: &[f32]) -> f32 {
    signal.iter().sum::<f32>() / signal.len() as f32
}

/// Peak-to-peak amplitude of the DC-removed signal.
fn peak_to_peak(signal: &[f32], dc: f32) -> f32 {
    let (lo, hi) = signal
        .iter()
        .map(|v| v - dc)
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    hi - lo
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating dc +/- ac/2, so the mean is exactly `dc` and peak-to-peak is `ac`.
    fn square(dc: f32, ac: f32, n: usize) -> Vec<f32> {
        (0..n).map(|i| if i % 2 == 0 { dc + ac / 2.0 } else { dc - ac / 2.0 }).collect()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn calibration_from_known_ratio() {
        let est = Spo2Estimator::new(Spo2Config::default());
        // ratio A = 0.01, ratio B = 0.02 -> R = 0.5
        let raw = est.raw_estimate(&square(50_000.0, 500.0, 60), &square(40_000.0, 800.0, 60)).unwrap();
        assert!(close(raw, 110.0 - 25.0 * 0.5), "{raw}");
    }

    #[test]
    fn ema_smoothing_across_calls() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        let a = square(50_000.0, 500.0, 60);

        let first = est.estimate(&a, &square(40_000.0, 800.0, 60)).unwrap();
        assert!(close(first, 97.5), "{first}");

        // R = 1.0 -> raw 85
        let second = est.estimate(&a, &square(40_000.0, 400.0, 60)).unwrap();
        assert!(close(second, 0.7 * 97.5 + 0.3 * 85.0), "{second}");
        assert_eq!(est.last(), Some(second));
    }

    #[test]
    fn clamps_to_physiological_range() {
        let est = Spo2Estimator::new(Spo2Config::default());
        let a = square(50_000.0, 500.0, 60);
        // R = 0.25 -> 103.75 -> 100
        let high = est.raw_estimate(&a, &square(50_000.0, 2_000.0, 60)).unwrap();
        assert!(close(high, 100.0));
        // R = 2.0 -> 60 -> 70
        let low = est.raw_estimate(&a, &square(50_000.0, 250.0, 60)).unwrap();
        assert!(close(low, 70.0));
    }

    #[test]
    fn too_few_samples() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        let a = square(50_000.0, 500.0, 60);
        let b = square(40_000.0, 800.0, 39);
        assert!(matches!(
            est.try_estimate(&a, &b),
            Err(VitalsError::InsufficientData { have: 39, need: 40 })
        ));
        assert_eq!(est.last(), None);
    }

    #[test]
    fn poor_contact_is_rejected() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        let err = est.try_estimate(&square(50_000.0, 500.0, 60), &square(3_000.0, 80.0, 60));
        assert!(matches!(err, Err(VitalsError::SignalQuality(SignalRejection::PoorContact { .. }))));
    }

    #[test]
    fn constant_channel_has_no_ac() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        let err = est.try_estimate(&[50_000.0; 60], &square(40_000.0, 800.0, 60));
        assert!(matches!(
            err,
            Err(VitalsError::SignalQuality(SignalRejection::NoPulsatileComponent))
        ));
    }

    #[test]
    fn both_ratios_below_noise_floor() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        let err = est.try_estimate(&square(50_000.0, 20.0, 60), &square(40_000.0, 20.0, 60));
        assert!(matches!(err, Err(VitalsError::SignalQuality(SignalRejection::BelowNoiseFloor))));
    }

    #[test]
    fn implausible_ratio_is_rejected() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        // R = 0.1
        let err = est.try_estimate(&square(50_000.0, 100.0, 60), &square(50_000.0, 1_000.0, 60));
        assert!(matches!(
            err,
            Err(VitalsError::SignalQuality(SignalRejection::RatioOutOfRange(_)))
        ));
    }

    #[test]
    fn rejection_keeps_previous_estimate() {
        let mut est = Spo2Estimator::new(Spo2Config::default());
        let a = square(50_000.0, 500.0, 60);
        let first = est.estimate(&a, &square(40_000.0, 800.0, 60)).unwrap();
        assert!(est.estimate(&a, &[40_000.0; 60]).is_none());
        assert_eq!(est.last(), Some(first));
    }

    #[test]
    fn uses_only_most_recent_samples() {
        let est = Spo2Estimator::new(Spo2Config::default());
        // Older half has a huge swing that would dominate peak-to-peak.
        let mut a = square(50_000.0, 10_000.0, 100);
        a.extend(square(50_000.0, 500.0, 100));
        let b = square(40_000.0, 800.0, 200);
        let raw = est.raw_estimate(&a, &b).unwrap();
        assert!(close(raw, 97.5), "{raw}");
    }
}
