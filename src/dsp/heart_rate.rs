// VitalGuard - Heart Rate Estimator
//
// Heart rate from the infrared PPG window: DC removal, a short moving
// average, then threshold peak picking with a refractory distance. The rate
// is the inverse of the mean inter-peak interval.

use crate::config::HeartRateConfig;
use crate::error::{SignalRejection, VitalsError};

const MIN_PEAKS: usize = 2;
// Absorbs f32 error such as 0.3 * 10.0 = 3.0000001 before rounding up.
const SAMPLE_COUNT_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    config: HeartRateConfig,
    rate_hz: f32,
    /// Only the most recent window's worth of samples is analysed.
    max_samples: usize,
}

impl HeartRateEstimator {
    /// `rate_hz` is the decimated rate; `window_seconds` bounds the analysis span.
    pub fn new(config: HeartRateConfig, rate_hz: f32, window_seconds: u32) -> Self {
        let max_samples = (rate_hz * window_seconds as f32).round() as usize;
        Self { config, rate_hz, max_samples }
    }

    /// Samples required before any estimate is attempted.
    pub fn min_samples(&self) -> usize {
        samples_at_least(self.config.min_window_seconds, self.rate_hz).max(self.config.smoothing_width)
    }

    /// Minimum index gap between accepted peaks.
    pub fn refractory_samples(&self) -> usize {
        samples_at_least(self.config.refractory_seconds, self.rate_hz).max(1)
    }

    /// Beats per minute, or `None` when the window cannot support an estimate.
    pub fn estimate(&self, window: &[f32]) -> Option<f32> {
        match self.try_estimate(window) {
            Ok(bpm) => Some(bpm),
            Err(e) => {
                log::debug!("heart rate unavailable: {}", e);
                None
            }
        }
    }

    pub fn try_estimate(&self, window: &[f32]) -> Result<f32, VitalsError> {
        let need = self.min_samples();
        if window.len() < need {
            return Err(VitalsError::InsufficientData { have: window.len(), need });
        }
        let start = window.len().saturating_sub(self.max_samples);
        let recent = &window[start..];

        let smoothed = moving_average(&remove_dc(recent), self.config.smoothing_width);

        let max = smoothed.iter().copied().fold(f32::MIN, f32::max);
        if max <= 0.0 {
            return Err(VitalsError::SignalQuality(SignalRejection::NoPulsatileComponent));
        }
        let threshold = self.config.threshold_fraction * max;
        let peaks = find_peaks(&smoothed, threshold, self.refractory_samples());
        if peaks.len() < MIN_PEAKS {
            return Err(VitalsError::SignalQuality(SignalRejection::TooFewPeaks(peaks.len())));
        }

        let intervals: Vec<f32> = peaks
            .windows(2)
            .map(|pair| (pair[1] as f32 - pair[0] as f32) / self.rate_hz)
            .filter(|secs| *secs > 0.0)
            .collect();
        if intervals.is_empty() {
            return Err(VitalsError::SignalQuality(SignalRejection::TooFewPeaks(peaks.len())));
        }

        let mean_interval = intervals.iter().sum::<f32>() / intervals.len() as f32;
        Ok(60.0 / mean_interval)
    }
}

/// Whole samples covering at least `seconds` at `rate_hz`.
fn samples_at_least(seconds: f32, rate_hz: f32) -> usize {
    (seconds * rate_hz - SAMPLE_COUNT_TOLERANCE).ceil().max(0.0) as usize
}

fn remove_dc(signal: &[f32]) -> Vec<f32> {
    let mean = signal.iter().sum::<f32>() / signal.len() as f32;
    signal.iter().map(|v| v - mean).collect()
}

/// Trailing moving average, same length as the input. The first
/// `width - 1` slots repeat the first full average.
fn moving_average(signal: &[f32], width: usize) -> Vec<f32> {
    if signal.len() < width || width == 0 {
        return signal.to_vec();
    }
    let mut out = vec![0.0; signal.len()];
    let mut sum: f32 = signal[..width].iter().sum();
    out[width - 1] = sum / width as f32;
    for i in width..signal.len() {
        sum += signal[i] - signal[i - width];
        out[i] = sum / width as f32;
    }
    let first = out[width - 1];
    out[..width - 1].fill(first);
    out
}

/// Strict local maxima above `threshold`, at least `refractory` samples apart.
fn find_peaks(signal: &[f32], threshold: f32, refractory: usize) -> Vec<usize> {
    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..signal.len().saturating_sub(1) {
        let v = signal[i];
        if v <= threshold || v <= signal[i - 1] || v <= signal[i + 1] {
            continue;
        }
        if peaks.last().map_or(true, |&last| i - last >= refractory) {
            peaks.push(i);
        }
    }
    peaks
}
