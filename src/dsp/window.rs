// VitalGuard - Decimating Window Manager
//
// Raw FIFO samples arrive at the native rate (100 sps) and are reduced to
// the processing rate by keeping one of every `downsample_factor` samples.
// This is plain counting with no anti-aliasing filter.

use crate::config::SamplingConfig;
use crate::events::RawSamplePair;

/// Two time-aligned channel windows with drop-oldest eviction.
///
/// Both channels are always the same length and index `i` in one refers to
/// the same instant as index `i` in the other.
#[derive(Debug, Clone)]
pub struct WindowManager {
    a: Vec<f32>,
    b: Vec<f32>,
    capacity: usize,
    factor: u32,
    counter: u32,
    latest: RawSamplePair,
}

impl WindowManager {
    pub fn new(sampling: &SamplingConfig) -> Self {
        let capacity = sampling.window_capacity().max(1);
        Self {
            a: Vec::with_capacity(capacity + 1),
            b: Vec::with_capacity(capacity + 1),
            capacity,
            factor: sampling.downsample_factor.max(1),
            counter: 0,
            latest: RawSamplePair::default(),
        }
    }

    /// Feed one raw sample; returns `true` if it was kept in the windows.
    pub fn push(&mut self, pair: RawSamplePair) -> bool {
        self.latest = pair;
        self.counter += 1;
        if self.counter < self.factor {
            return false;
        }
        self.counter = 0;

        self.a.push(pair.a as f32);
        self.b.push(pair.b as f32);
        if self.a.len() > self.capacity {
            let excess = self.a.len() - self.capacity;
            self.a.drain(..excess);
            self.b.drain(..excess);
        }
        true
    }

    /// Feed a batch of raw samples; returns how many were kept.
    pub fn extend<I: IntoIterator<Item = RawSamplePair>>(&mut self, samples: I) -> usize {
        samples.into_iter().filter(|pair| self.push(*pair)).count()
    }

    pub fn channel_a(&self) -> &[f32] {
        &self.a
    }

    pub fn channel_b(&self) -> &[f32] {
        &self.b
    }

    /// Most recent raw sample seen, decimated away or not.
    pub fn latest(&self) -> RawSamplePair {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(factor: u32, window_seconds: u32) -> WindowManager {
        WindowManager::new(&SamplingConfig {
            downsample_factor: factor,
            window_seconds,
            ..SamplingConfig::default()
        })
    }

    fn ramp(n: u32) -> impl Iterator<Item = RawSamplePair> {
        (1..=n).map(|i| RawSamplePair::new(i, i + 1000))
    }

    #[test]
    fn keeps_floor_n_over_d() {
        for (n, d) in [(0, 10), (9, 10), (10, 10), (57, 10), (100, 7), (33, 1)] {
            let mut w = manager(d, 1000);
            assert_eq!(w.extend(ramp(n)), (n / d) as usize, "n={n} d={d}");
            assert_eq!(w.len(), (n / d) as usize);
        }
    }

    #[test]
    fn retains_every_dth_sample() {
        let mut w = manager(10, 10);
        w.extend(ramp(35));
        assert_eq!(w.channel_a(), &[10.0, 20.0, 30.0]);
        assert_eq!(w.channel_b(), &[1010.0, 1020.0, 1030.0]);
        assert_eq!(w.latest(), RawSamplePair::new(35, 1035));
    }

    #[test]
    fn never_exceeds_capacity() {
        // 10 Hz effective, 2 s window.
        let mut w = manager(10, 2);
        assert_eq!(w.capacity(), 20);
        for chunk in 0..50 {
            w.extend(ramp(37).map(|p| RawSamplePair::new(p.a + chunk * 37, p.b)));
            assert!(w.len() <= w.capacity());
            assert_eq!(w.channel_a().len(), w.channel_b().len());
        }
        assert_eq!(w.len(), 20);
    }

    #[test]
    fn eviction_drops_oldest_from_both_channels() {
        let mut w = manager(1, 1);
        w = WindowManager { capacity: 3, ..w };
        w.extend(ramp(5));
        assert_eq!(w.channel_a(), &[3.0, 4.0, 5.0]);
        assert_eq!(w.channel_b(), &[1003.0, 1004.0, 1005.0]);
    }
}
