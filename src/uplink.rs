// VitalGuard - Uplink Batch Buffer
//
// Accumulates data points and ships them to the collector in batches. Memory
// is bounded by `max_buffer_points`; under a sustained outage the oldest
// points are dropped. The buffer is only cleared once the collector confirms
// a batch.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::UplinkConfig;
use crate::error::VitalsError;
use crate::events::VitalsDataPoint;

/// Delivery of one encoded batch to the collector.
pub trait Transport {
    /// POST a JSON body and return the HTTP status. Transport failures and
    /// timeouts are reported as `VitalsError::Network`.
    fn post_json(&mut self, body: &str) -> Result<u16, VitalsError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn post_json(&mut self, body: &str) -> Result<u16, VitalsError> {
        (**self).post_json(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchInfo {
    pub start_cycle: u32,
    pub end_cycle: u32,
    pub total_points: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchEnvelope<'a> {
    pub device_id: &'a str,
    pub batch_info: BatchInfo,
    pub data: &'a VecDeque<VitalsDataPoint>,
}

/// Result of a flush trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Nothing to send, or no trigger fired.
    Idle,
    Sent { points: usize, status: u16 },
    /// The send failed; the points are still buffered.
    Retained(VitalsError),
}

pub struct UplinkBuffer<T> {
    config: UplinkConfig,
    points: VecDeque<VitalsDataPoint>,
    transport: T,
    last_send_ms: u64,
    dropped: u64,
}

impl<T: Transport> UplinkBuffer<T> {
    pub fn new(config: UplinkConfig, transport: T) -> Self {
        Self {
            points: VecDeque::with_capacity(config.max_buffer_points + 1),
            config,
            transport,
            last_send_ms: 0,
            dropped: 0,
        }
    }

    /// Buffer one point, enforce the hard cap, and flush once a batch is full.
    pub fn add(&mut self, point: VitalsDataPoint, now_ms: u64) -> FlushOutcome {
        self.points.push_back(point);

        let excess = self.points.len().saturating_sub(self.config.max_buffer_points);
        if excess > 0 {
            self.points.drain(..excess);
            self.dropped += excess as u64;
            log::warn!(
                "Uplink buffer full, dropped {} oldest point(s) ({} total)",
                excess,
                self.dropped
            );
        }

        if self.points.len() >= self.config.batch_size {
            self.flush(now_ms)
        } else {
            FlushOutcome::Idle
        }
    }

    /// Flush a non-empty buffer once `flush_interval` has passed since the last success.
    pub fn flush_if_due(&mut self, now_ms: u64) -> FlushOutcome {
        let elapsed = now_ms.saturating_sub(self.last_send_ms);
        if !self.points.is_empty() && elapsed >= self.config.flush_interval_ms {
            self.flush(now_ms)
        } else {
            FlushOutcome::Idle
        }
    }

    /// Send everything buffered as one batch.
    pub fn flush(&mut self, now_ms: u64) -> FlushOutcome {
        let Some(info) = self.batch_info() else {
            return FlushOutcome::Idle;
        };

        let envelope = BatchEnvelope {
            device_id: &self.config.device_id,
            batch_info: info,
            data: &self.points,
        };
        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => return FlushOutcome::Retained(VitalsError::Network(format!("encode failed: {e}"))),
        };

        let result = match self.transport.post_json(&body) {
            Ok(status) if (200..300).contains(&status) => Ok(status),
            Ok(status) => Err(VitalsError::Network(format!("collector returned HTTP {status}"))),
            Err(e) => Err(e),
        };

        match result {
            Ok(status) => {
                log::info!(
                    "Batch sent: cycles {}-{}, {} points, HTTP {}",
                    info.start_cycle,
                    info.end_cycle,
                    info.total_points,
                    status
                );
                self.points.clear();
                self.last_send_ms = now_ms;
                FlushOutcome::Sent { points: info.total_points, status }
            }
            Err(e) => {
                log::warn!("Batch send failed ({}), keeping {} points", e, self.points.len());
                FlushOutcome::Retained(e)
            }
        }
    }

    fn batch_info(&self) -> Option<BatchInfo> {
        let first = self.points.front()?;
        let last = self.points.back()?;
        Some(BatchInfo {
            start_cycle: first.cycle,
            end_cycle: last.cycle,
            total_points: self.points.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &VitalsDataPoint> {
        self.points.iter()
    }

    /// Points discarded by the hard cap since boot.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn last_send_ms(&self) -> u64 {
        self.last_send_ms
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
