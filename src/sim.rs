// VitalGuard - Synthetic MAX30102
//
// A register-accurate stand-in for the PPG sensor used by the host simulator
// and the tests. It produces a sinusoidal pulse on a realistic DC baseline
// through the same FIFO pointer protocol as the real part.

use std::collections::VecDeque;
use std::f32::consts::PI;

use crate::bus::RegisterBus;
use crate::config::{I2C_ADDR_MAX30102, I2C_ADDR_TCA9548A};
use crate::drivers::max30102::{
    PART_ID_EXPECTED, REG_FIFO_DATA, REG_FIFO_RD_PTR, REG_FIFO_WR_PTR, REG_MODE_CONFIG,
    REG_OVF_COUNTER, REG_PART_ID,
};
use crate::error::{BusError, VitalsError};
use crate::events::FIFO_RECORD_LEN;
use crate::uplink::Transport;

const FIFO_DEPTH: usize = 32;
const MODE_RESET_BIT: u8 = 0x40;

/// DC level and pulse amplitude of one LED channel, in raw ADC counts.
#[derive(Debug, Clone, Copy)]
pub struct ChannelShape {
    pub dc: f32,
    pub amplitude: f32,
}

pub struct SyntheticPpg {
    registers: [u8; 256],
    fifo: VecDeque<[u8; FIFO_RECORD_LEN]>,
    written: u64,
    consumed: u64,
    overflow: u8,
    generated: u64,
    rate_hz: u32,
    bpm: f32,
    ir: ChannelShape,
    red: ChannelShape,
    failures_pending: usize,
}

impl SyntheticPpg {
    /// A finger on the sensor with a steady pulse at `bpm`, sampled at `rate_hz`.
    pub fn new(bpm: f32, rate_hz: u32) -> Self {
        let mut registers = [0u8; 256];
        registers[REG_PART_ID as usize] = PART_ID_EXPECTED;
        Self {
            registers,
            fifo: VecDeque::with_capacity(FIFO_DEPTH),
            written: 0,
            consumed: 0,
            overflow: 0,
            generated: 0,
            rate_hz,
            bpm,
            // Perfusion ratios chosen for an R of about 0.5 (SpO2 near 97 %).
            ir: ChannelShape { dc: 50_000.0, amplitude: 260.0 },
            red: ChannelShape { dc: 48_000.0, amplitude: 500.0 },
            failures_pending: 0,
        }
    }

    pub fn set_part_id(&mut self, id: u8) {
        self.registers[REG_PART_ID as usize] = id;
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm;
    }

    pub fn set_channels(&mut self, ir: ChannelShape, red: ChannelShape) {
        self.ir = ir;
        self.red = red;
    }

    /// Make the next `n` bus transactions fail.
    pub fn fail_next(&mut self, n: usize) {
        self.failures_pending = n;
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.registers[reg as usize]
    }

    /// Push `n` new samples into the FIFO, continuing the waveform.
    pub fn produce(&mut self, n: usize) {
        for _ in 0..n {
            let t = self.generated as f32 / self.rate_hz as f32;
            let phase = (2.0 * PI * self.bpm / 60.0 * t).sin();
            let ir = (self.ir.dc + self.ir.amplitude * phase).max(0.0) as u32;
            let red = (self.red.dc + self.red.amplitude * phase).max(0.0) as u32;
            self.generated += 1;
            self.push_record(encode(ir, red));
        }
    }

    /// Push `n` all-zero records (LEDs saturated or nothing reflected).
    pub fn produce_blank(&mut self, n: usize) {
        for _ in 0..n {
            self.generated += 1;
            self.push_record([0; FIFO_RECORD_LEN]);
        }
    }

    /// Produce every sample the sensor would have emitted by `now_ms`.
    pub fn produce_until(&mut self, now_ms: u64) {
        let due = now_ms * self.rate_hz as u64 / 1000;
        if due > self.generated {
            self.produce((due - self.generated) as usize);
        }
    }

    fn push_record(&mut self, record: [u8; FIFO_RECORD_LEN]) {
        if self.fifo.len() == FIFO_DEPTH {
            // Rollover: the oldest record is overwritten.
            self.fifo.pop_front();
            self.consumed += 1;
            self.overflow = self.overflow.saturating_add(1).min(0x1F);
        }
        self.fifo.push_back(record);
        self.written += 1;
    }

    fn clear_fifo(&mut self) {
        self.fifo.clear();
        self.written = 0;
        self.consumed = 0;
        self.overflow = 0;
    }

    fn check(&mut self, addr: u8, reg: u8) -> Result<(), BusError> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(BusError::new(addr, reg, "injected failure"));
        }
        if addr != I2C_ADDR_MAX30102 && addr != I2C_ADDR_TCA9548A {
            return Err(BusError::new(addr, reg, "no ack"));
        }
        Ok(())
    }
}

impl RegisterBus for SyntheticPpg {
    fn read_registers(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.check(addr, reg)?;
        match reg {
            REG_FIFO_DATA => {
                for chunk in buf.chunks_mut(FIFO_RECORD_LEN) {
                    // An empty FIFO reads back zeros without moving the pointer.
                    let record = match self.fifo.pop_front() {
                        Some(record) => {
                            self.consumed += 1;
                            self.overflow = 0;
                            record
                        }
                        None => [0; FIFO_RECORD_LEN],
                    };
                    let n = chunk.len();
                    chunk.copy_from_slice(&record[..n]);
                }
            }
            REG_FIFO_WR_PTR => buf.fill((self.written % FIFO_DEPTH as u64) as u8),
            REG_FIFO_RD_PTR => buf.fill((self.consumed % FIFO_DEPTH as u64) as u8),
            REG_OVF_COUNTER => buf.fill(self.overflow),
            _ => buf.fill(self.registers[reg as usize]),
        }
        Ok(())
    }

    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        self.check(addr, reg)?;
        match reg {
            REG_MODE_CONFIG if value & MODE_RESET_BIT != 0 => {
                let part_id = self.registers[REG_PART_ID as usize];
                self.registers = [0; 256];
                self.registers[REG_PART_ID as usize] = part_id;
                self.clear_fifo();
            }
            REG_FIFO_WR_PTR | REG_FIFO_RD_PTR | REG_OVF_COUNTER => self.clear_fifo(),
            _ => self.registers[reg as usize] = value,
        }
        Ok(())
    }

    fn write_bytes(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.check(addr, bytes.first().copied().unwrap_or_default())
    }
}

/// Stands in for the collector on the host: logs each batch and answers 201.
#[derive(Debug, Default)]
pub struct LogTransport {
    pub batches: usize,
    pub bytes: usize,
}

impl Transport for LogTransport {
    fn post_json(&mut self, body: &str) -> Result<u16, VitalsError> {
        self.batches += 1;
        self.bytes += body.len();
        log::info!("POST batch #{} ({} bytes)", self.batches, body.len());
        log::debug!("{}", body);
        Ok(201)
    }
}

fn encode(a: u32, b: u32) -> [u8; FIFO_RECORD_LEN] {
    let a = a.min(0x03_FFFF).to_be_bytes();
    let b = b.min(0x03_FFFF).to_be_bytes();
    [a[1], a[2], a[3], b[1], b[2], b[3]]
}
