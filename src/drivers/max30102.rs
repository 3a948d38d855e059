// VitalGuard - MAX30102 PPG Driver
//
// Register-level driver for the pulse oximeter. Runs the sensor in SpO2 mode
// (red + IR LEDs) and drains its 32-entry sample FIFO on every poll.

use std::thread;
use std::time::Duration;

use crate::bus::RegisterBus;
use crate::config::{SamplingConfig, I2C_ADDR_MAX30102, MAX30102_FIFO_SLOTS};
use crate::error::{BusError, VitalsError};
use crate::events::{RawSamplePair, FIFO_RECORD_LEN};

// MAX30102 register addresses
pub const REG_INT_STATUS_1: u8 = 0x00;
pub const REG_FIFO_WR_PTR: u8 = 0x04;
pub const REG_OVF_COUNTER: u8 = 0x05;
pub const REG_FIFO_RD_PTR: u8 = 0x06;
pub const REG_FIFO_DATA: u8 = 0x07;
pub const REG_FIFO_CONFIG: u8 = 0x08;
pub const REG_MODE_CONFIG: u8 = 0x09;
pub const REG_SPO2_CONFIG: u8 = 0x0A;
pub const REG_LED1_PA: u8 = 0x0C; // red
pub const REG_LED2_PA: u8 = 0x0D; // IR
pub const REG_PART_ID: u8 = 0xFF;
pub const PART_ID_EXPECTED: u8 = 0x15;

const MODE_RESET: u8 = 0x40;
const MODE_SPO2: u8 = 0x03;
const FIFO_AVG4_ROLLOVER: u8 = 0x5F; // 4-sample averaging, rollover, almost-full at 15 free
const SPO2_4096NA_100SPS_411US: u8 = 0x27; // 18-bit resolution
const LED_AMPLITUDE: u8 = 0x24; // ~7 mA
const FIFO_PTR_MASK: u8 = 0x1F;

pub struct Max30102<B> {
    bus: B,
    fifo_depth: u8,
    reset_settle: Duration,
}

impl<B: RegisterBus> Max30102<B> {
    pub fn new(bus: B, sampling: &SamplingConfig) -> Self {
        Self {
            bus,
            fifo_depth: sampling.fifo_depth,
            reset_settle: Duration::from_millis(sampling.reset_settle_ms),
        }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn part_id(&mut self) -> Result<u8, BusError> {
        self.bus.read_register(I2C_ADDR_MAX30102, REG_PART_ID)
    }

    /// Verify the part id, reset, and configure SpO2 mode at 100 sps.
    ///
    /// A part id mismatch is fatal; nothing downstream can be trusted
    /// without a verified device.
    pub fn init(&mut self) -> Result<(), VitalsError> {
        let found = self.part_id()?;
        if found != PART_ID_EXPECTED {
            return Err(VitalsError::DeviceIdentity { expected: PART_ID_EXPECTED, found });
        }

        self.write(REG_MODE_CONFIG, MODE_RESET)?;
        if !self.reset_settle.is_zero() {
            thread::sleep(self.reset_settle);
        }

        self.write(REG_FIFO_CONFIG, FIFO_AVG4_ROLLOVER)?;
        self.write(REG_MODE_CONFIG, MODE_SPO2)?;
        self.write(REG_SPO2_CONFIG, SPO2_4096NA_100SPS_411US)?;
        self.write(REG_LED1_PA, LED_AMPLITUDE)?;
        self.write(REG_LED2_PA, LED_AMPLITUDE)?;

        // Start from an empty FIFO.
        self.write(REG_FIFO_WR_PTR, 0)?;
        self.write(REG_OVF_COUNTER, 0)?;
        self.write(REG_FIFO_RD_PTR, 0)?;

        log::info!("MAX30102 initialised (part 0x{:02x}, SpO2 mode, 100 sps)", found);
        Ok(())
    }

    /// Drain every pending FIFO record.
    ///
    /// Blank records are dropped here and never reach decimation. A bus
    /// failure anywhere in the drain yields no samples for this poll.
    pub fn read_fifo(&mut self) -> Vec<RawSamplePair> {
        match self.try_read_fifo() {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!("FIFO read failed: {}", e);
                Vec::new()
            }
        }
    }

    fn try_read_fifo(&mut self) -> Result<Vec<RawSamplePair>, BusError> {
        // Reading the status register clears pending interrupts.
        self.bus.read_register(I2C_ADDR_MAX30102, REG_INT_STATUS_1)?;

        let pending = self.pending_samples()?;
        let mut samples = Vec::with_capacity(pending);
        let mut record = [0u8; FIFO_RECORD_LEN];
        for _ in 0..pending {
            self.bus.read_registers(I2C_ADDR_MAX30102, REG_FIFO_DATA, &mut record)?;
            let pair = RawSamplePair::decode(&record);
            if !pair.is_blank() {
                samples.push(pair);
            }
        }
        Ok(samples)
    }

    /// Records between the read and write pointers, capped at `fifo_depth`
    /// per poll. Anything beyond the cap is left for the next poll.
    fn pending_samples(&mut self) -> Result<usize, BusError> {
        let slots = MAX30102_FIFO_SLOTS as usize;
        let rd = (self.bus.read_register(I2C_ADDR_MAX30102, REG_FIFO_RD_PTR)? & FIFO_PTR_MASK) as usize;
        let wr = (self.bus.read_register(I2C_ADDR_MAX30102, REG_FIFO_WR_PTR)? & FIFO_PTR_MASK) as usize;

        let mut pending = (wr + slots - rd) % slots;
        if pending == 0 {
            // Equal pointers mean empty, unless the FIFO wrapped while full.
            let overflow = self.bus.read_register(I2C_ADDR_MAX30102, REG_OVF_COUNTER)?;
            if overflow > 0 {
                log::warn!("FIFO overflow, {} samples lost", overflow);
                pending = slots;
            }
        }
        Ok(pending.min(self.fifo_depth as usize))
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.bus.write_register(I2C_ADDR_MAX30102, reg, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SyntheticPpg;

    fn sampling() -> SamplingConfig {
        SamplingConfig { reset_settle_ms: 0, mux_settle_ms: 0, ..SamplingConfig::default() }
    }

    fn sensor() -> Max30102<SyntheticPpg> {
        let mut sensor = Max30102::new(SyntheticPpg::new(72.0, 100), &sampling());
        sensor.init().unwrap();
        sensor
    }

    #[test]
    fn init_configures_spo2_mode() {
        let mut sensor = sensor();
        let bus = sensor.bus_mut();
        assert_eq!(bus.register(REG_MODE_CONFIG), MODE_SPO2);
        assert_eq!(bus.register(REG_FIFO_CONFIG), FIFO_AVG4_ROLLOVER);
        assert_eq!(bus.register(REG_SPO2_CONFIG), SPO2_4096NA_100SPS_411US);
        assert_eq!(bus.register(REG_LED1_PA), LED_AMPLITUDE);
        assert_eq!(bus.register(REG_LED2_PA), LED_AMPLITUDE);
    }

    #[test]
    fn wrong_part_id_is_fatal() {
        let mut bus = SyntheticPpg::new(72.0, 100);
        bus.set_part_id(0x11);
        let mut sensor = Max30102::new(bus, &sampling());
        let err = sensor.init().unwrap_err();
        assert_eq!(err, VitalsError::DeviceIdentity { expected: 0x15, found: 0x11 });
        assert!(err.is_fatal());
    }

    #[test]
    fn drains_pending_samples() {
        let mut sensor = sensor();
        sensor.bus_mut().produce(12);
        assert_eq!(sensor.read_fifo().len(), 12);
        assert!(sensor.read_fifo().is_empty());
    }

    #[test]
    fn pointer_wraparound() {
        let mut sensor = sensor();
        sensor.bus_mut().produce(25);
        assert_eq!(sensor.read_fifo().len(), 25);
        // Write pointer wraps past 31 back to a value below the read pointer.
        sensor.bus_mut().produce(20);
        assert_eq!(sensor.read_fifo().len(), 20);
    }

    #[test]
    fn full_fifo_is_capped_at_depth() {
        let mut sensor = sensor();
        sensor.bus_mut().produce(40);
        assert_eq!(sensor.read_fifo().len(), 32);
    }

    #[test]
    fn short_drain_depth_leaves_the_rest_for_later() {
        let sampling = SamplingConfig { fifo_depth: 16, ..sampling() };
        let mut sensor = Max30102::new(SyntheticPpg::new(72.0, 100), &sampling);
        sensor.init().unwrap();
        sensor.bus_mut().produce(20);
        assert_eq!(sensor.read_fifo().len(), 16);
        assert_eq!(sensor.read_fifo().len(), 4);
        assert!(sensor.read_fifo().is_empty());

        // A wrapped, full FIFO is also drained in capped steps.
        sensor.bus_mut().produce(40);
        assert_eq!(sensor.read_fifo().len(), 16);
        assert_eq!(sensor.read_fifo().len(), 16);
        assert!(sensor.read_fifo().is_empty());
    }

    #[test]
    fn blank_records_are_discarded() {
        let mut sensor = sensor();
        sensor.bus_mut().produce(4);
        sensor.bus_mut().produce_blank(3);
        sensor.bus_mut().produce(2);
        assert_eq!(sensor.read_fifo().len(), 6);
    }

    #[test]
    fn bus_failure_yields_no_samples() {
        let mut sensor = sensor();
        sensor.bus_mut().produce(10);
        sensor.bus_mut().fail_next(1);
        assert!(sensor.read_fifo().is_empty());
    }
}
