// VitalGuard - Register Bus
//
// Register-level access to the I2C devices. The firmware owns a single bus
// and hands it to exactly one driver, so no locking is involved.

use std::thread;
use std::time::Duration;

use crate::config::{I2C_ADDR_TCA9548A, MUX_CHANNEL_COUNT};
use crate::error::BusError;

/// Synchronous register reads and writes on a shared bus.
pub trait RegisterBus {
    /// Read `buf.len()` bytes starting at `reg`.
    fn read_registers(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError>;

    /// Write one register.
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError>;

    /// Raw write without a register pointer (used by the multiplexer).
    fn write_bytes(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError>;

    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        self.read_registers(addr, reg, &mut buf)?;
        Ok(buf[0])
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read_registers(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        (**self).read_registers(addr, reg, buf)
    }

    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        (**self).write_register(addr, reg, value)
    }

    fn write_bytes(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        (**self).write_bytes(addr, bytes)
    }
}

// ---------------------------------------------------------------------------
// TCA9548A multiplexer
// ---------------------------------------------------------------------------

/// A bus view that routes every transaction through one TCA9548A channel.
///
/// The channel is selected lazily before the first transaction and again
/// after any failure, since the switch state is unknown after a bus error.
pub struct MuxedBus<B> {
    inner: B,
    channel: u8,
    settle: Duration,
    selected: bool,
}

impl<B: RegisterBus> MuxedBus<B> {
    pub fn new(inner: B, channel: u8, settle: Duration) -> Result<Self, BusError> {
        if channel >= MUX_CHANNEL_COUNT {
            return Err(BusError::new(I2C_ADDR_TCA9548A, channel, "mux channel out of range"));
        }
        Ok(Self { inner, channel, settle, selected: false })
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    fn select(&mut self) -> Result<(), BusError> {
        if self.selected {
            return Ok(());
        }
        self.inner.write_bytes(I2C_ADDR_TCA9548A, &[1 << self.channel])?;
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        self.selected = true;
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T, BusError>) -> Result<T, BusError> {
        if result.is_err() {
            self.selected = false;
        }
        result
    }
}

impl<B: RegisterBus> RegisterBus for MuxedBus<B> {
    fn read_registers(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.select()?;
        let result = self.inner.read_registers(addr, reg, buf);
        self.track(result)
    }

    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        self.select()?;
        let result = self.inner.write_register(addr, reg, value);
        self.track(result)
    }

    fn write_bytes(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.select()?;
        let result = self.inner.write_bytes(addr, bytes);
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every transaction; fails reads while `fail_reads` is set.
    #[derive(Default)]
    struct RecordingBus {
        log: Vec<(u8, Vec<u8>)>,
        fail_reads: bool,
    }

    impl RegisterBus for RecordingBus {
        fn read_registers(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
            if self.fail_reads {
                return Err(BusError::new(addr, reg, "nack"));
            }
            self.log.push((addr, vec![reg]));
            buf.fill(0xAB);
            Ok(())
        }

        fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
            self.log.push((addr, vec![reg, value]));
            Ok(())
        }

        fn write_bytes(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
            self.log.push((addr, bytes.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn selects_channel_once() {
        let mut bus = MuxedBus::new(RecordingBus::default(), 2, Duration::ZERO).unwrap();
        bus.write_register(0x57, 0x09, 0x03).unwrap();
        assert_eq!(bus.read_register(0x57, 0xFF).unwrap(), 0xAB);

        let log = &bus.inner_mut().log;
        assert_eq!(log[0], (I2C_ADDR_TCA9548A, vec![0b100]));
        assert_eq!(log[1], (0x57, vec![0x09, 0x03]));
        assert_eq!(log[2], (0x57, vec![0xFF]));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn reselects_after_failure() {
        let mut bus = MuxedBus::new(RecordingBus::default(), 0, Duration::ZERO).unwrap();
        bus.write_register(0x57, 0x08, 0x5F).unwrap();
        bus.inner_mut().fail_reads = true;
        assert!(bus.read_register(0x57, 0x00).is_err());
        bus.inner_mut().fail_reads = false;
        bus.read_register(0x57, 0x00).unwrap();

        let selects = bus
            .inner_mut()
            .log
            .iter()
            .filter(|(addr, _)| *addr == I2C_ADDR_TCA9548A)
            .count();
        assert_eq!(selects, 2);
    }

    #[test]
    fn rejects_out_of_range_channel() {
        assert!(MuxedBus::new(RecordingBus::default(), 8, Duration::ZERO).is_err());
    }
}
