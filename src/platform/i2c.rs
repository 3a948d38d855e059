// VitalGuard - ESP-IDF I2C Bus

use esp_idf_hal::i2c::I2cDriver;

use crate::bus::RegisterBus;
use crate::config::I2C_TIMEOUT_TICKS;
use crate::error::BusError;

/// The hardware I2C controller, owned by the vitals task.
pub struct EspI2cBus {
    driver: I2cDriver<'static>,
}

impl EspI2cBus {
    pub fn new(driver: I2cDriver<'static>) -> Self {
        Self { driver }
    }
}

impl RegisterBus for EspI2cBus {
    fn read_registers(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.driver
            .write_read(addr, &[reg], buf, I2C_TIMEOUT_TICKS)
            .map_err(|e| BusError::new(addr, reg, e.to_string()))
    }

    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        self.driver
            .write(addr, &[reg, value], I2C_TIMEOUT_TICKS)
            .map_err(|e| BusError::new(addr, reg, e.to_string()))
    }

    fn write_bytes(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        let first = bytes.first().copied().unwrap_or_default();
        self.driver
            .write(addr, bytes, I2C_TIMEOUT_TICKS)
            .map_err(|e| BusError::new(addr, first, e.to_string()))
    }
}
