// ─────────────────────────────────────────────────────────────────────────────
// Register-level view of the sensor bus.
//
// The BME280 is addressed as "7-bit device address + 8-bit register offset";
// everything above this file speaks in those terms, so the driver works with any
// `embedded-hal 1.0` I²C controller (esp-hal on target, mocks on the host).

use embedded_hal::i2c::{Error as _, I2c};

use crate::error::BusFault;

/// Request/response register channel the sensor driver talks through.
pub trait RegisterBus {
    /// Reads `buf.len()` consecutive registers starting at `register`.
    fn read_bytes(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusFault>;

    /// Writes one register.
    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusFault>;

    fn read_byte(&mut self, address: u8, register: u8) -> Result<u8, BusFault> {
        let mut buf = [0u8; 1];
        self.read_bytes(address, register, &mut buf)?;
        Ok(buf[0])
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read_bytes(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        (**self).read_bytes(address, register, buf)
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusFault> {
        (**self).write_byte(address, register, value)
    }
}

/// Adapts a blocking I²C controller to [`RegisterBus`].
pub struct I2cBus<I> {
    inner: I,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    pub fn release(self) -> I {
        self.inner
    }
}

impl<I: I2c> RegisterBus for I2cBus<I> {
    fn read_bytes(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        self.inner
            .write_read(address, &[register], buf)
            .map_err(|e| BusFault::from(e.kind()))
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusFault> {
        self.inner
            .write(address, &[register, value])
            .map_err(|e| BusFault::from(e.kind()))
    }
}
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn reads_are_register_addressed() {
        let expectations = [Transaction::write_read(0x77, vec![0xD0], vec![0x60])];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        assert_eq!(bus.read_byte(0x77, 0xD0), Ok(0x60));
        bus.release().done();
    }

    #[test]
    fn writes_carry_register_and_value() {
        let expectations = [Transaction::write(0x77, vec![0xE0, 0xB6])];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        assert_eq!(bus.write_byte(0x77, 0xE0, 0xB6), Ok(()));
        bus.release().done();
    }

    #[test]
    fn controller_errors_become_bus_faults() {
        let expectations =
            [Transaction::write_read(0x77, vec![0xF7], vec![0; 8]).with_error(ErrorKind::Overrun)];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        let mut buf = [0u8; 8];
        assert_eq!(bus.read_bytes(0x77, 0xF7, &mut buf), Err(BusFault::Overrun));
        bus.release().done();
    }
}
