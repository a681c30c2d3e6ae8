//! Fallback serial exchange over plain `embedded-hal` blocking SPI, for
//! hosts whose SPI peripheral has no DMA pairing (or no need for it).

use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;

use crate::bus::{Overrun, SdSpi};

/// Blocking implementation of the exchange contract. Every write waits for
/// its received counterpart, so there is never a pending discard.
pub struct BlockingSpi<SPI, CS> {
    spi: SPI,
    cs: CS,
    byte_count: u32,
}

impl<SPI, CS, E, OE> BlockingSpi<SPI, CS>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = OE>,
{
    /// Take ownership of a configured bus and chip select pin.
    ///
    /// `embedded-hal` 0.2 exposes no clock control, so `set_frequency` is a
    /// no-op here; configure the bus at or below 400kHz before `initialize`
    /// and reclock it afterwards if the HAL allows.
    pub fn new(spi: SPI, mut cs: CS) -> Self {
        cs.set_high().ok();
        Self { spi, cs, byte_count: 0 }
    }

    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn exchange_one(&mut self, byte: u8) -> u8 {
        let mut buf = [byte];
        match self.spi.transfer(&mut buf) {
            Ok(_) => buf[0],
            Err(_) => 0xFF,
        }
    }
}

impl<SPI, CS, E, OE> SdSpi for BlockingSpi<SPI, CS>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = OE>,
{
    fn set_chip_select(&mut self, high: bool) {
        if high {
            self.cs.set_high().ok();
        } else {
            self.cs.set_low().ok();
        }
    }

    fn set_frequency(&mut self, _hz: u32) {}

    fn send(&mut self, byte: u8) {
        self.byte_count += 1;
        self.spi.write(&[byte]).ok();
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        self.byte_count += 1;
        self.exchange_one(byte)
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Overrun> {
        let beats = write.len().max(read.len());
        self.byte_count += beats as u32;
        for beat in 0..beats {
            let out = if write.len() == 1 { write[0] } else { write[beat] };
            let received = self.exchange_one(out);
            if !read.is_empty() {
                let slot = if read.len() == 1 { 0 } else { beat };
                read[slot] = received;
            }
        }
        Ok(())
    }

    fn byte_count(&self) -> u32 {
        self.byte_count
    }

    fn reset_byte_count(&mut self) {
        self.byte_count = 0;
    }
}
