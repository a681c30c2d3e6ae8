use embedded_hal::digital::v2::OutputPin;

use crate::bus::{Overrun, SdSpi};

use super::{SpiDma, SspDma, FIFO_DEPTH};

impl<SSP, CS> SpiDma<SSP, CS>
where
    SSP: SspDma,
    CS: OutputPin,
{
    fn ssp_read(&mut self) -> u8 {
        while !self.ssp.is_readable() {}
        self.ssp.read_data()
    }

    fn ssp_write(&mut self, byte: u8) {
        while !self.ssp.is_writeable() {}
        self.ssp.write_data(byte);
    }

    fn read_discarded_non_blocking(&mut self) {
        // Keep reading discarded values until there are no more or the read
        // would block.
        while self.reads_to_discard > 0 && self.ssp.is_readable() {
            self.ssp.read_data();
            self.reads_to_discard -= 1;
        }
    }

    fn read_discarded_blocking(&mut self) {
        self.ssp_read();
        self.reads_to_discard -= 1;
    }

    pub(super) fn complete_discarded_reads(&mut self) {
        while self.reads_to_discard > 0 {
            self.read_discarded_blocking();
        }
    }

    /// Wait for everything in the transmit FIFO to leave the wire, then
    /// drain the matching receives.
    pub(super) fn wait_for_completion(&mut self) {
        while self.ssp.is_busy() {}
        self.complete_discarded_reads();
    }
}

impl<SSP, CS> SdSpi for SpiDma<SSP, CS>
where
    SSP: SspDma,
    CS: OutputPin,
{
    fn set_chip_select(&mut self, high: bool) {
        self.wait_for_completion();
        if high {
            self.cs.set_high().ok();
        } else {
            self.cs.set_low().ok();
        }
    }

    fn set_frequency(&mut self, hz: u32) {
        self.wait_for_completion();
        self.ssp.set_frequency(hz);
    }

    fn send(&mut self, byte: u8) {
        self.read_discarded_non_blocking();
        if self.reads_to_discard >= FIFO_DEPTH {
            debug_assert_eq!(self.reads_to_discard, FIFO_DEPTH);
            self.read_discarded_blocking();
        }
        self.reads_to_discard += 1;
        self.byte_count += 1;
        self.ssp_write(byte);
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        self.complete_discarded_reads();
        self.byte_count += 1;
        self.ssp_write(byte);
        self.ssp_read()
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Overrun> {
        self.dma_transfer(write, read)
    }

    fn byte_count(&self) -> u32 {
        self.byte_count
    }

    fn reset_byte_count(&mut self) {
        self.byte_count = 0;
    }
}
