use embedded_hal::digital::v2::OutputPin;

use crate::bus::Overrun;

use super::{DmaSink, DmaSource, SpiDma, SspDma};

impl<SSP, CS> SpiDma<SSP, CS>
where
    SSP: SspDma,
    CS: OutputPin,
{
    pub(super) fn dma_transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Overrun> {
        let transfer_count = write.len().max(read.len());
        let mut actual_read_count = transfer_count;
        let read_increment = read.len() > 1;
        let write_increment = write.len() > 1;
        let mut dummy_read = 0u8;

        // The source buffer is mandatory; a single element repeats for every
        // beat.
        debug_assert!(!write.is_empty());

        if read.len() == transfer_count {
            // Complete read buffer: pre-fetch pending discards so they don't
            // end up in the destination.
            self.complete_discarded_reads();
        } else if self.reads_to_discard > 0 {
            // Discards just keep landing in the same byte, so skip the busy
            // wait and fold them into the DMA receive count.
            debug_assert!(!read_increment);
            actual_read_count += self.reads_to_discard;
            self.reads_to_discard = 0;
        }
        self.byte_count += transfer_count as u32;

        // The FIFO must not have overflowed before we even start.
        debug_assert!(!self.ssp.rx_overrun());

        let sink = if read.is_empty() {
            DmaSink { address: &mut dummy_read, count: actual_read_count, increment: false }
        } else {
            DmaSink { address: read.as_mut_ptr(), count: actual_read_count, increment: read_increment }
        };
        let source =
            DmaSource { address: write.as_ptr(), count: transfer_count, increment: write_increment };
        self.ssp.start_transfer(source, sink);

        while !self.ssp.tx_complete() {}

        // Wait for the receive side, ending early on FIFO overflow. Polling
        // the status register competes with the DMA for the peripheral bus,
        // so only look every 16 iterations.
        let mut result = Ok(());
        let mut iteration = 0u32;
        while !self.ssp.rx_complete() {
            iteration += 1;
            if iteration & (16 - 1) == 0 && self.ssp.rx_overrun() {
                self.ssp.abort_receive();
                self.wait_for_completion();
                while self.ssp.is_readable() {
                    self.ssp.read_data();
                }
                self.ssp.clear_rx_overrun();
                result = Err(Overrun);
                break;
            }
        }
        self.ssp.stop_transfer();

        result
    }
}
