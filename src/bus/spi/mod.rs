//! DMA-assisted implementation of the serial exchange engine, plus a plain
//! blocking fallback for hosts without the DMA peripheral.

mod exchange;
pub mod hal;
mod ssp;
mod transfer;

pub use hal::BlockingSpi;
pub use ssp::{DmaSink, DmaSource, SspDma};

/// Depth of the peripheral receive FIFO. Pending discarded reads never
/// exceed this.
pub const FIFO_DEPTH: usize = 8;

/// Serial exchange engine over a FIFO-backed synchronous serial port with a
/// pair of DMA channels.
///
/// Owns the port and the chip select line for its lifetime. The port's DMA
/// channels are acquired by the [`SspDma`] implementor at construction and
/// released when it is dropped.
pub struct SpiDma<SSP, CS> {
    ssp: SSP,
    cs: CS,
    reads_to_discard: usize,
    byte_count: u32,
}

impl<SSP, CS> SpiDma<SSP, CS>
where
    SSP: SspDma,
    CS: embedded_hal::digital::v2::OutputPin,
{
    /// Take ownership of the port and chip select pin. The port is set up
    /// for 8-bit mode-0 frames and the card is deselected.
    pub fn new(ssp: SSP, cs: CS) -> Self {
        let mut spi = Self { ssp, cs, reads_to_discard: 0, byte_count: 0 };
        spi.ssp.configure(8, 0);
        spi.cs.set_high().ok();
        spi
    }

    /// Release the port and pin.
    pub fn free(self) -> (SSP, CS) {
        (self.ssp, self.cs)
    }
}

#[cfg(test)]
pub(crate) mod sim;
