//! Hardware contract for the synchronous serial port driven by [`SpiDma`].
//!
//! [`SpiDma`]: super::SpiDma

/// Memory-to-peripheral side of a paired DMA transfer.
#[derive(Clone, Copy, Debug)]
pub struct DmaSource {
    pub address: *const u8,
    pub count: usize,
    /// When clear, the same source byte is transmitted for every beat.
    pub increment: bool,
}

/// Peripheral-to-memory side of a paired DMA transfer.
#[derive(Clone, Copy, Debug)]
pub struct DmaSink {
    pub address: *mut u8,
    pub count: usize,
    /// When clear, every received byte lands in the same destination slot.
    pub increment: bool,
}

/// A synchronous serial port with an 8-deep receive FIFO and two dedicated
/// DMA channels, one per direction.
///
/// Implementors acquire their DMA channels when constructed and release
/// them in `Drop`; the engine never touches channel allocation. All status
/// reads are cheap register polls.
pub trait SspDma {
    /// Set frame size in bits and the clock polarity/phase mode. Only 8-bit
    /// mode-0 frames are used by this driver.
    fn configure(&mut self, bits: u8, mode: u8);

    /// Change the serial clock rate.
    fn set_frequency(&mut self, hz: u32);

    /// A received byte is waiting in the FIFO.
    fn is_readable(&self) -> bool;

    /// The transmit FIFO can accept another byte.
    fn is_writeable(&self) -> bool;

    /// The port is still clocking bytes.
    fn is_busy(&self) -> bool;

    /// Pop one byte from the receive FIFO. Only call when readable.
    fn read_data(&mut self) -> u8;

    /// Push one byte into the transmit FIFO. Only call when writeable.
    fn write_data(&mut self, byte: u8);

    /// Raw (unmasked) receive-overrun interrupt status.
    fn rx_overrun(&self) -> bool;

    fn clear_rx_overrun(&mut self);

    /// Arm both DMA channels and enable the port's DMA request lines.
    fn start_transfer(&mut self, source: DmaSource, sink: DmaSink);

    /// The transmit channel has drained its source.
    fn tx_complete(&self) -> bool;

    /// The receive channel has filled its programmed count.
    fn rx_complete(&self) -> bool;

    /// Halt the receive channel mid-transfer and wait for it to go
    /// inactive. Used for overrun recovery.
    fn abort_receive(&mut self);

    /// Disable the port's DMA request lines.
    fn stop_transfer(&mut self);
}
