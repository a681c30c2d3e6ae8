//! Seams between the SD protocol engine and the hardware it drives.

pub mod spi;

/// Every data transfer on the SD bus moves payloads of this size.
pub const SD_BLOCK_SIZE: usize = 512;

/// The receive FIFO overflowed during a bulk transfer; the transfer was
/// aborted and the FIFO drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overrun;

/// Synchronous serial exchange engine with explicit control over which
/// received bytes the caller actually waits for.
///
/// `send` is the non-blocking half: the byte clocked in while it goes out is
/// left in the peripheral to be discarded later. `exchange` first drains
/// every such pending discard so the byte it returns is the one produced by
/// its own write. `transfer` moves bulk data without per-byte CPU work.
///
/// None of these operations are reentrant; the driver runs in a single flow
/// of execution.
pub trait SdSpi {
    /// Drain pending reads, then drive the chip select line. `high`
    /// deasserts the card.
    fn set_chip_select(&mut self, high: bool);

    /// Reclock the bus. Waits for in-flight traffic to finish first.
    fn set_frequency(&mut self, hz: u32);

    /// Write one byte without waiting for its received counterpart.
    fn send(&mut self, byte: u8);

    /// Flush pending discards, write one byte and return the byte received
    /// while it went out.
    fn exchange(&mut self, byte: u8) -> u8;

    /// Bulk exchange of `max(write.len(), read.len())` byte beats.
    ///
    /// * `write.len() == 1`: the single byte repeats for every beat.
    /// * `read.len() == 1`: only the last received byte is kept at
    ///   `read[0]`; earlier receives land in the same slot.
    /// * `read` empty: every received byte is discarded.
    /// * `read.len()` equal to the beat count: pending discards are flushed
    ///   up front so they cannot contaminate the destination.
    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Overrun>;

    /// Total bytes clocked on the wire since construction or the last reset.
    fn byte_count(&self) -> u32;

    fn reset_byte_count(&mut self);
}

/// Monotonic wall-clock source for the driver's deadlines.
///
/// Any free-running millisecond counter works; wrap-around is handled by the
/// subtraction at the call sites.
pub trait Clock {
    fn now_ms(&self) -> u32;
}
