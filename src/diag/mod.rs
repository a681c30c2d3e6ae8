//! Diagnostic state the driver accumulates while running: a set of
//! monotonic counters and a circular text log of failures.

pub mod log;

pub use log::CircularLog;

/// Maxima and totals recorded across the driver's lifetime. Never reset by
/// normal I/O; a host can snapshot and diff them around a workload.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// How often the priming exchange in `select()` turned out to matter:
    /// it read 0xFF but the following exchange did not.
    pub select_first_exchange_required_count: u32,
    /// Longest busy wait observed, in milliseconds.
    pub maximum_wait_while_busy_ms: u32,
    /// Most polls ever needed before a valid R1 response appeared.
    pub maximum_r1_response_poll_count: u32,
    /// Deepest command retry due to CRC errors.
    pub maximum_crc_retry_count: u32,
    /// Longest time ACMD41 looped before the card left idle state.
    pub maximum_acmd41_loop_ms: u32,
    /// Longest wait for a data block start token.
    pub maximum_receive_block_wait_ms: u32,
    /// Deepest per-block retry during reads.
    pub maximum_read_retry_count: u32,
    /// Deepest per-block retry during writes.
    pub maximum_write_retry_count: u32,
    /// How often the extra padding byte after CMD12 carried error bits and
    /// so was probably required.
    pub cmd12_padding_byte_required_count: u32,
    /// Commands rejected because their 7-bit packet CRC failed.
    pub cmd_crc_error_count: u32,
    /// Timeouts waiting for a data block start token.
    pub receive_timeout_count: u32,
    /// Unexpected tokens where a block start was required.
    pub receive_bad_token_count: u32,
    /// Bulk receive transfers that failed (FIFO overrun).
    pub receive_transfer_fail_count: u32,
    /// Data blocks whose 16-bit CRC did not match.
    pub receive_crc_error_count: u32,
    /// Timeouts waiting for the card to finish a previous write.
    pub transmit_timeout_count: u32,
    /// Bulk transmit transfers that failed.
    pub transmit_transfer_fail_count: u32,
    /// Error data-response tokens returned for a transmitted block.
    pub transmit_response_error_count: u32,
}
