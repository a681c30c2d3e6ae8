//! The SD protocol engine and the block-device facade over it.

mod command;
mod data;
mod init;
mod io;
pub mod response;

use core::fmt;

use crate::bus::{Clock, SdSpi};
use crate::card::CardProfile;
use crate::device::{BlockDevice, DiskError, DiskStatus};
use crate::diag::{CircularLog, Diagnostics};

/// Bytes of diagnostic log text retained across failures.
pub const LOG_CAPACITY: usize = 1024;
/// Upper bound for a single rendered log line.
pub const LOG_LINE_MAX: usize = 256;

/// Timing and retry policy. The defaults are the values the SD physical
/// layer specification's SPI-mode timings call for.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bus clock during card initialization.
    pub init_clock_hz: u32,
    /// Bus clock once the card is up; default speed mode tops out here.
    pub run_clock_hz: u32,
    /// Deadline for the card to leave the busy state.
    pub select_busy_timeout_ms: u32,
    /// Deadline for a data block start token to appear.
    pub receive_block_timeout_ms: u32,
    /// Deadline for ACMD41 polling to leave the idle state.
    pub acmd41_timeout_ms: u32,
    /// Exchanges to poll for a valid R1 response.
    pub r1_poll_max: u32,
    /// Command reissues tolerated on packet CRC errors.
    pub crc_retries: u32,
    /// Per-block retries for data transfers.
    pub block_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            init_clock_hz: 400_000,
            run_clock_hz: 25_000_000,
            select_busy_timeout_ms: 500,
            receive_block_timeout_ms: 500,
            acmd41_timeout_ms: 1000,
            r1_poll_max: 10,
            crc_retries: 4,
            block_retries: 3,
        }
    }
}

/// SD card driver over a serial exchange engine and a millisecond clock.
///
/// Owns the bus and the diagnostic log for its lifetime; one flow of
/// execution at a time.
pub struct SdCard<SPI, CLK> {
    spi: SPI,
    clock: CLK,
    config: Config,
    status: DiskStatus,
    profile: Option<CardProfile>,
    log: CircularLog<LOG_CAPACITY, LOG_LINE_MAX>,
    diagnostics: Diagnostics,
}

impl<SPI: SdSpi, CLK: Clock> SdCard<SPI, CLK> {
    pub fn new(spi: SPI, clock: CLK) -> Self {
        Self::with_config(spi, clock, Config::default())
    }

    pub fn with_config(spi: SPI, clock: CLK, config: Config) -> Self {
        Self {
            spi,
            clock,
            config,
            status: DiskStatus::uninitialized(),
            profile: None,
            log: CircularLog::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Release the bus and clock.
    pub fn free(self) -> (SPI, CLK) {
        (self.spi, self.clock)
    }

    /// Profile of the initialized card, if initialization succeeded.
    pub fn card_profile(&self) -> Option<CardProfile> {
        self.profile
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters accumulated since construction.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn spi(&self) -> &SPI {
        &self.spi
    }

    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Write the retained diagnostic text to `sink`.
    pub fn dump_error_log<W: fmt::Write>(&self, sink: &mut W) -> fmt::Result {
        self.log.dump(sink)
    }

    pub fn is_error_log_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn clear_error_log(&mut self) {
        self.log.clear();
    }

    pub(crate) fn address_shift(&self) -> u32 {
        match &self.profile {
            Some(profile) => profile.capacity.address_shift(),
            None => 0,
        }
    }
}

impl<SPI: SdSpi, CLK: Clock> BlockDevice for SdCard<SPI, CLK> {
    fn initialize(&mut self) -> DiskStatus {
        #[cfg(feature = "single-thread-assert")]
        let _check = crate::guard::SingleThreadedCheck::new();
        self.initialize_card()
    }

    fn status(&self) -> DiskStatus {
        self.status
    }

    fn read(&mut self, buffer: &mut [u8], block_number: u32, count: u32) -> Result<(), DiskError> {
        #[cfg(feature = "single-thread-assert")]
        let _check = crate::guard::SingleThreadedCheck::new();
        self.read_blocks(buffer, block_number, count)
    }

    fn write(&mut self, buffer: &[u8], block_number: u32, count: u32) -> Result<(), DiskError> {
        #[cfg(feature = "single-thread-assert")]
        let _check = crate::guard::SingleThreadedCheck::new();
        self.write_blocks(buffer, block_number, count)
    }

    fn sync(&mut self) -> Result<(), DiskError> {
        #[cfg(feature = "single-thread-assert")]
        let _check = crate::guard::SingleThreadedCheck::new();
        self.flush_card()
    }

    fn sectors(&mut self) -> u32 {
        #[cfg(feature = "single-thread-assert")]
        let _check = crate::guard::SingleThreadedCheck::new();
        self.sector_count()
    }
}
