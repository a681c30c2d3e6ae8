//! Scripted test double for the serial exchange engine, plus helpers that
//! prime it with the byte sequences real cards produce.
//!
//! Outbound traffic is recorded byte for byte; inbound traffic is served
//! from a queue the test fills up front. Chip-select and frequency changes
//! are recorded alongside the byte position at which they happened.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;

use sdspi::bus::{Clock, Overrun, SdSpi};
use sdspi::crc::{crc16, crc7};
use sdspi::{BlockDevice, SdCard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    ChipSelect { high: bool, bytes_sent_before: u32 },
    Frequency { hz: u32, bytes_sent_before: u32 },
}

pub struct MockSpi {
    pub inbound: VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub settings: Vec<Setting>,
    /// Served whenever the inbound script runs dry. 0xFF models an idle
    /// card; a busy card is simulated by setting this to 0x00.
    pub empty_response: u8,
    /// Number of upcoming bulk transfers that should report an overrun.
    pub transfer_overruns: usize,
    byte_count: u32,
}

impl MockSpi {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            settings: Vec::new(),
            empty_response: 0xFF,
            transfer_overruns: 0,
            byte_count: 0,
        }
    }

    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    pub fn queue_repeated(&mut self, byte: u8, count: usize) {
        self.inbound.extend(std::iter::repeat(byte).take(count));
    }

    /// Queue a data block payload followed by its correct CRC.
    pub fn queue_block(&mut self, fill: u8, size: usize) {
        self.queue_repeated(fill, size);
        let crc = crc16(&vec![fill; size]);
        self.queue_bytes(&crc.to_be_bytes());
    }

    /// Queue a data block payload followed by a deliberately wrong CRC.
    pub fn queue_block_bad_crc(&mut self, fill: u8, size: usize) {
        self.queue_repeated(fill, size);
        let crc = crc16(&vec![fill; size]) ^ 0xFFFF;
        self.queue_bytes(&crc.to_be_bytes());
    }

    fn next_inbound(&mut self) -> u8 {
        self.inbound.pop_front().unwrap_or(self.empty_response)
    }
}

impl SdSpi for MockSpi {
    fn set_chip_select(&mut self, high: bool) {
        self.settings.push(Setting::ChipSelect { high, bytes_sent_before: self.byte_count });
    }

    fn set_frequency(&mut self, hz: u32) {
        self.settings.push(Setting::Frequency { hz, bytes_sent_before: self.byte_count });
    }

    fn send(&mut self, byte: u8) {
        self.outbound.push(byte);
        self.byte_count += 1;
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        self.outbound.push(byte);
        self.byte_count += 1;
        self.next_inbound()
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Overrun> {
        let beats = write.len().max(read.len());
        self.byte_count += beats as u32;
        if self.transfer_overruns > 0 {
            self.transfer_overruns -= 1;
            return Err(Overrun);
        }
        for beat in 0..beats {
            let out = if write.len() == 1 { write[0] } else { write[beat] };
            self.outbound.push(out);
            if !read.is_empty() {
                let slot = if read.len() == 1 { 0 } else { beat };
                read[slot] = self.next_inbound();
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

/// Advances one millisecond per query, so every polling loop iteration
/// costs exactly 1ms of simulated time.
pub struct MockClock {
    now: Cell<u32>,
}

impl MockClock {
    pub fn new() -> Self {
        Self { now: Cell::new(0) }
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now + 1);
        now
    }
}

pub type TestCard = SdCard<MockSpi, MockClock>;

pub fn new_card() -> TestCard {
    SdCard::new(MockSpi::new(), MockClock::new())
}

/// Inbound bytes one plain command consumes: the select() priming
/// exchange, the not-busy poll, and the R1 response.
pub fn setup_data_for_cmd(spi: &mut MockSpi, r1: u8) {
    spi.queue_bytes(&[0x00, 0xFF, r1]);
}

/// Same for an application command: CMD55 first, then the command itself
/// behind a fresh chip-select cycle.
pub fn setup_data_for_acmd(spi: &mut MockSpi, r1_cmd55: u8, r1_acmd: u8) {
    setup_data_for_cmd(spi, r1_cmd55);
    setup_data_for_cmd(spi, r1_acmd);
}

/// CMD12 responds behind one discarded padding byte and, in the read
/// paths, is issued inside an already selected transaction.
pub fn setup_data_for_cmd12(spi: &mut MockSpi, r1: u8) {
    spi.queue_bytes(&[0xFF, r1]);
}

/// The 6-byte packet the driver must emit for the given command index and
/// argument.
pub fn cmd_packet(index: u8, argument: u32) -> [u8; 6] {
    let mut packet = [0u8; 6];
    packet[0] = 0x40 | index;
    packet[1..5].copy_from_slice(&argument.to_be_bytes());
    packet[5] = (crc7(&packet[..5]) << 1) | 1;
    packet
}

pub fn outbound_contains(spi: &MockSpi, needle: &[u8]) -> bool {
    spi.outbound.windows(needle.len()).any(|window| window == needle)
}

pub fn count_outbound(spi: &MockSpi, needle: &[u8]) -> usize {
    spi.outbound.windows(needle.len()).filter(|window| *window == needle).count()
}

pub fn log_contents(sd: &TestCard) -> String {
    let mut out = String::new();
    sd.dump_error_log(&mut out).unwrap();
    out
}

/// Script and run a successful SDHC initialization (CCS bit set in the
/// final OCR read).
pub fn init_sdhc(sd: &mut TestCard) {
    {
        let spi = sd.spi_mut();
        setup_data_for_cmd(spi, 0x01); // CMD0
        setup_data_for_cmd(spi, 0x01); // CMD59
        setup_data_for_cmd(spi, 0x01); // CMD8
        spi.queue_bytes(&0x0000_01ADu32.to_be_bytes()); // R7 echo
        setup_data_for_cmd(spi, 0x01); // CMD58 voltage check
        spi.queue_bytes(&0x0010_0000u32.to_be_bytes()); // OCR: 3.3V
        setup_data_for_acmd(spi, 0x01, 0x00); // ACMD41 leaves idle
        setup_data_for_cmd(spi, 0x01); // CMD58 capacity check
        spi.queue_bytes(&0x4000_0000u32.to_be_bytes()); // OCR: CCS set
    }
    let status = sd.initialize();
    assert!(!status.not_initialized(), "SDHC init should succeed: {}", log_contents(sd));
    assert!(sd.spi().inbound.is_empty(), "init should consume the whole script");
}

/// Script and run a successful SDSC initialization (CCS clear, CMD16
/// required).
pub fn init_sdsc(sd: &mut TestCard) {
    {
        let spi = sd.spi_mut();
        setup_data_for_cmd(spi, 0x01); // CMD0
        setup_data_for_cmd(spi, 0x01); // CMD59
        setup_data_for_cmd(spi, 0x01); // CMD8
        spi.queue_bytes(&0x0000_01ADu32.to_be_bytes());
        setup_data_for_cmd(spi, 0x01); // CMD58 voltage check
        spi.queue_bytes(&0x0010_0000u32.to_be_bytes());
        setup_data_for_acmd(spi, 0x01, 0x00); // ACMD41
        setup_data_for_cmd(spi, 0x01); // CMD58 capacity check
        spi.queue_bytes(&0x0000_0000u32.to_be_bytes()); // OCR: CCS clear
        setup_data_for_cmd(spi, 0x00); // CMD16
    }
    let status = sd.initialize();
    assert!(!status.not_initialized(), "SDSC init should succeed: {}", log_contents(sd));
    assert!(sd.spi().inbound.is_empty(), "init should consume the whole script");
}
