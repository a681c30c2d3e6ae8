//! The mode-selection and initialization state machine, per the SD
//! physical layer's SPI-mode flow: reset into idle, enable CRC, probe the
//! card generation, check voltage, poll the card out of idle, then learn
//! its capacity class.

use crate::bus::{Clock, SdSpi, SD_BLOCK_SIZE};
use crate::card::{CardCapacity, CardProfile, CardVersion};
use crate::commands::{
    ACMD41_HCS, CMD59_CRC_OPTION, CMD8_CHECK_PATTERN, CMD8_VHS_2_7_3_6V, SD_ACMD41_SD_SEND_OP_COND,
    SD_CMD0_GO_IDLE_STATE, SD_CMD16_SET_BLOCKLEN, SD_CMD58_READ_OCR, SD_CMD59_CRC_ON_OFF,
    SD_CMD8_SEND_IF_COND,
};
use crate::device::DiskStatus;
use crate::registers::OcrRegister;

use super::response::{BitField, R1Response, R1ResponseField};
use super::SdCard;

const R7_VHS_CHECK_MASK: u32 = 0xFFFF;

impl<SPI: SdSpi, CLK: Clock> SdCard<SPI, CLK> {
    pub(crate) fn initialize_card(&mut self) -> DiskStatus {
        let is_v2;

        // Cards power up accepting at most a 400kHz clock.
        self.spi.set_frequency(self.config.init_clock_hz);

        // At least 74 clocks with chip select deasserted before the first
        // command.
        self.spi.set_chip_select(true);
        for _ in 0..8 {
            self.spi.send(0xFF);
        }

        // CMD0 with chip select low resets the card and switches it into
        // SPI mode.
        let r1 = self.cmd(SD_CMD0_GO_IDLE_STATE, 0, None);
        if r1 != R1Response::IDLE {
            self.log.log(format_args!(
                "initialize() - CMD0 returned 0x{:02X}. Is card inserted?\n",
                r1.0
            ));
            return self.status;
        }

        // CRC checking is off by default in SPI mode; turn it on for every
        // following packet.
        let r1 = self.cmd(SD_CMD59_CRC_ON_OFF, CMD59_CRC_OPTION, None);
        if r1 != R1Response::IDLE {
            self.log.log(format_args!("initialize() - CMD59 returned 0x{:02X}\n", r1.0));
            return self.status;
        }

        // CMD8 tells v2 cards the supply voltage; they echo the argument
        // back. v1 cards answer with illegal command, which routes to the
        // v1 path rather than failing.
        let cmd8_argument = CMD8_VHS_2_7_3_6V | CMD8_CHECK_PATTERN;
        let mut r7 = 0xFFFF_FFFFu32;
        let r1 = self.cmd(SD_CMD8_SEND_IF_COND, cmd8_argument, Some(&mut r7));
        if r1 == R1Response::IDLE {
            is_v2 = true;
            if r7 & R7_VHS_CHECK_MASK != cmd8_argument {
                self.log.log(format_args!(
                    "initialize() - CMD8 returned 0x{:08X} (expected 0x{:08X})\n",
                    r7, cmd8_argument
                ));
                return self.status;
            }
        } else if r1.has(R1ResponseField::IllegalCommand) {
            is_v2 = false;
        } else {
            self.log.log(format_args!("initialize() - CMD8 returned 0x{:02X}\n", r1.0));
            return self.status;
        }

        // Read the OCR to confirm the card can run at 3.3V.
        let mut ocr = 0xFFFF_FFFFu32;
        let r1 = self.cmd(SD_CMD58_READ_OCR, 0, Some(&mut ocr));
        if r1 != R1Response::IDLE {
            self.log.log(format_args!(
                "initialize() - CMD58 returned 0x{:02X} during voltage check\n",
                r1.0
            ));
            return self.status;
        }
        if !(OcrRegister { val: ocr }).supports_3v3() {
            self.log.log(format_args!(
                "initialize() - CMD58 3.3V not supported. OCR=0x{:08X}\n",
                ocr
            ));
            return self.status;
        }

        // ACMD41 starts the card's internal initialization; poll it until
        // the card leaves idle state. HCS tells v2 cards this host can
        // handle high capacity.
        let acmd41_argument = if is_v2 { ACMD41_HCS } else { 0 };
        let start = self.clock.now_ms();
        let mut r1;
        let mut elapsed;
        loop {
            r1 = self.cmd(SD_ACMD41_SD_SEND_OP_COND, acmd41_argument, None);
            elapsed = self.clock.now_ms().wrapping_sub(start);
            if r1 != R1Response::IDLE || elapsed >= self.config.acmd41_timeout_ms {
                break;
            }
        }
        if elapsed > self.diagnostics.maximum_acmd41_loop_ms {
            self.diagnostics.maximum_acmd41_loop_ms = elapsed;
        }
        if r1 == R1Response::IDLE {
            self.log.log(format_args!(
                "initialize() - ACMD41 timed out attempting to leave idle state\n"
            ));
            return self.status;
        } else if r1.has_errors() {
            self.log.log(format_args!("initialize() - ACMD41 returned 0x{:02X}\n", r1.0));
            return self.status;
        }

        // Capacity class: v2 cards report it through the OCR's CCS bit,
        // which only becomes valid after ACMD41 finishes. v1 cards are
        // always standard capacity.
        let capacity = if is_v2 {
            let r1 = self.cmd(SD_CMD58_READ_OCR, 0, Some(&mut ocr));
            if r1.has_errors() {
                self.log.log(format_args!(
                    "initialize() - CMD58 returned 0x{:02X} during capacity check\n",
                    r1.0
                ));
                return self.status;
            }
            if (OcrRegister { val: ocr }).card_capacity_status() {
                CardCapacity::High
            } else {
                CardCapacity::Standard
            }
        } else {
            CardCapacity::Standard
        };

        // Standard capacity cards need the block length pinned to 512.
        if capacity == CardCapacity::Standard {
            let r1 = self.cmd(SD_CMD16_SET_BLOCKLEN, SD_BLOCK_SIZE as u32, None);
            if r1.has_errors() {
                self.log.log(format_args!("initialize() - CMD16 returned 0x{:02X}\n", r1.0));
                return self.status;
            }
        }

        // Default speed mode runs at up to 25MHz.
        self.spi.set_frequency(self.config.run_clock_hz);

        self.profile = Some(CardProfile {
            version: if is_v2 { CardVersion::V2 } else { CardVersion::V1 },
            capacity,
        });
        self.status.set_not_initialized(false);

        self.status
    }
}
