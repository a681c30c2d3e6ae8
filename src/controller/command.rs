//! Command framing: chip select discipline, busy waits and the 6-byte
//! packet exchange with CRC retry.

use crate::bus::{Clock, SdSpi};
use crate::commands::{SdCommand, ResponseKind, SD_CMD55_APP_CMD};
use crate::crc::crc7;

use super::response::{BitField, R1Response, R1ResponseField};
use super::SdCard;

// First packet byte: start bit clear, transmission bit set.
const CMD_TRANSMISSION_BIT: u8 = 1 << 6;
// Last packet byte carries the stop bit alongside the CRC.
const CMD_STOP_BIT: u8 = 1 << 0;

impl<SPI: SdSpi, CLK: Clock> SdCard<SPI, CLK> {
    /// Run one command inside its own select/deselect pair.
    pub(crate) fn cmd(
        &mut self,
        command: SdCommand,
        argument: u32,
        response: Option<&mut u32>,
    ) -> R1Response {
        if !self.select() {
            self.log.log(format_args!("cmd({},{:X}) - Select timed out\n", command, argument));
            return R1Response::TIMEOUT;
        }

        let r1 = self.send_command_and_get_response(command, argument, response);

        self.deselect();
        r1
    }

    /// Assert chip select, prime the bus and wait for the card to report
    /// not-busy. On timeout the card is deselected again and the caller
    /// must give up.
    pub(crate) fn select(&mut self) -> bool {
        self.spi.set_chip_select(false);

        // Prime the card with one exchange before polling for busy. Count
        // the cases where this byte made the difference, to learn whether
        // it is needed at all: it only matters if it read 0xFF while the
        // following exchange would not.
        let response = self.spi.exchange(0xFF);
        if response == 0xFF && self.spi.exchange(0xFF) != 0xFF {
            self.diagnostics.select_first_exchange_required_count += 1;
        }

        if !self.wait_while_busy(self.config.select_busy_timeout_ms) {
            self.log.log(format_args!(
                "select() - {} msec time out\n",
                self.config.select_busy_timeout_ms
            ));
            self.deselect();
            return false;
        }

        true
    }

    /// Deassert chip select and give the card the eight extra clocks it
    /// needs after a transaction.
    pub(crate) fn deselect(&mut self) {
        self.spi.set_chip_select(true);
        self.spi.send(0xFF);
    }

    /// Poll until the card releases the data line (0xFF) or the deadline
    /// expires.
    pub(crate) fn wait_while_busy(&mut self, timeout_ms: u32) -> bool {
        let start = self.clock.now_ms();
        let mut response;
        let mut elapsed;
        loop {
            response = self.spi.exchange(0xFF);
            elapsed = self.clock.now_ms().wrapping_sub(start);
            if response == 0xFF || elapsed >= timeout_ms {
                break;
            }
        }

        if elapsed > self.diagnostics.maximum_wait_while_busy_ms {
            self.diagnostics.maximum_wait_while_busy_ms = elapsed;
        }

        if response != 0xFF {
            self.log.log(format_args!(
                "wait_while_busy({}) - Time out. Response=0x{:02X}\n",
                timeout_ms, response
            ));
            return false;
        }

        true
    }

    /// Frame and send a command packet, then collect its response. Retries
    /// the whole packet on CRC rejection. Chip select must already be low.
    ///
    /// Returns the R1 byte; `R1Response::TIMEOUT` when no valid response
    /// ever appeared.
    pub(crate) fn send_command_and_get_response(
        &mut self,
        command: SdCommand,
        argument: u32,
        mut response: Option<&mut u32>,
    ) -> R1Response {
        let mut prefix_app_command = command.app_command;
        let mut r1 = R1Response::TIMEOUT;

        for retry in 1..=self.config.crc_retries {
            // Application commands are announced with a CMD55 first.
            if prefix_app_command {
                let prefix = self.send_command_and_get_response(SD_CMD55_APP_CMD, 0, None);
                if prefix.has_errors() {
                    self.log.log(format_args!(
                        "send_command_and_get_response({},{:X}) - CMD55 prefix returned 0x{:02X}\n",
                        command, argument, prefix.0
                    ));
                    return prefix;
                }

                // Cycle chip select between CMD55 and the command itself.
                self.deselect();
                if !self.select() {
                    self.log.log(format_args!(
                        "send_command_and_get_response({},{:X}) - CMD55 prefix select timed out\n",
                        command, argument
                    ));
                    return R1Response::TIMEOUT;
                }
                prefix_app_command = false;
            }

            let mut packet = [0u8; 6];
            packet[0] = CMD_TRANSMISSION_BIT | (command.index & 0x3F);
            packet[1..5].copy_from_slice(&argument.to_be_bytes());
            packet[5] = (crc7(&packet[..5]) << 1) | CMD_STOP_BIT;
            for &byte in packet.iter() {
                self.spi.send(byte);
            }

            // CMD12's response hides behind one extra byte. Note when that
            // byte actually looked like a response, i.e. the padding read
            // was required.
            if command.index == 12 {
                let padding = R1Response(self.spi.exchange(0xFF));
                if padding.is_valid() && padding.has_errors() {
                    self.diagnostics.cmd12_padding_byte_required_count += 1;
                }
            }

            // Poll for a byte with the start bit clear.
            let mut failed_polls = 0u32;
            r1 = R1Response(self.spi.exchange(0xFF));
            while !r1.is_valid() {
                failed_polls += 1;
                if failed_polls >= self.config.r1_poll_max {
                    break;
                }
                r1 = R1Response(self.spi.exchange(0xFF));
            }
            if failed_polls > self.diagnostics.maximum_r1_response_poll_count {
                self.diagnostics.maximum_r1_response_poll_count = failed_polls;
            }

            if !r1.is_valid() {
                self.log.log(format_args!(
                    "send_command_and_get_response({},{:X}) - Timed out waiting for valid R1 response. r1=0x{:02X}\n",
                    command, argument, r1.0
                ));
                return R1Response::TIMEOUT;
            } else if r1.has(R1ResponseField::CommandCrc) {
                self.diagnostics.cmd_crc_error_count += 1;
                if retry > self.diagnostics.maximum_crc_retry_count {
                    self.diagnostics.maximum_crc_retry_count = retry;
                }
                continue;
            } else if r1.has_errors() {
                // Not logged here: callers may expect this (CMD8 probing on
                // v1 cards) and will log it otherwise.
                return r1;
            }

            match command.response {
                ResponseKind::R1 => {}
                ResponseKind::R1R7 | ResponseKind::R1R3 => {
                    let mut tail = 0u32;
                    for _ in 0..4 {
                        tail = tail << 8 | self.spi.exchange(0xFF) as u32;
                    }
                    if let Some(out) = response.take() {
                        *out = tail;
                    }
                }
                ResponseKind::R1R2 => {
                    let tail = self.spi.exchange(0xFF) as u32;
                    if let Some(out) = response.take() {
                        *out = tail;
                    }
                }
            }
            return r1;
        }

        self.log.log(format_args!(
            "send_command_and_get_response({},{:X}) - Failed CRC check {} times\n",
            command, argument, self.config.crc_retries
        ));
        r1
    }
}
