//! Data block movement: start-token waits, bulk transfers and token
//! decoding on both directions.

use embedded_error::mci::{CommandOrDataError, MciError};

use crate::bus::{Clock, SdSpi};
use crate::commands::SdCommand;
use crate::crc::crc16;

use super::response::{DataResponse, R1Response, BLOCK_START, MULTIPLE_BLOCK_STOP};
use super::SdCard;

impl<SPI: SdSpi, CLK: Clock> SdCard<SPI, CLK> {
    /// Receive one data block into `buffer`: wait for the start token, bulk
    /// read the payload, verify the trailing CRC.
    pub(crate) fn receive_data_block(&mut self, buffer: &mut [u8]) -> Result<(), MciError> {
        // The card keeps the data line high until the block starts.
        let timeout_ms = self.config.receive_block_timeout_ms;
        let start = self.clock.now_ms();
        let mut byte;
        let mut elapsed;
        loop {
            byte = self.spi.exchange(0xFF);
            elapsed = self.clock.now_ms().wrapping_sub(start);
            if byte != 0xFF || elapsed >= timeout_ms {
                break;
            }
        }

        if elapsed > self.diagnostics.maximum_receive_block_wait_ms {
            self.diagnostics.maximum_receive_block_wait_ms = elapsed;
        }

        if byte == 0xFF {
            self.diagnostics.receive_timeout_count += 1;
            self.log.log(format_args!(
                "receive_data_block({:p},{}) - Time out after {}ms\n",
                buffer.as_ptr(),
                buffer.len(),
                timeout_ms
            ));
            return Err(MciError::DataError(CommandOrDataError::Timeout));
        }

        if byte != BLOCK_START {
            self.diagnostics.receive_bad_token_count += 1;
            self.log.log(format_args!(
                "receive_data_block({:p},{}) - Expected 0xFE start block token. Response=0x{:02X}\n",
                buffer.as_ptr(),
                buffer.len(),
                byte
            ));
            return Err(MciError::ReadError);
        }

        // Pull the payload in with a repeated 0xFF as the write source.
        let fill = [0xFFu8];
        if self.spi.transfer(&fill, buffer).is_err() {
            self.diagnostics.receive_transfer_fail_count += 1;
            self.log.log(format_args!(
                "receive_data_block({:p},{}) - Bulk receive failed\n",
                buffer.as_ptr(),
                buffer.len()
            ));
            return Err(MciError::ReadError);
        }

        let mut expected = (self.spi.exchange(0xFF) as u16) << 8;
        expected |= self.spi.exchange(0xFF) as u16;
        let actual = crc16(buffer);
        if actual != expected {
            self.diagnostics.receive_crc_error_count += 1;
            self.log.log(format_args!(
                "receive_data_block({:p},{}) - Invalid CRC. Expected=0x{:04X} Actual=0x{:04X}\n",
                buffer.as_ptr(),
                buffer.len(),
                expected,
                actual
            ));
            return Err(MciError::DataError(CommandOrDataError::Crc));
        }

        Ok(())
    }

    /// Send one data block behind `token` and decode the card's
    /// data-response. The multiple-block stop token carries no payload and
    /// no CRC; `buffer` must be empty for it.
    pub(crate) fn transmit_data_block(&mut self, token: u8, buffer: &[u8]) -> DataResponse {
        // A previous block write may still be in progress.
        if !self.wait_while_busy(self.config.select_busy_timeout_ms) {
            self.diagnostics.transmit_timeout_count += 1;
            self.log.log(format_args!(
                "transmit_data_block(0x{:02X},{:p},{}) - Time out after {}ms\n",
                token,
                buffer.as_ptr(),
                buffer.len(),
                self.config.select_busy_timeout_ms
            ));
            return DataResponse::UNKNOWN_ERROR;
        }

        self.spi.send(token);

        if token == MULTIPLE_BLOCK_STOP {
            debug_assert!(buffer.is_empty());
            return DataResponse::ACCEPTED;
        }

        if self.spi.transfer(buffer, &mut []).is_err() {
            self.diagnostics.transmit_transfer_fail_count += 1;
            self.log.log(format_args!(
                "transmit_data_block(0x{:02X},{:p},{}) - Bulk transmit failed\n",
                token,
                buffer.as_ptr(),
                buffer.len()
            ));
            return DataResponse::UNKNOWN_ERROR;
        }

        let crc = crc16(buffer);
        self.spi.send((crc >> 8) as u8);
        self.spi.send(crc as u8);

        let response = DataResponse::from_wire(self.spi.exchange(0xFF));
        if !response.accepted() {
            self.diagnostics.transmit_response_error_count += 1;
            self.log.log(format_args!(
                "transmit_data_block(0x{:02X},{:p},{}) - Data Response=0x{:02X}\n",
                token,
                buffer.as_ptr(),
                buffer.len(),
                response.0
            ));
        }
        response
    }

    /// Select, issue a block-producing command and receive its data block.
    /// The whole select/command/receive cycle retries on receive failure.
    pub(crate) fn send_command_and_receive_data_block(
        &mut self,
        command: SdCommand,
        argument: u32,
        buffer: &mut [u8],
    ) -> Result<(), MciError> {
        let mut result = Err(MciError::ReadError);

        for retry in 1..=self.config.block_retries {
            if !self.select() {
                // select() already deselected on its own timeout.
                self.log.log(format_args!(
                    "send_command_and_receive_data_block({},{:X},{}) - Select timed out\n",
                    command,
                    argument,
                    buffer.len()
                ));
                return Err(MciError::CouldNotSelectDevice);
            }

            let r1 = self.send_command_and_get_response(command, argument, None);
            if r1 != R1Response::READY {
                self.log.log(format_args!(
                    "send_command_and_receive_data_block({},{:X},{}) - {} returned 0x{:02X}\n",
                    command,
                    argument,
                    buffer.len(),
                    command,
                    r1.0
                ));
                break;
            }

            if self.receive_data_block(buffer).is_err() {
                self.log.log(format_args!(
                    "send_command_and_receive_data_block({},{:X},{}) - receive_data_block failed\n",
                    command,
                    argument,
                    buffer.len()
                ));
                if retry > self.diagnostics.maximum_read_retry_count {
                    self.diagnostics.maximum_read_retry_count = retry;
                }
                self.deselect();
                continue;
            }

            result = Ok(());
            break;
        }
        self.deselect();

        result
    }
}
