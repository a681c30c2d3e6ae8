//! Block I/O on an initialized card, plus register access.

use crate::bus::{Clock, SdSpi, SD_BLOCK_SIZE};
use crate::commands::{
    SD_ACMD22_SEND_NUM_WR_BLOCKS, SD_ACMD23_SET_WR_BLK_ERASE_COUNT, SD_CMD10_SEND_CID,
    SD_CMD12_STOP_TRANSMISSION, SD_CMD13_SEND_STATUS, SD_CMD17_READ_SINGLE_BLOCK,
    SD_CMD18_READ_MULTIPLE_BLOCK, SD_CMD24_WRITE_BLOCK, SD_CMD25_WRITE_MULTIPLE_BLOCK,
    SD_CMD58_READ_OCR, SD_CMD9_SEND_CSD,
};
use crate::device::DiskError;
use crate::registers::CsdRegister;

use super::response::{DataResponse, R1Response, BLOCK_START, MULTIPLE_BLOCK_START, MULTIPLE_BLOCK_STOP};
use super::SdCard;

// ACMD23 takes the pre-erase count in its low bits only.
const ACMD23_COUNT_MASK: u32 = 0x0007_FFFF;

impl<SPI: SdSpi, CLK: Clock> SdCard<SPI, CLK> {
    pub(crate) fn read_blocks(
        &mut self,
        buffer: &mut [u8],
        block_number: u32,
        count: u32,
    ) -> Result<(), DiskError> {
        let orig_address = buffer.as_ptr();
        let orig_block_number = block_number;
        let orig_count = count;

        if self.status.not_initialized() {
            self.log.log(format_args!(
                "read({:p},{},{}) - Attempt to read uninitialized drive\n",
                orig_address, orig_block_number, orig_count
            ));
            return Err(DiskError::NotReady);
        }
        if count == 0 {
            self.log.log(format_args!(
                "read({:p},{},{}) - Attempt to read 0 blocks\n",
                orig_address, orig_block_number, orig_count
            ));
            return Err(DiskError::InvalidParameter);
        }
        debug_assert!(buffer.len() >= count as usize * SD_BLOCK_SIZE);

        if count == 1 {
            // Standard capacity cards address bytes, high capacity cards
            // address blocks.
            let block_address = block_number << self.address_shift();

            let result = self.send_command_and_receive_data_block(
                SD_CMD17_READ_SINGLE_BLOCK,
                block_address,
                &mut buffer[..SD_BLOCK_SIZE],
            );
            if result.is_err() {
                self.log.log(format_args!(
                    "read({:p},{},{}) - Read failed\n",
                    orig_address, orig_block_number, orig_count
                ));
                return Err(DiskError::Io);
            }
            return Ok(());
        }

        let mut block_number = block_number;
        let mut count = count;
        let mut offset = 0usize;
        let mut retry = 1u32;
        while retry <= self.config.block_retries {
            let block_address = block_number << self.address_shift();

            if !self.select() {
                // No second deselect needed when select() itself failed.
                self.log.log(format_args!(
                    "read({:p},{},{}) - Select timed out\n",
                    orig_address, orig_block_number, orig_count
                ));
                return Err(DiskError::Io);
            }

            let r1 = self.send_command_and_get_response(
                SD_CMD18_READ_MULTIPLE_BLOCK,
                block_address,
                None,
            );
            if r1 != R1Response::READY {
                self.log.log(format_args!(
                    "read({:p},{},{}) - CMD18 returned 0x{:02X}\n",
                    orig_address, orig_block_number, orig_count, r1.0
                ));
                self.deselect();
                return Err(DiskError::Io);
            }

            while count > 0 {
                if self
                    .receive_data_block(&mut buffer[offset..offset + SD_BLOCK_SIZE])
                    .is_err()
                {
                    self.log.log(format_args!(
                        "read({:p},{},{}) - receive_data_block failed. block={}\n",
                        orig_address, orig_block_number, orig_count, block_number
                    ));
                    if retry > self.diagnostics.maximum_read_retry_count {
                        self.diagnostics.maximum_read_retry_count = retry;
                    }
                    // Let the outer loop retry from this block.
                    break;
                }

                // The retry budget is per block: a success rearms it.
                retry = 1;
                offset += SD_BLOCK_SIZE;
                block_number += 1;
                count -= 1;
            }

            // Stop the transmission whether the inner loop completed or
            // broke out.
            let r1 = self.send_command_and_get_response(SD_CMD12_STOP_TRANSMISSION, 0, None);
            self.deselect();
            if r1 != R1Response::READY {
                self.log.log(format_args!(
                    "read({:p},{},{}) - CMD12 returned 0x{:02X}\n",
                    orig_address, orig_block_number, orig_count, r1.0
                ));
                return Err(DiskError::Io);
            }

            if count == 0 {
                return Ok(());
            }
            retry += 1;
        }

        Err(DiskError::Io)
    }

    pub(crate) fn write_blocks(
        &mut self,
        buffer: &[u8],
        block_number: u32,
        count: u32,
    ) -> Result<(), DiskError> {
        let orig_address = buffer.as_ptr();
        let orig_block_number = block_number;
        let orig_count = count;

        if self.status.not_initialized() {
            self.log.log(format_args!(
                "write({:p},{},{}) - Attempt to write uninitialized drive\n",
                orig_address, orig_block_number, orig_count
            ));
            return Err(DiskError::NotReady);
        }
        if count == 0 {
            self.log.log(format_args!(
                "write({:p},{},{}) - Attempt to write 0 blocks\n",
                orig_address, orig_block_number, orig_count
            ));
            return Err(DiskError::InvalidParameter);
        }
        debug_assert!(buffer.len() >= count as usize * SD_BLOCK_SIZE);

        let mut block_number = block_number;
        let mut count = count;
        let mut offset = 0usize;
        let mut retry = 1u32;
        while retry <= self.config.block_retries {
            let block_address = block_number << self.address_shift();

            if orig_count == 1 {
                if !self.select() {
                    self.log.log(format_args!(
                        "write({:p},{},{}) - Select timed out\n",
                        orig_address, orig_block_number, orig_count
                    ));
                    return Err(DiskError::Io);
                }

                let r1 =
                    self.send_command_and_get_response(SD_CMD24_WRITE_BLOCK, block_address, None);
                if r1 != R1Response::READY {
                    self.log.log(format_args!(
                        "write({:p},{},{}) - CMD24 returned 0x{:02X}\n",
                        orig_address, orig_block_number, orig_count, r1.0
                    ));
                    self.deselect();
                    return Err(DiskError::Io);
                }

                let response = self.transmit_data_block(BLOCK_START, &buffer[..SD_BLOCK_SIZE]);
                if !response.accepted() {
                    self.log.log(format_args!(
                        "write({:p},{},{}) - transmit_data_block failed\n",
                        orig_address, orig_block_number, orig_count
                    ));
                    if retry > self.diagnostics.maximum_write_retry_count {
                        self.diagnostics.maximum_write_retry_count = retry;
                    }
                    self.deselect();
                    retry += 1;
                    continue;
                }
            } else {
                // Hint the number of blocks to pre-erase. Purely advisory,
                // so errors are ignored. Sequencing note: this goes out
                // through its own select/deselect pair before the CMD25
                // select scope.
                self.cmd(SD_ACMD23_SET_WR_BLK_ERASE_COUNT, count & ACMD23_COUNT_MASK, None);

                if !self.select() {
                    self.log.log(format_args!(
                        "write({:p},{},{}) - Select timed out\n",
                        orig_address, orig_block_number, orig_count
                    ));
                    return Err(DiskError::Io);
                }

                let r1 = self.send_command_and_get_response(
                    SD_CMD25_WRITE_MULTIPLE_BLOCK,
                    block_address,
                    None,
                );
                if r1 != R1Response::READY {
                    self.log.log(format_args!(
                        "write({:p},{},{}) - CMD25 returned 0x{:02X}\n",
                        orig_address, orig_block_number, orig_count, r1.0
                    ));
                    self.deselect();
                    return Err(DiskError::Io);
                }

                let start_offset = offset;
                let start_block_number = block_number;
                let start_count = count;
                while count > 0 {
                    let response = self.transmit_data_block(
                        MULTIPLE_BLOCK_START,
                        &buffer[offset..offset + SD_BLOCK_SIZE],
                    );
                    if !response.accepted() {
                        self.log.log(format_args!(
                            "write({:p},{},{}) - transmit_data_block failed. block={}\n",
                            orig_address, orig_block_number, orig_count, block_number
                        ));
                        if retry > self.diagnostics.maximum_write_retry_count {
                            self.diagnostics.maximum_write_retry_count = retry;
                        }

                        // An error data-response requires CMD12 to stop the
                        // write stream.
                        self.deselect();
                        self.cmd(SD_CMD12_STOP_TRANSMISSION, 0, None);

                        if response == DataResponse::WRITE_ERROR {
                            // Ask the card how many blocks actually landed
                            // so the retry resumes at the right one.
                            let mut written = [0u8; 4];
                            if self
                                .send_command_and_receive_data_block(
                                    SD_ACMD22_SEND_NUM_WR_BLOCKS,
                                    0,
                                    &mut written,
                                )
                                .is_err()
                            {
                                self.log.log(format_args!(
                                    "write({:p},{},{}) - Failed to retrieve written block count.\n",
                                    orig_address, orig_block_number, orig_count
                                ));
                                return Err(DiskError::Io);
                            }

                            let mut blocks_written = u32::from_be_bytes(written);
                            // An implausible answer means none of them can
                            // be trusted.
                            if blocks_written > start_count {
                                blocks_written = 0;
                            }

                            offset = start_offset + SD_BLOCK_SIZE * blocks_written as usize;
                            block_number = start_block_number + blocks_written;
                            count = start_count - blocks_written;
                        }
                        break;
                    }

                    // The retry budget is per block: a success rearms it.
                    retry = 1;
                    offset += SD_BLOCK_SIZE;
                    block_number += 1;
                    count -= 1;
                }

                if count == 0 {
                    self.transmit_data_block(MULTIPLE_BLOCK_STOP, &[]);
                } else {
                    retry += 1;
                    continue;
                }
            }

            // Validate the write by reading back the card status.
            let mut card_status = 0u32;
            self.deselect();
            let r1 = self.cmd(SD_CMD13_SEND_STATUS, 0, Some(&mut card_status));
            if r1 != R1Response::READY {
                self.log.log(format_args!(
                    "write({:p},{},{}) - CMD13 failed. r1=0x{:02X}\n",
                    orig_address, orig_block_number, orig_count, r1.0
                ));
                return Err(DiskError::Io);
            }
            if card_status != 0 {
                self.log.log(format_args!(
                    "write({:p},{},{}) - CMD13 failed. Status=0x{:02X}\n",
                    orig_address, orig_block_number, orig_count, card_status
                ));
                return Err(DiskError::Io);
            }

            return Ok(());
        }

        Err(DiskError::Io)
    }

    pub(crate) fn flush_card(&mut self) -> Result<(), DiskError> {
        // Selecting waits for any outstanding write to leave busy state.
        if !self.select() {
            self.log.log(format_args!("sync() - Failed waiting for not busy\n"));
            return Err(DiskError::Io);
        }
        self.deselect();
        Ok(())
    }

    pub(crate) fn sector_count(&mut self) -> u32 {
        if self.status.not_initialized() {
            self.log.log(format_args!("sectors() - Attempt to query uninitialized drive\n"));
            return 0;
        }

        let mut csd = [0u8; 16];
        if self.get_csd(&mut csd).is_err() {
            self.log.log(format_args!("sectors() - Failed to read CSD\n"));
            return 0;
        }

        CsdRegister(csd).sector_count()
    }

    /// Read the 16-byte card identification register.
    pub fn get_cid(&mut self, cid: &mut [u8; 16]) -> Result<(), DiskError> {
        if self
            .send_command_and_receive_data_block(SD_CMD10_SEND_CID, 0, cid)
            .is_err()
        {
            self.log.log(format_args!("get_cid({:p}) - Register read failed\n", cid.as_ptr()));
            return Err(DiskError::Io);
        }
        Ok(())
    }

    /// Read the 16-byte card specific data register.
    pub fn get_csd(&mut self, csd: &mut [u8; 16]) -> Result<(), DiskError> {
        if self
            .send_command_and_receive_data_block(SD_CMD9_SEND_CSD, 0, csd)
            .is_err()
        {
            self.log.log(format_args!("get_csd({:p}) - Register read failed\n", csd.as_ptr()));
            return Err(DiskError::Io);
        }
        Ok(())
    }

    /// Read the 32-bit operation conditions register.
    pub fn get_ocr(&mut self, ocr: &mut u32) -> Result<(), DiskError> {
        let r1 = self.cmd(SD_CMD58_READ_OCR, 0, Some(ocr));
        if r1.has_errors() {
            self.log.log(format_args!(
                "get_ocr() - Register read failed. Response=0x{:02X}\n",
                r1.0
            ));
            return Err(DiskError::Io);
        }
        Ok(())
    }
}
