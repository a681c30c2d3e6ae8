//! The subset of SD commands this driver speaks, as typed descriptors.

use core::fmt;

/// Response formats a command can produce in SPI mode. Everything starts
/// with the 1-byte R1; the rest is a tail read right after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    R1,
    /// R1 followed by the 4-byte interface condition echo.
    R1R7,
    /// R1 followed by the 4-byte OCR.
    R1R3,
    /// R1 followed by the second status byte.
    R1R2,
}

/// One SD command as issued on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdCommand {
    pub index: u8,
    /// Application commands must be preceded on the wire by CMD55.
    pub app_command: bool,
    pub response: ResponseKind,
}

impl fmt::Display for SdCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.app_command {
            write!(f, "ACMD{}", self.index)
        } else {
            write!(f, "CMD{}", self.index)
        }
    }
}

const fn cmd(index: u8, response: ResponseKind) -> SdCommand {
    SdCommand { index, app_command: false, response }
}

const fn acmd(index: u8, response: ResponseKind) -> SdCommand {
    SdCommand { index, app_command: true, response }
}

/// GO_IDLE_STATE: reset the card; entering SPI mode happens here.
pub const SD_CMD0_GO_IDLE_STATE: SdCommand = cmd(0, ResponseKind::R1);
/// SEND_IF_COND: voltage check that doubles as the v2 detection probe.
pub const SD_CMD8_SEND_IF_COND: SdCommand = cmd(8, ResponseKind::R1R7);
/// SEND_CSD: card specific data, returned as a 16-byte data block.
pub const SD_CMD9_SEND_CSD: SdCommand = cmd(9, ResponseKind::R1);
/// SEND_CID: card identification, returned as a 16-byte data block.
pub const SD_CMD10_SEND_CID: SdCommand = cmd(10, ResponseKind::R1);
/// STOP_TRANSMISSION: terminate a multiple block read.
pub const SD_CMD12_STOP_TRANSMISSION: SdCommand = cmd(12, ResponseKind::R1);
/// SEND_STATUS: two byte card status.
pub const SD_CMD13_SEND_STATUS: SdCommand = cmd(13, ResponseKind::R1R2);
/// SET_BLOCKLEN: fix the block length; only needed on standard capacity.
pub const SD_CMD16_SET_BLOCKLEN: SdCommand = cmd(16, ResponseKind::R1);
/// READ_SINGLE_BLOCK.
pub const SD_CMD17_READ_SINGLE_BLOCK: SdCommand = cmd(17, ResponseKind::R1);
/// READ_MULTIPLE_BLOCK: streams until STOP_TRANSMISSION.
pub const SD_CMD18_READ_MULTIPLE_BLOCK: SdCommand = cmd(18, ResponseKind::R1);
/// WRITE_BLOCK.
pub const SD_CMD24_WRITE_BLOCK: SdCommand = cmd(24, ResponseKind::R1);
/// WRITE_MULTIPLE_BLOCK: streams until the stop tran token.
pub const SD_CMD25_WRITE_MULTIPLE_BLOCK: SdCommand = cmd(25, ResponseKind::R1);
/// APP_CMD: prefix announcing an application command.
pub const SD_CMD55_APP_CMD: SdCommand = cmd(55, ResponseKind::R1);
/// READ_OCR: operation conditions register, carries the CCS bit.
pub const SD_CMD58_READ_OCR: SdCommand = cmd(58, ResponseKind::R1R3);
/// CRC_ON_OFF: bit 0 of the argument enables CRC checking in SPI mode.
pub const SD_CMD59_CRC_ON_OFF: SdCommand = cmd(59, ResponseKind::R1);
/// SEND_NUM_WR_BLOCKS: how many blocks of a write actually landed.
pub const SD_ACMD22_SEND_NUM_WR_BLOCKS: SdCommand = acmd(22, ResponseKind::R1);
/// SET_WR_BLK_ERASE_COUNT: pre-erase hint ahead of a multiple block write.
pub const SD_ACMD23_SET_WR_BLK_ERASE_COUNT: SdCommand = acmd(23, ResponseKind::R1);
/// SD_SEND_OP_COND: starts card initialization; polled until not idle.
pub const SD_ACMD41_SD_SEND_OP_COND: SdCommand = acmd(41, ResponseKind::R1);

/// CMD59 argument bit enabling CRC.
pub const CMD59_CRC_OPTION: u32 = 1;
/// CMD8 argument: host supplies 2.7-3.6V.
pub const CMD8_VHS_2_7_3_6V: u32 = 1 << 8;
/// CMD8 argument: arbitrary pattern the card must echo back.
pub const CMD8_CHECK_PATTERN: u32 = 0xAD;
/// ACMD41 argument: host supports high capacity cards.
pub const ACMD41_HCS: u32 = 1 << 30;
