//! R1 responses, block tokens and data-response tokens as the card encodes
//! them in SPI mode.

pub trait Field: Into<u8> {}

pub trait BitField<F: Field>: Copy + Into<u8> {
    fn has(&self, field: F) -> bool {
        let value: u8 = (*self).into();
        value & (1 << field.into()) > 0
    }
}

#[derive(Copy, Clone, Debug)]
#[allow(dead_code)]
pub enum R1ResponseField {
    Idle = 0,
    EraseReset,
    IllegalCommand,
    CommandCrc,
    EraseSequence,
    Address,
    Parameter,
    /// Clear once the byte on the wire is an actual response.
    StartBit,
}

impl From<R1ResponseField> for u8 {
    fn from(field: R1ResponseField) -> u8 {
        field as u8
    }
}

impl Field for R1ResponseField {}

/// The leading response byte every command produces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct R1Response(pub u8);

impl R1Response {
    /// No error, card no longer idle.
    pub const READY: R1Response = R1Response(0x00);
    /// No error, card still in the idle (initializing) state.
    pub const IDLE: R1Response = R1Response(0x01);
    /// Synthetic value returned when no response ever arrived.
    pub const TIMEOUT: R1Response = R1Response(0xFF);

    const ERRORS_MASK: u8 = 0x3F << 1;

    /// The start bit is clear, i.e. this byte is a response at all.
    pub fn is_valid(&self) -> bool {
        !self.has(R1ResponseField::StartBit)
    }

    /// Any error bit set. The idle bit is not an error.
    pub fn has_errors(&self) -> bool {
        self.0 & Self::ERRORS_MASK != 0
    }
}

impl From<u8> for R1Response {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<R1Response> for u8 {
    fn from(response: R1Response) -> u8 {
        response.0
    }
}

impl BitField<R1ResponseField> for R1Response {}

/// Token opening every read block and single-write block.
pub const BLOCK_START: u8 = 0xFE;
/// Token opening each payload block of a multiple block write.
pub const MULTIPLE_BLOCK_START: u8 = 0xFC;
/// Token terminating a multiple block write; carries no payload.
pub const MULTIPLE_BLOCK_STOP: u8 = 0xFD;

/// Data-response token the card returns after each transmitted block,
/// reduced to its meaningful low five bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataResponse(pub u8);

impl DataResponse {
    pub const ACCEPTED: DataResponse = DataResponse(0b0_0101);
    pub const CRC_ERROR: DataResponse = DataResponse(0b0_1011);
    pub const WRITE_ERROR: DataResponse = DataResponse(0b0_1101);
    /// Synthetic code for failures with no token to decode.
    pub const UNKNOWN_ERROR: DataResponse = DataResponse(0x1E);

    pub fn from_wire(byte: u8) -> Self {
        DataResponse(byte & 0x1F)
    }

    pub fn accepted(&self) -> bool {
        *self == Self::ACCEPTED
    }
}
