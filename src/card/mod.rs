//! What the driver learns about the inserted card during initialization.

/// Which SD physical layer generation the card answered CMD8 as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardVersion {
    V1,
    V2,
}

/// Addressing class reported through the OCR's CCS bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardCapacity {
    /// SDSC: read/write commands take byte addresses.
    Standard,
    /// SDHC/SDXC: read/write commands take block numbers directly.
    High,
}

impl CardCapacity {
    /// Left shift that turns a block number into a command address.
    pub fn address_shift(&self) -> u32 {
        match self {
            CardCapacity::Standard => 9,
            CardCapacity::High => 0,
        }
    }
}

/// Immutable card description produced by a successful `initialize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CardProfile {
    pub version: CardVersion,
    pub capacity: CardCapacity,
}
