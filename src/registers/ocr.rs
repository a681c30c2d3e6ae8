//! Operation Conditions Register.

use bit_field::BitField;

/// The 32-bit OCR returned by CMD58.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OcrRegister {
    pub val: u32,
}

impl OcrRegister {
    /// VDD window bit for the 3.2-3.3V range.
    pub fn supports_3v3(&self) -> bool {
        self.val.get_bit(20)
    }

    /// CCS: set on high capacity (SDHC/SDXC) cards.
    pub fn card_capacity_status(&self) -> bool {
        self.val.get_bit(30)
    }

    /// Busy bit: clear while the card's power up sequence is still running.
    pub fn card_powered_up_status(&self) -> bool {
        self.val.get_bit(31)
    }
}
