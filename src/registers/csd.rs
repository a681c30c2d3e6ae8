//! Card Specific Data register.

use super::extract_bits;

/// The 16-byte CSD register, raw from the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CsdRegister(pub [u8; 16]);

impl CsdRegister {
    /// CSD_STRUCTURE field: 0 for version 1.0 layouts, 1 for version 2.0.
    pub fn structure_version(&self) -> u32 {
        extract_bits(&self.0, 126, 127)
    }

    /// Total number of 512-byte sectors described by this CSD.
    pub fn sector_count(&self) -> u32 {
        if self.structure_version() == 0 {
            let read_bl_len = extract_bits(&self.0, 80, 83);
            let c_size = extract_bits(&self.0, 62, 73);
            let c_size_mult = extract_bits(&self.0, 47, 49);
            // The trailing -9 converts the byte capacity to 512-byte sectors.
            (c_size + 1) << (c_size_mult + 2 + read_bl_len - 9)
        } else {
            let c_size = extract_bits(&self.0, 48, 69);
            (c_size + 1) << 10
        }
    }
}

impl From<[u8; 16]> for CsdRegister {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version1_sector_count() {
        let csd = CsdRegister([0x3F; 16]);
        assert_eq!(csd.structure_version(), 0);
        assert_eq!(csd.sector_count(), 54_476_800);
    }

    #[test]
    fn version2_sector_count() {
        let csd = CsdRegister([0x7F; 16]);
        assert_eq!(csd.structure_version(), 1);
        assert_eq!(csd.sector_count(), 4_261_281_792);
    }

    // Distinct bytes make the fields straddle byte boundaries with
    // different values on each side, unlike a uniform fill.

    #[test]
    fn version1_sector_count_from_distinct_bytes() {
        let mut bytes = [0u8; 16];
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = index as u8 + 1;
        }
        let csd = CsdRegister(bytes);
        assert_eq!(csd.structure_version(), 0);
        // READ_BL_LEN=6, C_SIZE=3104, C_SIZE_MULT=4: (3104+1) << 3.
        assert_eq!(csd.sector_count(), 24_840);
    }

    #[test]
    fn version2_sector_count_from_distinct_bytes() {
        let mut bytes = [0u8; 16];
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = index as u8 + 1;
        }
        bytes[0] = 0x41;
        let csd = CsdRegister(bytes);
        assert_eq!(csd.structure_version(), 1);
        // C_SIZE=0x08090A: (526602+1) << 10.
        assert_eq!(csd.sector_count(), 539_241_472);
    }
}
