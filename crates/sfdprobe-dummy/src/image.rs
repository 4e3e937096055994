//! SFDP image synthesis
//!
//! Builds the SFDP address space of an emulated chip from a
//! [`DummyConfig`]: SFDP header, parameter headers, Basic Flash Parameter
//! Table, optional Sector Map and vendor tables.

use sfdprobe_core::sfdp::{
    bfpt, AddressMode, EraseType, EraseTypeMask, Region, SfdpRevision, PARAM_ID_BASIC,
    PARAM_ID_SECTOR_MAP, SFDP_HEADER_SIZE, SFDP_SIGNATURE,
};

/// Basic table length written when the config does not override it
pub const DEFAULT_BFPT_DWORDS: u8 = 16;

/// One sector map region of the emulated chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyRegion {
    /// Region size in bytes (multiple of 256)
    pub size: u64,
    /// Erase types usable in the region
    pub erase_types: EraseTypeMask,
}

/// Vendor-specific parameter table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorTable {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Table contents (padded to whole DWORDs)
    pub data: Vec<u8>,
}

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// SFDP revision in the main header
    pub revision: SfdpRevision,
    /// Flash size in bytes
    pub size: u64,
    /// Page size exponent (page = 2^N)
    pub page_size_exp: u8,
    /// Address bytes advertised in DWORD 1
    pub address_mode: AddressMode,
    /// Legacy 4 KiB erase opcode (0xFF = unsupported)
    pub legacy_erase_opcode: u8,
    /// Erase types 1-4
    pub erase_types: [EraseType; 4],
    /// Basic table length in DWORDs
    pub bfpt_dwords: u8,
    /// Sector map regions (empty: no sector map table)
    pub regions: Vec<DummyRegion>,
    /// Vendor tables, listed between the Basic and Sector Map headers
    pub vendor_tables: Vec<VendorTable>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self::uniform()
    }
}

impl DummyConfig {
    /// 16 MiB chip with 4K/32K/64K erase types and no sector map (W25Q128-like)
    pub fn uniform() -> Self {
        Self {
            revision: SfdpRevision::new(1, 6),
            size: 16 * 1024 * 1024,
            page_size_exp: 8,
            address_mode: AddressMode::ThreeByteOnly,
            legacy_erase_opcode: 0x20,
            erase_types: [
                EraseType::from_raw(12, 0x20),
                EraseType::from_raw(15, 0x52),
                EraseType::from_raw(16, 0xD8),
                EraseType::UNSUPPORTED,
            ],
            bfpt_dwords: DEFAULT_BFPT_DWORDS,
            regions: Vec::new(),
            vendor_tables: Vec::new(),
        }
    }

    /// 2 MiB chip with 64 KiB of 4K/32K sectors at each end and 4K/64K
    /// blocks in between
    pub fn hybrid() -> Self {
        let small = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_2;
        let large = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_3;

        Self {
            size: 2 * 1024 * 1024,
            regions: vec![
                DummyRegion {
                    size: 0x1_0000,
                    erase_types: small,
                },
                DummyRegion {
                    size: 0x1E_0000,
                    erase_types: large,
                },
                DummyRegion {
                    size: 0x1_0000,
                    erase_types: small,
                },
            ],
            vendor_tables: vec![VendorTable {
                id: 0xFFC2,
                data: vec![0x00, 0x36, 0x00, 0x27, 0xF4, 0x4F, 0xFF, 0xFF],
            }],
            ..Self::uniform()
        }
    }

    /// 4 MiB JESD216 rev 1.0 chip with an 8 DWORD table: legacy 4K erase only
    pub fn legacy() -> Self {
        Self {
            revision: SfdpRevision::new(1, 0),
            size: 4 * 1024 * 1024,
            erase_types: [EraseType::UNSUPPORTED; 4],
            bfpt_dwords: 8,
            ..Self::uniform()
        }
    }

    /// Page size in bytes
    pub fn page_size(&self) -> u32 {
        1 << self.page_size_exp
    }

    /// Region list as the probe reports it (a single region without a map)
    pub fn effective_regions(&self) -> Vec<DummyRegion> {
        if !self.regions.is_empty() {
            return self.regions.clone();
        }

        let erase_types = self
            .erase_types
            .iter()
            .enumerate()
            .filter(|(_, et)| et.is_supported())
            .fold(EraseTypeMask::empty(), |mask, (i, _)| {
                mask | EraseTypeMask::for_index(i)
            });
        vec![DummyRegion {
            size: self.size,
            erase_types,
        }]
    }

    /// Effective regions placed at their addresses
    pub fn region_layout(&self) -> Vec<Region> {
        let mut low = 0u64;
        self.effective_regions()
            .into_iter()
            .map(|region| {
                let placed = Region {
                    size: region.size,
                    high_boundary: low + region.size - 1,
                    erase_types: region.erase_types,
                };
                low += region.size;
                placed
            })
            .collect()
    }

    /// Build the SFDP image
    pub fn build_image(&self) -> Vec<u8> {
        let bfpt = self.basic_table();
        let map = self.sector_map();

        // (id, revision, table)
        let mut tables: Vec<(u16, SfdpRevision, Vec<u8>)> = Vec::new();
        tables.push((PARAM_ID_BASIC, self.revision, bfpt));
        for vendor in &self.vendor_tables {
            let mut data = vendor.data.clone();
            data.resize(data.len().div_ceil(4) * 4, 0xFF);
            tables.push((vendor.id, SfdpRevision::new(1, 0), data));
        }
        if let Some(map) = map {
            tables.push((PARAM_ID_SECTOR_MAP, SfdpRevision::new(1, 0), map));
        }

        let mut image = Vec::new();
        image.extend_from_slice(&SFDP_SIGNATURE);
        image.push(self.revision.minor);
        image.push(self.revision.major);
        image.push((tables.len() - 1) as u8);
        image.push(0xFF);

        let mut pointer = SFDP_HEADER_SIZE * (tables.len() + 1);
        for (id, revision, data) in &tables {
            let dword2 = ((*id as u32 >> 8) << 24) | (pointer as u32 & 0x00FF_FFFF);
            image.push(*id as u8);
            image.push(revision.minor);
            image.push(revision.major);
            image.push((data.len() / 4) as u8);
            image.extend_from_slice(&dword2.to_le_bytes());
            pointer += data.len();
        }

        for (_, _, data) in &tables {
            image.extend_from_slice(data);
        }

        log::debug!(
            "Built SFDP image: {} bytes, {} parameter table(s)",
            image.len(),
            tables.len()
        );
        image
    }

    /// Encode the density DWORD (bits minus one, or 2^N above 2 Gbit)
    fn density(&self) -> u32 {
        let bits = self.size * 8;
        if bits <= 1 << 31 {
            (bits - 1) as u32
        } else {
            0x8000_0000 | (63 - bits.leading_zeros())
        }
    }

    fn basic_table(&self) -> Vec<u8> {
        let mut table = vec![0xFF; self.bfpt_dwords as usize * 4];
        let mut full = [0xFFu8; 80];

        let address_bits = match self.address_mode {
            AddressMode::ThreeByteOnly => 0b00,
            AddressMode::ThreeOrFourByte => 0b01,
            AddressMode::FourByteOnly => 0b10,
        };
        full[0] = 0xE5;
        full[bfpt::LEGACY_ERASE_OPCODE] = self.legacy_erase_opcode;
        full[bfpt::ADDRESS_BYTES] = 0xF1 | (address_bits << 1);
        full[bfpt::DENSITY..bfpt::DENSITY + 4].copy_from_slice(&self.density().to_le_bytes());

        for (et, &(size_offset, opcode_offset)) in
            self.erase_types.iter().zip(bfpt::ERASE_TYPE_FIELDS.iter())
        {
            match et.opcode {
                Some(opcode) => {
                    full[size_offset] = et.size.trailing_zeros() as u8;
                    full[opcode_offset] = opcode;
                }
                None => {
                    full[size_offset] = 0x00;
                    full[opcode_offset] = 0xFF;
                }
            }
        }

        full[bfpt::PAGE_SIZE] = (self.page_size_exp << 4) | 0x02;

        let len = core::cmp::min(table.len(), full.len());
        table[..len].copy_from_slice(&full[..len]);
        table
    }

    fn sector_map(&self) -> Option<Vec<u8>> {
        if self.regions.is_empty() {
            return None;
        }

        let mut table = vec![0xFF, 0x00, (self.regions.len() - 1) as u8, 0xFF];
        for region in &self.regions {
            let units = (region.size / 256).saturating_sub(1) as u32;
            let dword = ((units & 0x00FF_FFFF) << 8) | 0xF0 | region.erase_types.bits() as u32;
            table.extend_from_slice(&dword.to_le_bytes());
        }
        Some(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_layout() {
        let image = DummyConfig::uniform().build_image();

        assert_eq!(&image[..4], b"SFDP");
        // One parameter header (NPH = 0), BFPT right after it
        assert_eq!(image[6], 0);
        assert_eq!(&image[8..16], &[0x00, 0x06, 0x01, 16, 0x10, 0x00, 0x00, 0xFF]);
        assert_eq!(image.len(), 16 + 64);
        // 16 MiB = 128 Mbit
        assert_eq!(&image[0x14..0x18], &0x07FF_FFFFu32.to_le_bytes());
    }

    #[test]
    fn test_hybrid_image_headers() {
        let image = DummyConfig::hybrid().build_image();

        // BFPT, vendor, sector map
        assert_eq!(image[6], 2);
        assert_eq!(image[8 + 7], 0xFF);
        assert_eq!(&image[16..18], &[0xC2, 0x00]);
        assert_eq!(image[16 + 7], 0xFF);
        assert_eq!(image[24], 0x81);

        // Descriptor then three region DWORDs at the very end
        let map = &image[image.len() - 16..];
        assert_eq!(&map[..4], &[0xFF, 0x00, 0x02, 0xFF]);
        assert_eq!(&map[4..8], &[0xF3, 0xFF, 0x00, 0x00]);
        assert_eq!(&map[8..12], &[0xF5, 0xFF, 0x1D, 0x00]);
    }

    #[test]
    fn test_density_encoding() {
        let mut config = DummyConfig::uniform();
        config.size = 2 * 1024 * 1024;
        assert_eq!(config.density(), 0x00FF_FFFF);

        // 8 Gbit uses the 2^N form
        config.size = 1 << 30;
        assert_eq!(config.density(), 0x8000_0021);
    }

    #[test]
    fn test_effective_regions() {
        let uniform = DummyConfig::uniform();
        let regions = uniform.effective_regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].size, uniform.size);
        assert_eq!(
            regions[0].erase_types,
            EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_2 | EraseTypeMask::TYPE_3
        );

        assert_eq!(DummyConfig::hybrid().effective_regions().len(), 3);
    }

    #[test]
    fn test_region_layout() {
        let layout = DummyConfig::hybrid().region_layout();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout[0].low_boundary(), 0);
        assert_eq!(layout[1].low_boundary(), 0x1_0000);
        assert_eq!(layout[1].high_boundary, 0x1E_FFFF);
        assert_eq!(layout[2].high_boundary, 0x1F_FFFF);
        assert!(layout[2].contains(0x1F_0000));
        assert!(!layout[1].contains(0x1F_0000));
    }
}
