//! Region lookup and erase type selection
//!
//! Runtime queries against a [`CapabilityRecord`]. None of them touch the
//! device; they only read the record, so any number of callers may share it.

use crate::error::{Error, Result};

use super::types::*;

/// Erase type picked for one erase step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct EraseChoice {
    /// Erase type index (0-3)
    pub index: usize,
    /// Opcode to issue
    pub opcode: u8,
    /// Bytes erased by one command
    pub size: u32,
}

/// Find the region containing `offset`
///
/// `offset == device_size` is accepted and maps to the last region, so an
/// exclusive end address can be looked up as well.
pub fn locate_region(regions: &[Region], device_size: u64, offset: u64) -> Result<usize> {
    if offset > device_size || regions.is_empty() {
        log::error!("Offset 0x{:X} out of range", offset);
        return Err(Error::OffsetOutOfRange);
    }

    if regions.len() == 1 {
        return Ok(0);
    }

    for i in (0..regions.len() - 1).rev() {
        if offset > regions[i].high_boundary {
            return Ok(i + 1);
        }
    }

    Ok(0)
}

/// Pick the largest erase type that fits the request
///
/// Candidates are scanned from type 4 down to type 1. A type qualifies when
/// it is strictly smaller than the remaining request and strictly smaller
/// than the distance from `offset` to the region's high boundary. The
/// caller's candidate set is not modified.
pub fn select_erase_type(
    candidates: EraseTypeMask,
    erase_types: &[EraseType; 4],
    size: u64,
    offset: u64,
    high_boundary: u64,
) -> Result<usize> {
    let mut working = candidates & supported_mask(erase_types);
    let remaining = high_boundary.saturating_sub(offset);

    for i in (0..4).rev() {
        if !working.has_index(i) {
            continue;
        }

        let type_size = erase_types[i].size as u64;
        if size > type_size && remaining > type_size {
            log::trace!(
                "Selected erase type {} ({} bytes) at 0x{:X}",
                i + 1,
                type_size,
                offset
            );
            return Ok(i);
        }
        working.remove(EraseTypeMask::for_index(i));
    }

    debug_assert!(working.is_empty());
    log::debug!(
        "No erase type fits {} bytes at 0x{:X} (region ends 0x{:X})",
        size,
        offset,
        high_boundary
    );
    Err(Error::NoEraseTypeForRegion)
}

impl CapabilityRecord {
    /// Index of the region containing `offset`
    pub fn locate_region(&self, offset: u64) -> Result<usize> {
        locate_region(&self.regions, self.device_size, offset)
    }

    /// Region by index
    pub fn region(&self, index: usize) -> Result<&Region> {
        self.regions.get(index).ok_or(Error::InvalidRegion(index))
    }

    /// Pick the erase type for `size` bytes at `offset` within a region
    pub fn select_erase_type(
        &self,
        region_index: usize,
        offset: u64,
        size: u64,
    ) -> Result<EraseChoice> {
        let region = self.region(region_index)?;
        let index = select_erase_type(
            region.erase_types,
            &self.erase_types,
            size,
            offset,
            region.high_boundary,
        )?;

        let erase_type = self.erase_types[index];
        Ok(EraseChoice {
            index,
            // Only supported types are ever selected
            opcode: erase_type.opcode.unwrap_or(LEGACY_ERASE_UNSUPPORTED),
            size: erase_type.size,
        })
    }

    /// Smallest erase granularity usable at `offset`
    ///
    /// Devices without erase types report the legacy 4 KiB unit.
    pub fn min_erase_size_at(&self, offset: u64) -> Result<u32> {
        if self.legacy_erase_opcode.is_some() {
            if offset >= self.device_size {
                return Err(Error::OffsetOutOfRange);
            }
            return Ok(LEGACY_ERASE_SIZE);
        }

        let region = &self.regions[self.locate_region(offset)?];
        self.smallest_type_in(region)
            .map(|i| self.erase_types[i].size)
            .ok_or(Error::NoEraseTypeForRegion)
    }

    /// Check that `[offset, offset + len)` can be erased exactly
    ///
    /// The start must sit on an erase boundary of its region and the end on
    /// one of the region holding the last byte.
    pub fn check_erase_alignment(&self, offset: u64, len: u64) -> Result<()> {
        let end = offset.checked_add(len).ok_or(Error::OffsetOutOfRange)?;
        if end > self.device_size {
            log::error!(
                "Range 0x{:X}..0x{:X} exceeds device size 0x{:X}",
                offset,
                end,
                self.device_size
            );
            return Err(Error::OffsetOutOfRange);
        }
        if len == 0 {
            return Ok(());
        }

        let start_unit = self.min_erase_size_at(offset)? as u64;
        let end_unit = self.min_erase_size_at(end - 1)? as u64;
        if offset % start_unit != 0 || end % end_unit != 0 {
            log::error!(
                "Range 0x{:X}..0x{:X} not aligned to erase size ({} / {} bytes)",
                offset,
                end,
                start_unit,
                end_unit
            );
            return Err(Error::InvalidAlignment);
        }

        Ok(())
    }

    /// Index of the smallest supported erase type usable in `region`
    pub(crate) fn smallest_type_in(&self, region: &Region) -> Option<usize> {
        (0..4)
            .filter(|&i| region.erase_types.has_index(i) && self.erase_types[i].is_supported())
            .min_by_key(|&i| self.erase_types[i].size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [EraseType; 4] = [
        EraseType { opcode: Some(0x20), size: 4096 },
        EraseType { opcode: Some(0x52), size: 32768 },
        EraseType { opcode: Some(0xD8), size: 65536 },
        EraseType { opcode: Some(0xDC), size: 131072 },
    ];

    fn region(low: u64, size: u64, erase_types: EraseTypeMask) -> Region {
        Region {
            size,
            high_boundary: low + size - 1,
            erase_types,
        }
    }

    /// 2 MiB: 64K of 4K/32K, 1920K of 4K/64K, 64K of 4K/32K
    fn hybrid_record() -> CapabilityRecord {
        let small = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_2;
        let large = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_3;

        let mut regions = Regions::new();
        regions.push(region(0, 0x1_0000, small)).unwrap();
        regions.push(region(0x1_0000, 0x1E_0000, large)).unwrap();
        regions.push(region(0x1F_0000, 0x1_0000, small)).unwrap();

        let mut erase_types = SIZES;
        erase_types[3] = EraseType::UNSUPPORTED;

        CapabilityRecord {
            revision: SfdpRevision::new(1, 6),
            parameter_headers: 2,
            device_size: 0x20_0000,
            page_size: 256,
            address_mode: AddressMode::ThreeByteOnly,
            legacy_erase_opcode: None,
            erase_types,
            regions,
            common_min_erase_size: 4096,
        }
    }

    #[test]
    fn test_locate_region_boundaries() {
        let caps = hybrid_record();

        assert_eq!(caps.locate_region(0), Ok(0));
        assert_eq!(caps.locate_region(0x0_FFFF), Ok(0));
        assert_eq!(caps.locate_region(0x1_0000), Ok(1));
        assert_eq!(caps.locate_region(0x1E_FFFF), Ok(1));
        assert_eq!(caps.locate_region(0x1F_0000), Ok(2));
        assert_eq!(caps.locate_region(0x1F_FFFF), Ok(2));
        // Exclusive end of the device
        assert_eq!(caps.locate_region(0x20_0000), Ok(2));
        assert_eq!(caps.locate_region(0x20_0001), Err(Error::OffsetOutOfRange));
    }

    #[test]
    fn test_locate_region_single_and_empty() {
        let single = [region(0, 0x1000, EraseTypeMask::TYPE_1)];
        assert_eq!(locate_region(&single, 0x1000, 0xFFF), Ok(0));
        assert_eq!(locate_region(&single, 0x1000, 0x1000), Ok(0));
        assert_eq!(
            locate_region(&single, 0x1000, 0x1001),
            Err(Error::OffsetOutOfRange)
        );
        assert_eq!(locate_region(&[], 0x1000, 0), Err(Error::OffsetOutOfRange));
    }

    #[test]
    fn test_select_largest_fitting_type() {
        // 50000 bytes at 0 of a large region: 32K is the largest below 50000
        let index = select_erase_type(EraseTypeMask::all(), &SIZES, 50000, 0, 0xFF_FFFF);
        assert_eq!(index, Ok(1));
    }

    #[test]
    fn test_select_respects_region_boundary() {
        // 128K left before the boundary: 128K is not strictly smaller
        let index = select_erase_type(
            EraseTypeMask::all(),
            &SIZES,
            300000,
            0x10_0000 - 131072 - 1,
            0x0F_FFFF,
        );
        assert_eq!(index, Ok(2));
    }

    #[test]
    fn test_select_equal_size_not_chosen() {
        // A request of exactly one 4K sector never qualifies
        assert_eq!(
            select_erase_type(EraseTypeMask::TYPE_1, &SIZES, 4096, 0, 0xFFFF),
            Err(Error::NoEraseTypeForRegion)
        );
    }

    #[test]
    fn test_select_leaves_candidates_untouched() {
        let candidates = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_4;
        let first = select_erase_type(candidates, &SIZES, 8192, 0, 0xFFFF);
        let second = select_erase_type(candidates, &SIZES, 8192, 0, 0xFFFF);
        assert_eq!(first, Ok(0));
        assert_eq!(first, second);
        assert_eq!(candidates, EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_4);
    }

    #[test]
    fn test_select_skips_unimplemented() {
        let mut erase_types = SIZES;
        erase_types[3] = EraseType::UNSUPPORTED;
        // Type 4 in the mask but not implemented; offset past the boundary
        assert_eq!(
            select_erase_type(EraseTypeMask::TYPE_4, &erase_types, 1 << 20, 0, 0xF_FFFF),
            Err(Error::NoEraseTypeForRegion)
        );
        assert_eq!(
            select_erase_type(EraseTypeMask::all(), &erase_types, 1 << 20, 0x2000, 0x1000),
            Err(Error::NoEraseTypeForRegion)
        );
    }

    #[test]
    fn test_record_select_erase_type() {
        let caps = hybrid_record();

        let choice = caps.select_erase_type(1, 0x1_0000, 0x4_0000).unwrap();
        assert_eq!(
            choice,
            EraseChoice {
                index: 2,
                opcode: 0xD8,
                size: 65536
            }
        );

        let choice = caps.select_erase_type(0, 0, 0x4_0000).unwrap();
        assert_eq!(choice.opcode, 0x52);

        assert_eq!(
            caps.select_erase_type(3, 0, 0x1000),
            Err(Error::InvalidRegion(3))
        );
    }

    #[test]
    fn test_min_erase_size_at() {
        let mut caps = hybrid_record();
        assert_eq!(caps.min_erase_size_at(0x8000), Ok(4096));

        caps.regions[1].erase_types = EraseTypeMask::TYPE_3;
        assert_eq!(caps.min_erase_size_at(0x2_0000), Ok(65536));

        caps.regions[1].erase_types = EraseTypeMask::empty();
        assert_eq!(
            caps.min_erase_size_at(0x2_0000),
            Err(Error::NoEraseTypeForRegion)
        );
    }

    #[test]
    fn test_min_erase_size_legacy() {
        let mut caps = hybrid_record();
        caps.legacy_erase_opcode = Some(0x20);
        caps.erase_types = [EraseType::UNSUPPORTED; 4];

        assert_eq!(caps.min_erase_size_at(0x1_2000), Ok(LEGACY_ERASE_SIZE));
        assert_eq!(
            caps.min_erase_size_at(0x20_0000),
            Err(Error::OffsetOutOfRange)
        );
    }

    #[test]
    fn test_check_erase_alignment() {
        let mut caps = hybrid_record();
        caps.regions[1].erase_types = EraseTypeMask::TYPE_3;

        assert_eq!(caps.check_erase_alignment(0x1000, 0xF000), Ok(()));
        assert_eq!(caps.check_erase_alignment(0x0, 0x20_0000), Ok(()));
        assert_eq!(caps.check_erase_alignment(0x1F_F000, 0), Ok(()));

        // End lands inside a 64K-only region
        assert_eq!(
            caps.check_erase_alignment(0xF000, 0x2000),
            Err(Error::InvalidAlignment)
        );
        assert_eq!(
            caps.check_erase_alignment(0x800, 0x1000),
            Err(Error::InvalidAlignment)
        );
        assert_eq!(
            caps.check_erase_alignment(0x1F_F000, 0x2000),
            Err(Error::OffsetOutOfRange)
        );
        assert_eq!(
            caps.check_erase_alignment(u64::MAX, 2),
            Err(Error::OffsetOutOfRange)
        );
    }
}
