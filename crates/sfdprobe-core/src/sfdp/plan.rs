//! Erase planning
//!
//! Turns an erase request into the sequence of erase commands a driver
//! issues, walking the regions of a [`CapabilityRecord`] and picking an
//! erase type for every step.

use core::iter::FusedIterator;

use crate::error::{Error, Result};

use super::region::select_erase_type;
use super::types::*;

/// One erase command of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct EraseCommand {
    /// First byte erased
    pub address: u64,
    /// Erase opcode
    pub opcode: u8,
    /// Bytes erased
    pub size: u32,
}

impl EraseCommand {
    /// One past the last byte erased
    pub fn end(&self) -> u64 {
        self.address + self.size as u64
    }
}

/// Iterator over the erase commands covering a range
///
/// Created by [`CapabilityRecord::erase_plan`]. Yields `Err` at most once;
/// the plan is finished afterwards.
#[derive(Debug, Clone)]
pub struct ErasePlan<'a> {
    caps: &'a CapabilityRecord,
    addr: u64,
    end: u64,
    region: usize,
    finished: bool,
}

impl ErasePlan<'_> {
    /// Bytes not yet covered by a yielded command
    pub fn remaining(&self) -> u64 {
        if self.finished {
            0
        } else {
            self.end - self.addr
        }
    }

    fn next_command(&self) -> Result<EraseCommand> {
        if let Some(opcode) = self.caps.legacy_erase_opcode {
            return Ok(EraseCommand {
                address: self.addr,
                opcode,
                size: LEGACY_ERASE_SIZE,
            });
        }

        let remaining = self.end - self.addr;
        let region = self.caps.regions[self.region];
        let erase_types = &self.caps.erase_types;

        // Largest type that fits and is aligned at the current address
        let mut candidates = region.erase_types;
        while let Ok(index) = select_erase_type(
            candidates,
            erase_types,
            remaining,
            self.addr,
            region.high_boundary,
        ) {
            let erase_type = erase_types[index];
            if self.addr % erase_type.size as u64 == 0 {
                return Ok(command(self.addr, erase_type));
            }
            candidates.remove(EraseTypeMask::for_index(index));
        }

        // Nothing strictly smaller fits: finish with the region's smallest unit
        let index = self
            .caps
            .smallest_type_in(&region)
            .ok_or(Error::NoEraseTypeForRegion)?;
        let erase_type = erase_types[index];
        let size = erase_type.size as u64;

        if self.addr % size != 0 || size > remaining {
            log::error!(
                "Erase at 0x{:X} not aligned to {} byte unit ({} bytes left)",
                self.addr,
                size,
                remaining
            );
            return Err(Error::InvalidAlignment);
        }
        if !region.contains(self.addr + size - 1) {
            log::error!(
                "Erase of {} bytes at 0x{:X} crosses region end 0x{:X}",
                size,
                self.addr,
                region.high_boundary
            );
            return Err(Error::NoEraseTypeForRegion);
        }

        Ok(command(self.addr, erase_type))
    }
}

fn command(address: u64, erase_type: EraseType) -> EraseCommand {
    EraseCommand {
        address,
        // Only supported types reach here
        opcode: erase_type.opcode.unwrap_or(LEGACY_ERASE_UNSUPPORTED),
        size: erase_type.size,
    }
}

impl Iterator for ErasePlan<'_> {
    type Item = Result<EraseCommand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.addr >= self.end {
            self.finished = true;
            return None;
        }

        match self.next_command() {
            Ok(cmd) => {
                log::trace!(
                    "Erase 0x{:02X} at 0x{:08X} ({} bytes)",
                    cmd.opcode,
                    cmd.address,
                    cmd.size
                );
                self.addr = cmd.end();
                let high = self.caps.regions[self.region].high_boundary;
                if self.addr < self.end && self.addr > high {
                    self.region += 1;
                }
                Some(Ok(cmd))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for ErasePlan<'_> {}

impl CapabilityRecord {
    /// Plan the erase of `[offset, offset + len)`
    ///
    /// The range is validated up front: it must lie within the device and
    /// both ends must be aligned to the smallest erase unit of their
    /// regions. An empty range yields an empty plan.
    ///
    /// # Example
    ///
    /// ```ignore
    /// for cmd in caps.erase_plan(0x10000, 0x20000)? {
    ///     let cmd = cmd?;
    ///     flash.erase(cmd.opcode, cmd.address)?;
    /// }
    /// ```
    pub fn erase_plan(&self, offset: u64, len: u64) -> Result<ErasePlan<'_>> {
        self.check_erase_alignment(offset, len)?;

        let region = if len == 0 {
            0
        } else {
            self.locate_region(offset)?
        };

        log::debug!(
            "Erase plan 0x{:X}..0x{:X} starting in region {}",
            offset,
            offset + len,
            region
        );

        Ok(ErasePlan {
            caps: self,
            addr: offset,
            end: offset + len,
            region,
            finished: len == 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn region(low: u64, size: u64, erase_types: EraseTypeMask) -> Region {
        Region {
            size,
            high_boundary: low + size - 1,
            erase_types,
        }
    }

    fn record(regions: &[Region]) -> CapabilityRecord {
        let erase_types = [
            EraseType::from_raw(12, 0x20),
            EraseType::from_raw(15, 0x52),
            EraseType::from_raw(16, 0xD8),
            EraseType::UNSUPPORTED,
        ];
        let device_size = regions.iter().map(|r| r.size).sum();

        CapabilityRecord {
            revision: SfdpRevision::new(1, 6),
            parameter_headers: 2,
            device_size,
            page_size: 256,
            address_mode: AddressMode::ThreeByteOnly,
            legacy_erase_opcode: None,
            erase_types,
            regions: Regions::from_slice(regions).unwrap(),
            common_min_erase_size: 4096,
        }
    }

    /// 2 MiB: 64K of 4K/32K, 1920K of 4K/64K, 64K of 4K/32K
    fn hybrid_record() -> CapabilityRecord {
        let small = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_2;
        let large = EraseTypeMask::TYPE_1 | EraseTypeMask::TYPE_3;
        record(&[
            region(0, 0x1_0000, small),
            region(0x1_0000, 0x1E_0000, large),
            region(0x1F_0000, 0x1_0000, small),
        ])
    }

    /// Collect a plan and check it covers the range exactly, with every
    /// command aligned, inside one region and using an allowed type
    fn checked_plan(caps: &CapabilityRecord, offset: u64, len: u64) -> Vec<EraseCommand> {
        let plan: Vec<EraseCommand> = caps
            .erase_plan(offset, len)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let mut addr = offset;
        for cmd in &plan {
            assert_eq!(cmd.address, addr, "commands must be contiguous");
            assert_eq!(cmd.address % cmd.size as u64, 0, "misaligned {:?}", cmd);

            let region = caps.region(caps.locate_region(cmd.address).unwrap()).unwrap();
            assert!(region.contains(cmd.end() - 1), "{:?} crosses region", cmd);
            assert!(
                (0..4).any(|i| region.erase_types.has_index(i)
                    && caps.erase_types()[i].opcode == Some(cmd.opcode)
                    && caps.erase_types()[i].size == cmd.size),
                "{:?} uses a type not allowed in its region",
                cmd
            );
            addr = cmd.end();
        }
        assert_eq!(addr, offset + len);
        plan
    }

    #[test]
    fn test_plan_within_region() {
        let caps = hybrid_record();
        let plan = checked_plan(&caps, 0, 0x1_0000);

        // One 32K block, then 4K sectors: 32K never qualifies for exactly 32K
        assert_eq!(plan.len(), 9);
        assert_eq!(
            plan[0],
            EraseCommand {
                address: 0,
                opcode: 0x52,
                size: 32768
            }
        );
        assert!(plan[1..].iter().all(|c| c.opcode == 0x20 && c.size == 4096));
    }

    #[test]
    fn test_plan_crosses_regions() {
        let caps = hybrid_record();
        let plan = checked_plan(&caps, 0x8000, 0x3_0000);

        let blocks: Vec<u64> = plan
            .iter()
            .filter(|c| c.size == 65536)
            .map(|c| c.address)
            .collect();
        assert_eq!(blocks, [0x1_0000, 0x2_0000]);
        assert_eq!(plan.len(), 18);
    }

    #[test]
    fn test_plan_skips_misaligned_types() {
        let caps = hybrid_record();
        let plan = checked_plan(&caps, 0x1_F000, 0x2_1000);

        // 64K fits by size at 0x1F000 but is not aligned there
        assert_eq!(plan[0].size, 4096);
        assert_eq!(plan[1].address, 0x2_0000);
        assert_eq!(plan[1].size, 65536);
    }

    #[test]
    fn test_plan_single_block_region() {
        let caps = record(&[
            region(0, 0x1_0000, EraseTypeMask::TYPE_3),
            region(0x1_0000, 0x1_0000, EraseTypeMask::TYPE_1),
        ]);

        let plan = checked_plan(&caps, 0, 0x1_0000);
        assert_eq!(
            plan,
            [EraseCommand {
                address: 0,
                opcode: 0xD8,
                size: 65536
            }]
        );
    }

    #[test]
    fn test_plan_rejects_bad_ranges() {
        let caps = hybrid_record();

        assert_eq!(
            caps.erase_plan(0x800, 0x1000).err(),
            Some(Error::InvalidAlignment)
        );
        assert_eq!(
            caps.erase_plan(0x1F_0000, 0x2_0000).err(),
            Some(Error::OffsetOutOfRange)
        );
        // End inside a 64K-only region must be 64K aligned
        let caps = record(&[
            region(0, 0x1_0000, EraseTypeMask::TYPE_1),
            region(0x1_0000, 0x1_0000, EraseTypeMask::TYPE_3),
        ]);
        assert_eq!(
            caps.erase_plan(0xF000, 0x2000).err(),
            Some(Error::InvalidAlignment)
        );
    }

    #[test]
    fn test_plan_empty_range() {
        let caps = hybrid_record();
        let mut plan = caps.erase_plan(0x1000, 0).unwrap();
        assert_eq!(plan.remaining(), 0);
        assert!(plan.next().is_none());
    }

    #[test]
    fn test_plan_fuses_after_error() {
        // 64K-only region starting at a 4K boundary
        let caps = record(&[
            region(0, 0x1000, EraseTypeMask::TYPE_1),
            region(0x1000, 0x1_F000, EraseTypeMask::TYPE_3),
        ]);

        let mut plan = caps.erase_plan(0, 0x2_0000).unwrap();
        assert_eq!(plan.next().unwrap().unwrap().size, 4096);
        assert_eq!(plan.next(), Some(Err(Error::InvalidAlignment)));
        assert_eq!(plan.next(), None);
        assert_eq!(plan.remaining(), 0);
    }

    #[test]
    fn test_plan_legacy_erase() {
        let mut caps = hybrid_record();
        caps.legacy_erase_opcode = Some(0x20);
        caps.erase_types = [EraseType::UNSUPPORTED; 4];
        for region in caps.regions.iter_mut() {
            region.erase_types = EraseTypeMask::empty();
        }

        let plan: Vec<EraseCommand> = caps
            .erase_plan(0x1000, 0x3000)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|c| c.opcode == 0x20 && c.size == 4096));
        assert_eq!(plan[2].address, 0x3000);

        assert_eq!(
            caps.erase_plan(0x800, 0x1000).err(),
            Some(Error::InvalidAlignment)
        );
    }

    #[test]
    fn test_record_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CapabilityRecord>();
    }
}
