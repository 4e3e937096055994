//! sfdprobe-dummy - Emulated SFDP flash for testing
//!
//! This crate provides a dummy flash device that serves a synthesized SFDP
//! image and keeps its array in memory. It's useful for exercising the probe
//! and erase planner without real hardware.
//!
//! # Example
//!
//! ```ignore
//! use sfdprobe_core::sfdp::{self, AccessMode};
//! use sfdprobe_dummy::{DummyConfig, DummyFlash};
//!
//! let mut flash = DummyFlash::new(DummyConfig::hybrid());
//! let caps = sfdp::probe(&mut flash, AccessMode::Qspi)?;
//! for cmd in caps.erase_plan(0, 0x20000)? {
//!     let cmd = cmd?;
//!     flash.erase(cmd.opcode, cmd.address)?;
//! }
//! ```

mod error;
mod image;

pub use error::{DummyError, Result};
pub use image::{DummyConfig, DummyRegion, VendorTable, DEFAULT_BFPT_DWORDS};

use sfdprobe_core::reader::SfdpReader;

/// A single RDSFDP transaction seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    /// Start address
    pub addr: u32,
    /// Bytes requested
    pub len: usize,
}

/// Dummy SFDP flash
///
/// Emulates a flash chip in memory: RDSFDP reads are served from the image
/// built from its [`DummyConfig`], and erases are checked against the
/// configured regions the way the chip would enforce them.
pub struct DummyFlash {
    config: DummyConfig,
    image: Vec<u8>,
    data: Vec<u8>,
    reads: Vec<ReadRecord>,
    fail_on_read: Option<usize>,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let image = config.build_image();
        Self::with_image(config, image)
    }

    /// Create a new dummy flash with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash serving a custom (possibly malformed) SFDP image
    pub fn with_image(config: DummyConfig, image: Vec<u8>) -> Self {
        let data = vec![0xFF; config.size as usize];
        Self {
            config,
            image,
            data,
            reads: Vec::new(),
            fail_on_read: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Get the SFDP image
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Every SFDP read issued so far, in order
    pub fn reads(&self) -> &[ReadRecord] {
        &self.reads
    }

    /// Make the `n`-th SFDP read (0-based, counted from now) fail
    pub fn fail_on_read(&mut self, n: usize) {
        self.fail_on_read = Some(self.reads.len() + n);
    }

    /// Forget recorded reads and pending faults
    pub fn reset_reads(&mut self) {
        self.reads.clear();
        self.fail_on_read = None;
    }

    /// Program bytes; like real flash, bits can only go from 1 to 0
    pub fn program(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let start = addr as usize;
        let target = start
            .checked_add(data.len())
            .and_then(|end| self.data.get_mut(start..end))
            .ok_or(DummyError::ProgramOutOfBounds {
                addr,
                len: data.len(),
            })?;

        for (dst, &src) in target.iter_mut().zip(data) {
            *dst &= src;
        }
        Ok(())
    }

    /// Execute an erase command
    ///
    /// The opcode must belong to an erase type allowed in the region that
    /// holds `addr`, the address must be aligned to that type's size and the
    /// block must not extend past the region.
    pub fn erase(&mut self, opcode: u8, addr: u64) -> Result<()> {
        let size = self.erase_size(opcode)?;

        let region = self
            .config
            .region_layout()
            .into_iter()
            .find(|region| region.contains(addr))
            .ok_or(DummyError::CrossesRegion { addr, size })?;

        let allowed = (0..4).any(|i| {
            region.erase_types.has_index(i) && self.config.erase_types[i].opcode == Some(opcode)
        });
        if !allowed && !self.is_legacy_erase(opcode) {
            return Err(DummyError::EraseNotAllowed { opcode, addr });
        }
        if addr % size as u64 != 0 {
            return Err(DummyError::Misaligned { addr, size });
        }
        if !region.contains(addr + size as u64 - 1) {
            return Err(DummyError::CrossesRegion { addr, size });
        }

        log::debug!("Erasing {} bytes at 0x{:X} (opcode 0x{:02X})", size, addr, opcode);
        let start = addr as usize;
        self.data[start..start + size as usize].fill(0xFF);
        Ok(())
    }

    fn is_legacy_erase(&self, opcode: u8) -> bool {
        self.config.erase_types.iter().all(|et| !et.is_supported())
            && self.config.legacy_erase_opcode == opcode
    }

    fn erase_size(&self, opcode: u8) -> Result<u32> {
        if self.is_legacy_erase(opcode) {
            return Ok(4096);
        }
        self.config
            .erase_types
            .iter()
            .find(|et| et.opcode == Some(opcode))
            .map(|et| et.size)
            .ok_or(DummyError::OpcodeNotSupported(opcode))
    }
}

impl SfdpReader for DummyFlash {
    type Error = DummyError;

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let index = self.reads.len();
        self.reads.push(ReadRecord {
            addr,
            len: buf.len(),
        });

        if self.fail_on_read == Some(index) {
            log::debug!("Injecting fault on SFDP read #{}", index);
            return Err(DummyError::InjectedFault(index));
        }

        let start = addr as usize;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| self.image.get(start..end))
            .ok_or(DummyError::OutOfBounds {
                addr,
                len: buf.len(),
            })?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
