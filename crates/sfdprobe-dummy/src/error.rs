//! Error types for the dummy SFDP device

use thiserror::Error;

/// Errors reported by [`DummyFlash`](crate::DummyFlash)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DummyError {
    /// Read past the end of the SFDP image
    #[error("SFDP read of {len} bytes at {addr:#x} is out of bounds")]
    OutOfBounds { addr: u32, len: usize },

    /// Read failed on purpose (see `DummyFlash::fail_on_read`)
    #[error("injected fault on read #{0}")]
    InjectedFault(usize),

    /// Opcode is not one of the device's erase types
    #[error("erase opcode {0:#04x} not supported")]
    OpcodeNotSupported(u8),

    /// Erase type not allowed in the region holding the address
    #[error("erase opcode {opcode:#04x} not allowed at {addr:#x}")]
    EraseNotAllowed { opcode: u8, addr: u64 },

    /// Erase address not aligned to the erase size
    #[error("erase at {addr:#x} not aligned to {size} bytes")]
    Misaligned { addr: u64, size: u32 },

    /// Erase block extends past its region or the device
    #[error("erase of {size} bytes at {addr:#x} crosses a region boundary")]
    CrossesRegion { addr: u64, size: u32 },

    /// Programming past the end of the flash array
    #[error("program of {len} bytes at {addr:#x} is out of bounds")]
    ProgramOutOfBounds { addr: u64, len: usize },
}

/// Result type for dummy device operations
pub type Result<T> = std::result::Result<T, DummyError>;
