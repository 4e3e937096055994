//! sfdprobe-core - SFDP capability discovery for SPI NOR flash
//!
//! This crate reads a flash chip's Serial Flash Discoverable Parameters
//! (JEDEC JESD216) and turns them into a [`CapabilityRecord`]: device size,
//! page size, erase types and erase regions. A storage layer then queries
//! the record to decide which erase opcode to issue for an address range.
//! It is `no_std` compatible and performs no allocation.
//!
//! # Features
//!
//! - `std` - Enable standard library support and `serde` serialization
//!
//! # Example
//!
//! ```ignore
//! use sfdprobe_core::{reader::SliceReader, sfdp, AccessMode};
//!
//! let mut reader = SliceReader::new(&dump);
//! let caps = sfdp::probe(&mut reader, AccessMode::Qspi)?;
//! for cmd in caps.erase_plan(0x10000, 0x20000)? {
//!     let cmd = cmd?;
//!     println!("erase 0x{:02X} @ 0x{:08X}", cmd.opcode, cmd.address);
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod error;
pub mod reader;
pub mod sfdp;

pub use error::{Error, ReadStage, Result};
pub use sfdp::{AccessMode, CapabilityRecord};
