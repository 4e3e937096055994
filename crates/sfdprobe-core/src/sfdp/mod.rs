//! SFDP (Serial Flash Discoverable Parameters) parsing
//!
//! This module implements parsing of SFDP data structures as defined by
//! JEDEC JESD216. SFDP provides a standardized way for flash chips to
//! describe their capabilities.
//!
//! # Overview
//!
//! SFDP data is stored in a reserved area of the flash chip and can be
//! read using the RDSFDP command (0x5A). The structure contains:
//!
//! - An SFDP header with signature and revision info
//! - One or more parameter headers describing available tables
//! - The Basic Flash Parameter Table (density, page size, erase types)
//! - Optionally a Sector Map Parameter Table splitting the device into
//!   regions with different erase types
//!
//! [`probe`] reads these once and produces a [`CapabilityRecord`]. The
//! record then answers region and erase type queries and plans erases with
//! [`CapabilityRecord::erase_plan`].
//!
//! # Usage
//!
//! ```ignore
//! use sfdprobe_core::reader::SfdpReader;
//! use sfdprobe_core::sfdp::{self, AccessMode};
//!
//! fn probe_sfdp<R: SfdpReader>(reader: &mut R) {
//!     match sfdp::probe(reader, AccessMode::Qspi) {
//!         Ok(caps) => {
//!             println!("Flash size: {} bytes", caps.device_size());
//!             println!("Regions: {}", caps.regions().len());
//!         }
//!         Err(e) => println!("SFDP not supported: {}", e),
//!     }
//! }
//! ```

mod parser;
mod plan;
mod region;
mod types;

pub use parser::*;
pub use plan::*;
pub use region::*;
pub use types::*;
