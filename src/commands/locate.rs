//! Locate command implementation

use sfdprobe_core::sfdp::EraseChoice;
use sfdprobe_core::CapabilityRecord;

use super::{format_mask, format_size, load_record};
use crate::cli::SourceArgs;
use crate::error::CliError;

/// Region lookup result, optionally with the erase type for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Region index
    pub region: usize,
    /// Erase type chosen for the requested size
    pub choice: Option<EraseChoice>,
}

/// Look up `offset` and, if `size` is given, select an erase type for it
pub fn locate(
    caps: &CapabilityRecord,
    offset: u64,
    size: Option<u64>,
) -> sfdprobe_core::Result<Location> {
    let region = caps.locate_region(offset)?;
    let choice = size
        .map(|size| caps.select_erase_type(region, offset, size))
        .transpose()?;

    Ok(Location { region, choice })
}

/// Print the region holding `offset`
pub fn run_locate(source: &SourceArgs, offset: u64, size: Option<u64>) -> Result<(), CliError> {
    let caps = load_record(source)?;
    let location = locate(&caps, offset, size)?;
    let region = caps.region(location.region)?;

    println!(
        "Offset 0x{:08X} is in region {} (0x{:08X} - 0x{:08X}, {}, types: {})",
        offset,
        location.region,
        region.low_boundary(),
        region.high_boundary,
        format_size(region.size),
        format_mask(region.erase_types)
    );

    if let (Some(size), Some(choice)) = (size, location.choice) {
        println!(
            "Erase type for {} bytes: type {} (opcode 0x{:02X}, {})",
            size,
            choice.index + 1,
            choice.opcode,
            format_size(choice.size as u64)
        );
    }

    Ok(())
}
