//! CLI command implementations
//!
//! Every command except `synth` starts by probing an SFDP source (a dump
//! file or an emulated chip) and then works on the resulting record.

mod info;
mod locate;
mod plan;
mod synth;

pub use info::run_info;
pub use locate::run_locate;
pub use plan::run_plan;
pub use synth::run_synth;

use crate::cli::SourceArgs;
use crate::error::CliError;
use sfdprobe_core::reader::SliceReader;
use sfdprobe_core::sfdp::{self, EraseTypeMask};
use sfdprobe_core::{AccessMode, CapabilityRecord};
use sfdprobe_dummy::DummyFlash;

/// Probe the SFDP source selected on the command line
pub fn load_record(source: &SourceArgs) -> Result<CapabilityRecord, CliError> {
    let mode: AccessMode = source.mode.into();

    if let Some(preset) = source.preset {
        log::debug!("Probing emulated {:?} chip", preset);
        let mut flash = DummyFlash::new(preset.config());
        return Ok(sfdp::probe(&mut flash, mode)?);
    }

    let path = source.image.as_deref().ok_or(CliError::NoSource)?;
    let image = std::fs::read(path).map_err(|e| CliError::io(path, e))?;
    log::debug!("Loaded {} byte SFDP dump from {}", image.len(), path.display());

    let mut reader = SliceReader::new(&image);
    Ok(sfdp::probe(&mut reader, mode)?)
}

/// Format a byte count using the largest exact binary unit
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Erase type numbers (1-4) in a mask, e.g. "1 3"
pub fn format_mask(mask: EraseTypeMask) -> String {
    let types: Vec<String> = (0..4)
        .filter(|&i| mask.has_index(i))
        .map(|i| (i + 1).to_string())
        .collect();
    if types.is_empty() {
        "none".to_string()
    } else {
        types.join(" ")
    }
}
