//! Info command implementation

use std::fmt;

use sfdprobe_core::sfdp::{AddressMode, LEGACY_ERASE_SIZE};
use sfdprobe_core::CapabilityRecord;

use super::{format_mask, format_size, load_record};
use crate::cli::{Format, SourceArgs};
use crate::error::CliError;

/// Probe the source and print its capabilities
pub fn run_info(source: &SourceArgs, format: Format) -> Result<(), CliError> {
    let caps = load_record(source)?;

    match format {
        Format::Text => print!("{}", InfoReport(&caps)),
        Format::Ron => {
            let ron = ron::ser::to_string_pretty(&caps, ron::ser::PrettyConfig::default())?;
            println!("{}", ron);
        }
    }
    Ok(())
}

fn address_mode_name(mode: AddressMode) -> &'static str {
    match mode {
        AddressMode::ThreeByteOnly => "3-byte only",
        AddressMode::ThreeOrFourByte => "3-byte or 4-byte",
        AddressMode::FourByteOnly => "4-byte only",
    }
}

/// Human readable summary of a capability record
pub struct InfoReport<'a>(pub &'a CapabilityRecord);

impl fmt::Display for InfoReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caps = self.0;

        writeln!(f, "SFDP Information")?;
        writeln!(f, "================")?;
        writeln!(
            f,
            "Revision:     {} ({} parameter headers)",
            caps.revision(),
            caps.parameter_headers()
        )?;
        writeln!(
            f,
            "Size:         {} bytes ({})",
            caps.device_size(),
            format_size(caps.device_size())
        )?;
        writeln!(f, "Page size:    {} bytes", caps.page_size())?;
        writeln!(f, "Addressing:   {}", address_mode_name(caps.address_mode()))?;
        writeln!(f)?;

        if let Some(opcode) = caps.legacy_erase_opcode() {
            writeln!(
                f,
                "Erase:        legacy opcode 0x{:02X} ({})",
                opcode,
                format_size(LEGACY_ERASE_SIZE as u64)
            )?;
        } else {
            writeln!(f, "Erase types:")?;
            for (i, et) in caps.erase_types().iter().enumerate() {
                match et.opcode {
                    Some(opcode) => writeln!(
                        f,
                        "  Type {}: opcode 0x{:02X}, {}",
                        i + 1,
                        opcode,
                        format_size(et.size as u64)
                    )?,
                    None => writeln!(f, "  Type {}: not implemented", i + 1)?,
                }
            }
        }
        writeln!(f)?;

        writeln!(f, "Regions:")?;
        for (i, region) in caps.regions().iter().enumerate() {
            writeln!(
                f,
                "  {}: 0x{:08X} - 0x{:08X} ({:>8})  types: {}",
                i,
                region.low_boundary(),
                region.high_boundary,
                format_size(region.size),
                format_mask(region.erase_types)
            )?;
        }

        match caps.common_min_erase_size() {
            0 => writeln!(f, "Common erase: none"),
            size => writeln!(f, "Common erase: {}", format_size(size as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Preset;
    use crate::commands::tests::preset_source;

    #[test]
    fn test_info_report_hybrid() {
        let caps = load_record(&preset_source(Preset::Hybrid)).unwrap();
        let text = InfoReport(&caps).to_string();

        assert!(text.contains("Size:         2097152 bytes (2 MiB)"));
        assert!(text.contains("Type 2: opcode 0x52, 32 KiB"));
        assert!(text.contains("Type 4: not implemented"));
        assert!(text.contains("1: 0x00010000 - 0x001EFFFF"));
        assert!(text.contains("Common erase: 4 KiB"));
    }

    #[test]
    fn test_info_report_legacy() {
        let caps = load_record(&preset_source(Preset::Legacy)).unwrap();
        let text = InfoReport(&caps).to_string();

        assert!(text.contains("legacy opcode 0x20 (4 KiB)"));
        assert!(text.contains("types: none"));
        assert!(text.contains("Common erase: none"));
    }

    #[test]
    fn test_ron_output() {
        let caps = load_record(&preset_source(Preset::Uniform)).unwrap();
        let ron = ron::ser::to_string_pretty(&caps, ron::ser::PrettyConfig::default()).unwrap();

        assert!(ron.contains("device_size: 16777216"));
        assert!(ron.contains("page_size: 256"));
    }
}
