//! Plan command implementation

use sfdprobe_core::sfdp::EraseCommand;

use super::{format_size, load_record};
use crate::cli::SourceArgs;
use crate::error::CliError;

/// Per-opcode totals of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    /// (opcode, size, count) in order of first use
    pub by_opcode: Vec<(u8, u32, usize)>,
    /// Total bytes covered
    pub total: u64,
}

/// Summarize a list of erase commands
pub fn summarize(commands: &[EraseCommand]) -> PlanSummary {
    let mut by_opcode: Vec<(u8, u32, usize)> = Vec::new();
    for cmd in commands {
        match by_opcode.iter_mut().find(|(opcode, _, _)| *opcode == cmd.opcode) {
            Some(entry) => entry.2 += 1,
            None => by_opcode.push((cmd.opcode, cmd.size, 1)),
        }
    }

    PlanSummary {
        by_opcode,
        total: commands.iter().map(|c| c.size as u64).sum(),
    }
}

/// Print the erase commands covering `[start, start + length)`
pub fn run_plan(source: &SourceArgs, start: u64, length: u64) -> Result<(), CliError> {
    let caps = load_record(source)?;
    let commands = caps
        .erase_plan(start, length)?
        .collect::<sfdprobe_core::Result<Vec<_>>>()?;

    println!(
        "Erase plan for 0x{:08X} - 0x{:08X} ({} commands):",
        start,
        start + length,
        commands.len()
    );
    for cmd in &commands {
        println!(
            "  0x{:02X} @ 0x{:08X} ({})",
            cmd.opcode,
            cmd.address,
            format_size(cmd.size as u64)
        );
    }

    let summary = summarize(&commands);
    println!();
    for (opcode, size, count) in &summary.by_opcode {
        println!(
            "  {} x 0x{:02X} ({})",
            count,
            opcode,
            format_size(*size as u64)
        );
    }
    println!("Total: {}", format_size(summary.total));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Preset;
    use crate::commands::tests::preset_source;

    #[test]
    fn test_summarize_hybrid_plan() {
        let caps = load_record(&preset_source(Preset::Hybrid)).unwrap();
        let commands: Vec<EraseCommand> = caps
            .erase_plan(0x1_0000, 0x3_0000)
            .unwrap()
            .collect::<sfdprobe_core::Result<_>>()
            .unwrap();

        let summary = summarize(&commands);
        assert_eq!(summary.total, 0x3_0000);
        // Two 64K blocks, then the last block in 4K sectors
        assert_eq!(summary.by_opcode, [(0xD8, 65536, 2), (0x20, 4096, 16)]);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert!(summary.by_opcode.is_empty());
        assert_eq!(summary.total, 0);
    }
}
