//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use sfdprobe_core::AccessMode;
use sfdprobe_dummy::DummyConfig;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u64
pub fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size string like "64 KiB", "2MiB" or "0x10000"
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();

    if let Ok(n) = parse_hex_u64(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('k') {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

#[derive(Parser)]
#[command(name = "sfdprobe")]
#[command(author, version, about = "SFDP inspector for SPI NOR flash", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Host controller type
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// Plain SPI, 3-byte addresses only
    Spi,
    /// Quad SPI, 4-byte addresses allowed
    #[default]
    Qspi,
}

impl From<ModeArg> for AccessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Spi => AccessMode::Spi,
            ModeArg::Qspi => AccessMode::Qspi,
        }
    }
}

/// Built-in emulated chips
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// 16 MiB, 4K/32K/64K erase everywhere, no sector map
    Uniform,
    /// 2 MiB with 4K/32K boot regions at both ends
    Hybrid,
    /// 4 MiB JESD216 1.0 part, legacy 4K erase only
    Legacy,
}

impl Preset {
    /// Chip configuration for this preset
    pub fn config(self) -> DummyConfig {
        match self {
            Preset::Uniform => DummyConfig::uniform(),
            Preset::Hybrid => DummyConfig::hybrid(),
            Preset::Legacy => DummyConfig::legacy(),
        }
    }
}

/// Output format for `info`
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Human readable summary
    #[default]
    Text,
    /// RON dump of the capability record
    Ron,
}

/// Where SFDP data comes from
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Raw SFDP dump (as read with RDSFDP starting at address 0)
    #[arg(required_unless_present = "preset")]
    pub image: Option<PathBuf>,

    /// Probe a built-in emulated chip instead of a dump
    #[arg(long, value_enum, conflicts_with = "image")]
    pub preset: Option<Preset>,

    /// Host access mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::Qspi)]
    pub mode: ModeArg,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe SFDP and show the decoded capabilities
    Info {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Find the erase region holding an offset
    Locate {
        #[command(flatten)]
        source: SourceArgs,

        /// Offset to look up (hex or decimal)
        #[arg(long, value_parser = parse_hex_u64)]
        offset: u64,

        /// Also pick the erase type for a request of this size
        #[arg(long, value_parser = parse_size)]
        size: Option<u64>,
    },

    /// Show the erase commands needed for a range
    Plan {
        #[command(flatten)]
        source: SourceArgs,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u64)]
        start: u64,

        /// Length of the range (e.g. 0x20000, 128KiB)
        #[arg(long, value_parser = parse_size)]
        length: u64,
    },

    /// Write the SFDP image of a built-in emulated chip
    Synth {
        /// Chip to emulate
        #[arg(long, value_enum)]
        preset: Preset,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x10000"), Ok(0x10000));
        assert_eq!(parse_hex_u64("0XFF"), Ok(0xFF));
        assert_eq!(parse_hex_u64("4096"), Ok(4096));
        assert!(parse_hex_u64("0xZZ").is_err());
        assert!(parse_hex_u64("-1").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("0x20000"), Ok(0x20000));
        assert_eq!(parse_size("64 KiB"), Ok(65536));
        assert_eq!(parse_size("2MiB"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size("512b"), Ok(512));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan_args() {
        let cli = Cli::try_parse_from([
            "sfdprobe", "-vv", "plan", "--preset", "hybrid", "--start", "0x8000", "--length",
            "96KiB",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Plan {
                source,
                start,
                length,
            } => {
                assert_eq!(source.preset, Some(Preset::Hybrid));
                assert_eq!(source.mode, ModeArg::Qspi);
                assert_eq!(start, 0x8000);
                assert_eq!(length, 96 * 1024);
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn test_source_required() {
        assert!(Cli::try_parse_from(["sfdprobe", "info"]).is_err());
        assert!(
            Cli::try_parse_from(["sfdprobe", "info", "dump.bin", "--preset", "uniform"]).is_err()
        );
        assert!(Cli::try_parse_from(["sfdprobe", "info", "dump.bin", "-m", "spi"]).is_ok());
    }
}
