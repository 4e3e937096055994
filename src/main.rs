//! sfdprobe - SFDP inspector for SPI NOR flash
//!
//! Decodes the Serial Flash Discoverable Parameters of a chip, either from
//! a raw dump or from a built-in emulated device, and shows what a storage
//! driver would derive from them: size, page size, erase types, erase
//! regions and the erase commands for a given range.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set log level based on verbosity
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Info { source, format } => commands::run_info(&source, format),
        Commands::Locate {
            source,
            offset,
            size,
        } => commands::run_locate(&source, offset, size),
        Commands::Plan {
            source,
            start,
            length,
        } => commands::run_plan(&source, start, length),
        Commands::Synth { preset, output } => commands::run_synth(preset, &output),
    }?;

    Ok(())
}
