//! Synth command implementation

use std::path::Path;

use crate::cli::Preset;
use crate::error::CliError;

/// Write the SFDP image of an emulated chip to `output`
pub fn run_synth(preset: Preset, output: &Path) -> Result<(), CliError> {
    let image = preset.config().build_image();
    std::fs::write(output, &image).map_err(|e| CliError::io(output, e))?;

    log::info!(
        "Wrote {} byte SFDP image ({:?}) to {}",
        image.len(),
        preset,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ModeArg, SourceArgs};
    use crate::commands::load_record;

    #[test]
    fn test_synth_round_trips_through_probe() {
        let path = std::env::temp_dir().join(format!("sfdprobe-synth-{}.bin", std::process::id()));
        run_synth(Preset::Hybrid, &path).unwrap();

        let source = SourceArgs {
            image: Some(path.clone()),
            preset: None,
            mode: ModeArg::Spi,
        };
        let caps = load_record(&source);
        let _ = std::fs::remove_file(&path);

        let caps = caps.unwrap();
        assert_eq!(caps.device_size(), 2 * 1024 * 1024);
        assert_eq!(caps.regions().len(), 3);
    }

    #[test]
    fn test_synth_bad_path() {
        let err = run_synth(Preset::Uniform, Path::new("/nonexistent/dir/sfdp.bin"));
        assert!(matches!(err, Err(CliError::Io { .. })));
    }
}
