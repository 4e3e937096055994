//! CLI error type

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the sfdprobe commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading or writing a file failed
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SFDP probe or query failed
    #[error("SFDP error: {0}")]
    Sfdp(#[from] sfdprobe_core::Error),

    /// Neither a dump file nor a preset was given
    #[error("no SFDP source (pass a dump file or --preset)")]
    NoSource,

    /// Rendering the record as RON failed
    #[error("RON serialization failed: {0}")]
    Ron(#[from] ron::Error),
}

impl CliError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
