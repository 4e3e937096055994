//! Error types for sfdprobe-core
//!
//! This module provides a no_std compatible error type shared by the SFDP
//! probe pipeline and the runtime region/erase queries.

use core::fmt;

/// Stage of the probe pipeline that issued a failed read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    /// The 8-byte SFDP header at address 0
    Header,
    /// A parameter header (0-based index)
    ParameterHeader(usize),
    /// The Basic Flash Parameter Table
    BasicTable,
    /// The Sector Map Parameter Table
    SectorMapTable,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Header errors
    /// SFDP signature bytes are not "SFDP"
    SignatureInvalid,
    /// SFDP major revision is not 1
    VersionUnsupported(u8),
    /// A parameter header has a major revision other than 1
    ParamVersionUnsupported(u8),

    // I/O errors
    /// The reader failed while fetching SFDP data
    ReadFailure(ReadStage),

    // Basic Flash Parameter Table errors
    /// No Basic Flash Parameter Table among the parameter headers
    BasicTableMissing,
    /// A table is too short to hold a mandatory field
    TableTruncated,
    /// Density field decodes to zero bytes
    DensityInvalid,
    /// Device addressing exceeds what the host access mode supports
    AddressingUnsupported,
    /// No erase type table and the legacy 4 KiB erase is marked unsupported
    LegacyEraseUnsupported,

    // Sector Map errors
    /// Sector map uses command descriptors or multiple configurations
    SectorMapUnsupported,
    /// Sector map declares more regions than supported
    TooManyRegions(usize),
    /// Sector map regions do not add up to the device size
    RegionMapMismatch,

    // Query errors
    /// Offset lies beyond the end of the device
    OffsetOutOfRange,
    /// Region index does not exist
    InvalidRegion(usize),
    /// No supported erase type fits the request within the region
    NoEraseTypeForRegion,
    /// Erase request is not aligned to the region's erase granularity
    InvalidAlignment,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "SFDP header"),
            Self::ParameterHeader(index) => write!(f, "parameter header {}", index + 1),
            Self::BasicTable => write!(f, "basic parameter table"),
            Self::SectorMapTable => write!(f, "sector map table"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignatureInvalid => write!(f, "SFDP signature invalid"),
            Self::VersionUnsupported(major) => {
                write!(f, "SFDP major version {} not supported", major)
            }
            Self::ParamVersionUnsupported(major) => {
                write!(f, "parameter table major version {} not supported", major)
            }
            Self::ReadFailure(stage) => write!(f, "failed to read {}", stage),
            Self::BasicTableMissing => write!(f, "basic parameter table not found"),
            Self::TableTruncated => write!(f, "parameter table too short"),
            Self::DensityInvalid => write!(f, "invalid flash density"),
            Self::AddressingUnsupported => {
                write!(f, "device addressing not supported by access mode")
            }
            Self::LegacyEraseUnsupported => write!(f, "legacy 4 KiB erase not supported"),
            Self::SectorMapUnsupported => {
                write!(f, "only single map descriptor sector maps are supported")
            }
            Self::TooManyRegions(count) => {
                write!(f, "sector map has {} regions, too many", count)
            }
            Self::RegionMapMismatch => write!(f, "sector map does not cover the device"),
            Self::OffsetOutOfRange => write!(f, "offset out of range"),
            Self::InvalidRegion(index) => write!(f, "region {} does not exist", index),
            Self::NoEraseTypeForRegion => write!(f, "no erase type fits the region"),
            Self::InvalidAlignment => write!(f, "invalid erase alignment"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
