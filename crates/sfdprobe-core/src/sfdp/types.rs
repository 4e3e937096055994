//! SFDP type definitions
//!
//! Types representing SFDP structures as defined by JEDEC JESD216, and the
//! capability record the probe builds from them.

use bitflags::bitflags;

/// SFDP signature ("SFDP" in wire order)
pub const SFDP_SIGNATURE: [u8; 4] = *b"SFDP";

/// Size of the SFDP header and of each parameter header
pub const SFDP_HEADER_SIZE: usize = 8;

/// Largest Basic Flash Parameter Table prefix that is read (20 DWORDs)
pub const MAX_BASIC_TABLE_SIZE: usize = 80;

/// Maximum parameter table size in bytes (256 DWORDs * 4)
pub const MAX_PARAMETER_TABLE_SIZE: usize = 1024;

/// Maximum number of sector map regions
pub const MAX_REGIONS: usize = 10;

/// Page size used when the Basic table does not declare one
pub const DEFAULT_PAGE_SIZE: u32 = 256;

/// Erase granularity of the legacy (pre erase-type) 4 KiB erase opcode
pub const LEGACY_ERASE_SIZE: u32 = 4096;

/// Legacy erase opcode value meaning "4 KiB erase not supported"
pub const LEGACY_ERASE_UNSUPPORTED: u8 = 0xFF;

// ============================================================================
// Parameter IDs (MSB << 8 | LSB)
// ============================================================================

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;
/// Sector Map Parameter Table ID
pub const PARAM_ID_SECTOR_MAP: u16 = 0xFF81;

/// Byte offsets of the Basic Flash Parameter Table fields
pub mod bfpt {
    /// Legacy 4 KiB erase opcode (DWORD 1 bits 15:8)
    pub const LEGACY_ERASE_OPCODE: usize = 1;
    /// Address bytes field (DWORD 1 bits 18:17)
    pub const ADDRESS_BYTES: usize = 2;
    /// Density (DWORD 2)
    pub const DENSITY: usize = 4;
    /// Byte holding density bit 31 (2^N encoding, > 2 Gbit)
    pub const DENSITY_MSB: usize = 7;
    /// Erase Type 1 size exponent, first of the DWORD 8-9 pairs
    pub const ERASE_TYPES: usize = 28;
    /// One past the last erase type byte
    pub const ERASE_TYPES_END: usize = 36;
    /// Page size nibble (DWORD 11 bits 7:4)
    pub const PAGE_SIZE: usize = 40;

    /// (size exponent, opcode) offsets for erase types 1-4
    pub const ERASE_TYPE_FIELDS: [(usize, usize); 4] = [(28, 29), (30, 31), (32, 33), (34, 35)];
}

// ============================================================================
// SFDP Revision
// ============================================================================

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl SfdpRevision {
    /// Create a new revision
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ============================================================================
// SFDP Header
// ============================================================================

/// SFDP header structure (first 8 bytes at address 0x00)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfdpHeader {
    /// Signature bytes (should be "SFDP")
    pub signature: [u8; 4],
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers (0-based, so actual count is nph + 1)
    pub nph: u8,
    /// Access protocol (0xFF for legacy)
    pub access_protocol: u8,
}

impl SfdpHeader {
    /// Parse SFDP header from raw bytes
    pub fn parse(data: &[u8; SFDP_HEADER_SIZE]) -> Self {
        Self {
            signature: [data[0], data[1], data[2], data[3]],
            revision: SfdpRevision {
                minor: data[4],
                major: data[5],
            },
            nph: data[6],
            access_protocol: data[7],
        }
    }

    /// Check if the signature is valid
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Get the number of parameter headers
    pub fn num_param_headers(&self) -> usize {
        (self.nph as usize) + 1
    }
}

// ============================================================================
// Parameter Header
// ============================================================================

/// Parameter header structure (8 bytes each, starting at address 0x08)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterHeader {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Parameter table revision
    pub revision: SfdpRevision,
    /// Parameter table length in DWORDs
    pub length_dwords: u8,
    /// Parameter table pointer (24-bit byte address)
    pub table_pointer: u32,
}

impl ParameterHeader {
    /// Parse a parameter header from raw bytes
    ///
    /// Bytes 4-7 form a little-endian DWORD whose high byte is the
    /// parameter ID MSB and whose low 24 bits are the table pointer.
    pub fn parse(data: &[u8; SFDP_HEADER_SIZE]) -> Self {
        let dword2 = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Self {
            id: (((dword2 >> 24) as u16) << 8) | (data[0] as u16),
            revision: SfdpRevision {
                minor: data[1],
                major: data[2],
            },
            length_dwords: data[3],
            table_pointer: dword2 & 0x00FF_FFFF,
        }
    }

    /// Get the table length in bytes
    pub fn length_bytes(&self) -> usize {
        (self.length_dwords as usize) * 4
    }

    /// Classify the table this header points to
    pub fn kind(&self) -> ParameterKind {
        match self.id {
            PARAM_ID_BASIC => ParameterKind::Basic,
            PARAM_ID_SECTOR_MAP => ParameterKind::SectorMap,
            id => ParameterKind::Other(id),
        }
    }
}

/// Parameter table classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Basic Flash Parameter Table
    Basic,
    /// Sector Map Parameter Table
    SectorMap,
    /// Vendor-specific or unhandled JEDEC table
    Other(u16),
}

/// Location of a parameter table in the SFDP address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLocation {
    /// Byte address of the table
    pub addr: u32,
    /// Number of bytes to read
    pub size: usize,
}

/// Tables of interest found by the parameter header scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterTables {
    /// Number of parameter headers declared by the SFDP header
    pub header_count: usize,
    /// Basic Flash Parameter Table
    pub basic: Option<TableLocation>,
    /// Sector Map Parameter Table
    pub sector_map: Option<TableLocation>,
}

// ============================================================================
// Access / Address Mode
// ============================================================================

/// How the host reaches the flash; decides which densities are acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Plain SPI controller limited to 3-byte addresses
    Spi,
    /// Quad SPI controller able to issue 4-byte addresses
    #[default]
    Qspi,
}

/// Flash addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub enum AddressMode {
    /// 3-byte addressing only (up to 16 MiB)
    #[default]
    ThreeByteOnly,
    /// 3-byte default, can switch to 4-byte
    ThreeOrFourByte,
    /// 4-byte addressing only (required for > 16 MiB)
    FourByteOnly,
}

impl AddressMode {
    /// Parse from BFPT DWORD 1 bits [18:17]
    pub fn from_bfpt(value: u8) -> Self {
        match value & 0x03 {
            0b00 => Self::ThreeByteOnly,
            0b01 => Self::ThreeOrFourByte,
            0b10 => Self::FourByteOnly,
            _ => Self::ThreeByteOnly, // Reserved, treat as 3-byte
        }
    }

    /// Check if 4-byte addressing is required
    pub fn requires_4byte(&self) -> bool {
        matches!(self, Self::FourByteOnly)
    }
}

// ============================================================================
// Erase Types
// ============================================================================

bitflags! {
    /// Set of erase types (bit i = erase type i + 1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "std", derive(serde::Serialize))]
    #[cfg_attr(feature = "std", serde(transparent))]
    pub struct EraseTypeMask: u8 {
        /// Erase Type 1
        const TYPE_1 = 1 << 0;
        /// Erase Type 2
        const TYPE_2 = 1 << 1;
        /// Erase Type 3
        const TYPE_3 = 1 << 2;
        /// Erase Type 4
        const TYPE_4 = 1 << 3;
    }
}

impl EraseTypeMask {
    /// Mask for the erase type at `index` (must be 0-3)
    pub const fn for_index(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }

    /// Check whether the erase type at `index` is in the set
    pub fn has_index(&self, index: usize) -> bool {
        index < 4 && self.contains(Self::for_index(index))
    }
}

/// Erase type decoded from the Basic table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct EraseType {
    /// Erase opcode, `None` if the type is not implemented
    pub opcode: Option<u8>,
    /// Erase size in bytes (0 if not implemented)
    pub size: u32,
}

impl EraseType {
    /// Placeholder for an unimplemented type
    pub const UNSUPPORTED: Self = Self {
        opcode: None,
        size: 0,
    };

    /// Decode from a size exponent (size = 2^N) and opcode
    ///
    /// N = 0 marks the type as not implemented. Exponents that do not fit
    /// a 32-bit size are treated the same way.
    pub fn from_raw(size_exp: u8, opcode: u8) -> Self {
        match 1u32.checked_shl(size_exp as u32) {
            Some(size) if size > 1 => Self {
                opcode: Some(opcode),
                size,
            },
            _ => Self::UNSUPPORTED,
        }
    }

    /// Check if this erase type is implemented
    pub fn is_supported(&self) -> bool {
        self.opcode.is_some()
    }
}

// ============================================================================
// Regions
// ============================================================================

/// Contiguous address range sharing one set of erase types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct Region {
    /// Region size in bytes
    pub size: u64,
    /// Address of the last byte in the region
    pub high_boundary: u64,
    /// Erase types usable anywhere in the region
    pub erase_types: EraseTypeMask,
}

impl Region {
    /// Address of the first byte in the region
    pub fn low_boundary(&self) -> u64 {
        self.high_boundary + 1 - self.size
    }

    /// Check whether `offset` falls inside the region
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.low_boundary() && offset <= self.high_boundary
    }
}

/// Region list, bounded by [`MAX_REGIONS`]
pub type Regions = heapless::Vec<Region, MAX_REGIONS>;

// ============================================================================
// Decoded tables
// ============================================================================

/// Result of decoding the Basic Flash Parameter Table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicTable {
    /// Flash density in bytes
    pub device_size: u64,
    /// Page size in bytes
    pub page_size: u32,
    /// Address mode support
    pub address_mode: AddressMode,
    /// Legacy 4 KiB erase opcode (only when erase types are absent)
    pub legacy_erase_opcode: Option<u8>,
    /// Erase types 1-4
    pub erase_types: [EraseType; 4],
    /// Smallest implemented erase size (0 if none)
    pub min_erase_size: u32,
}

impl BasicTable {
    /// Set of implemented erase types
    pub fn supported_erase_types(&self) -> EraseTypeMask {
        supported_mask(&self.erase_types)
    }
}

/// Result of decoding (or synthesizing) the sector map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorMap {
    /// Regions in address order
    pub regions: Regions,
    /// Smallest erase size common to every region (0 if none)
    pub common_min_erase_size: u32,
}

pub(crate) fn supported_mask(erase_types: &[EraseType; 4]) -> EraseTypeMask {
    erase_types
        .iter()
        .enumerate()
        .filter(|(_, et)| et.is_supported())
        .fold(EraseTypeMask::empty(), |mask, (i, _)| {
            mask | EraseTypeMask::for_index(i)
        })
}

// ============================================================================
// Capability Record
// ============================================================================

/// Everything the storage layer needs to know about the flash
///
/// Built once by [`probe`](super::probe) and immutable afterwards; share it
/// by reference between any number of readers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize))]
pub struct CapabilityRecord {
    pub(crate) revision: SfdpRevision,
    pub(crate) parameter_headers: usize,
    pub(crate) device_size: u64,
    pub(crate) page_size: u32,
    pub(crate) address_mode: AddressMode,
    pub(crate) legacy_erase_opcode: Option<u8>,
    pub(crate) erase_types: [EraseType; 4],
    pub(crate) regions: Regions,
    pub(crate) common_min_erase_size: u32,
}

impl CapabilityRecord {
    pub(crate) fn new(
        revision: SfdpRevision,
        parameter_headers: usize,
        basic: BasicTable,
        map: SectorMap,
    ) -> Self {
        Self {
            revision,
            parameter_headers,
            device_size: basic.device_size,
            page_size: basic.page_size,
            address_mode: basic.address_mode,
            legacy_erase_opcode: basic.legacy_erase_opcode,
            erase_types: basic.erase_types,
            regions: map.regions,
            common_min_erase_size: map.common_min_erase_size,
        }
    }

    /// SFDP revision from the main header
    pub fn revision(&self) -> SfdpRevision {
        self.revision
    }

    /// Number of parameter headers the device declared
    pub fn parameter_headers(&self) -> usize {
        self.parameter_headers
    }

    /// Flash size in bytes
    pub fn device_size(&self) -> u64 {
        self.device_size
    }

    /// Program page size in bytes
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Address bytes the device accepts
    pub fn address_mode(&self) -> AddressMode {
        self.address_mode
    }

    /// Legacy 4 KiB erase opcode, present only without erase types
    pub fn legacy_erase_opcode(&self) -> Option<u8> {
        self.legacy_erase_opcode
    }

    /// Erase types 1-4 (index i ↔ bit i of region bitfields)
    pub fn erase_types(&self) -> &[EraseType; 4] {
        &self.erase_types
    }

    /// Erase regions in address order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Smallest erase size usable in every region (0 if none is common)
    pub fn common_min_erase_size(&self) -> u32 {
        self.common_min_erase_size
    }

    /// Set of implemented erase types
    pub fn supported_erase_types(&self) -> EraseTypeMask {
        supported_mask(&self.erase_types)
    }
}
