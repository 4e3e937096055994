//! SFDP parsing implementation
//!
//! This module reads SFDP data through an [`SfdpReader`] and builds a
//! [`CapabilityRecord`]. The pipeline runs header → parameter headers →
//! Basic table → sector map, and any failure aborts the whole probe.

use crate::error::{Error, ReadStage, Result};
use crate::reader::SfdpReader;

use super::types::*;

/// Read raw SFDP data, mapping transport errors to the pipeline stage
fn read_sfdp<R: SfdpReader + ?Sized>(
    reader: &mut R,
    addr: u32,
    buf: &mut [u8],
    stage: ReadStage,
) -> Result<()> {
    let len = buf.len();
    reader.read(addr, buf).map_err(|e| {
        log::error!(
            "SFDP read of {} bytes at 0x{:06X} ({}) failed: {:?}",
            len,
            addr,
            stage,
            e
        );
        Error::ReadFailure(stage)
    })
}

/// Bounds-checked byte field of a parameter table
fn field_u8(table: &[u8], offset: usize) -> Result<u8> {
    table.get(offset).copied().ok_or(Error::TableTruncated)
}

/// Bounds-checked little-endian DWORD field of a parameter table
fn field_u32(table: &[u8], offset: usize) -> Result<u32> {
    let bytes = offset
        .checked_add(4)
        .and_then(|end| table.get(offset..end))
        .ok_or(Error::TableTruncated)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// ============================================================================
// SFDP header
// ============================================================================

/// Validate the 8-byte SFDP header
///
/// On success the header's [`num_param_headers`](SfdpHeader::num_param_headers)
/// gives the number of parameter headers that follow it.
pub fn parse_header(data: &[u8; SFDP_HEADER_SIZE]) -> Result<SfdpHeader> {
    let header = SfdpHeader::parse(data);

    if !header.is_valid() {
        log::error!("SFDP signature invalid (expected 'SFDP')");
        return Err(Error::SignatureInvalid);
    }

    if header.revision.major != 1 {
        log::error!("SFDP major version {} not supported", header.revision.major);
        return Err(Error::VersionUnsupported(header.revision.major));
    }

    log::debug!(
        "SFDP header valid: revision {}, {} parameter header(s)",
        header.revision,
        header.num_param_headers()
    );

    Ok(header)
}

fn read_header<R: SfdpReader + ?Sized>(reader: &mut R) -> Result<SfdpHeader> {
    let mut buf = [0u8; SFDP_HEADER_SIZE];

    log::debug!("Reading SFDP header (8 bytes at address 0x00)...");
    read_sfdp(reader, 0x00, &mut buf, ReadStage::Header)?;
    log::trace!("SFDP header bytes: {:02X?}", buf);

    parse_header(&buf)
}

// ============================================================================
// Parameter headers
// ============================================================================

/// Parse a single parameter header and check its major revision
pub fn parse_param_header(data: &[u8; SFDP_HEADER_SIZE]) -> Result<ParameterHeader> {
    let header = ParameterHeader::parse(data);

    if header.revision.major != 1 {
        log::error!(
            "Parameter header 0x{:04X}: major version {} not supported",
            header.id,
            header.revision.major
        );
        return Err(Error::ParamVersionUnsupported(header.revision.major));
    }

    Ok(header)
}

fn record_table(tables: &mut ParameterTables, header: &ParameterHeader) {
    match header.kind() {
        ParameterKind::Basic => {
            let size = core::cmp::min(header.length_bytes(), MAX_BASIC_TABLE_SIZE);
            log::debug!(
                "Basic parameter table: rev {}, {} bytes at 0x{:06X}",
                header.revision,
                size,
                header.table_pointer
            );
            tables.basic = Some(TableLocation {
                addr: header.table_pointer,
                size,
            });
        }
        ParameterKind::SectorMap => {
            log::debug!(
                "Sector map table: rev {}, {} bytes at 0x{:06X}",
                header.revision,
                header.length_bytes(),
                header.table_pointer
            );
            tables.sector_map = Some(TableLocation {
                addr: header.table_pointer,
                size: header.length_bytes(),
            });
        }
        ParameterKind::Other(id) => {
            log::trace!(
                "Skipping parameter table ID 0x{:04X} (rev {})",
                id,
                header.revision
            );
        }
    }
}

/// Read every parameter header following the SFDP header
///
/// Headers are read sequentially, 8 bytes each, starting right after the
/// SFDP header. Vendor tables are skipped; the Basic and Sector Map tables
/// are located.
pub fn scan_param_headers<R: SfdpReader + ?Sized>(
    reader: &mut R,
    header: &SfdpHeader,
) -> Result<ParameterTables> {
    let count = header.num_param_headers();
    let mut tables = ParameterTables {
        header_count: count,
        ..Default::default()
    };

    let mut addr = SFDP_HEADER_SIZE as u32;
    for index in 0..count {
        let mut buf = [0u8; SFDP_HEADER_SIZE];
        read_sfdp(reader, addr, &mut buf, ReadStage::ParameterHeader(index))?;

        let param = parse_param_header(&buf)?;
        record_table(&mut tables, &param);

        addr += SFDP_HEADER_SIZE as u32;
    }

    Ok(tables)
}

// ============================================================================
// Basic Flash Parameter Table
// ============================================================================

/// Reject devices the host access mode cannot address
///
/// Density bit 31 selects the 2^N encoding used above 2 Gbit, which neither
/// mode handles. A plain SPI host additionally cannot talk to devices that
/// only accept 4-byte addresses.
fn check_addressability(table: &[u8], mode: AccessMode) -> Result<()> {
    let density_msb = field_u8(table, bfpt::DENSITY_MSB)?;
    if density_msb & 0x80 != 0 {
        log::error!("Flash density above 2 Gbit not supported");
        return Err(Error::AddressingUnsupported);
    }

    if mode == AccessMode::Spi && field_u8(table, bfpt::ADDRESS_BYTES)? & 0x04 != 0 {
        log::error!("Flash requires 4-byte addressing, host supports 3-byte only");
        return Err(Error::AddressingUnsupported);
    }

    Ok(())
}

/// Density is stored as size in bits minus one
fn detect_density(table: &[u8]) -> Result<u64> {
    let density_bits = field_u32(table, bfpt::DENSITY)?;
    let device_size = (density_bits as u64 + 1) / 8;

    log::debug!(
        "Density bits: {}, device size: {} bytes",
        density_bits,
        device_size
    );

    if device_size == 0 {
        return Err(Error::DensityInvalid);
    }
    Ok(device_size)
}

/// Page size is 2^N with N in the high nibble of DWORD 11
fn detect_page_size(table: &[u8]) -> u32 {
    if table.len() > bfpt::PAGE_SIZE {
        let exponent = table[bfpt::PAGE_SIZE] >> 4;
        let page_size = 1u32 << exponent;
        log::debug!("Detected page size: {}", page_size);
        page_size
    } else {
        log::debug!("Using default page size: {}", DEFAULT_PAGE_SIZE);
        DEFAULT_PAGE_SIZE
    }
}

/// Decode the erase types from DWORDs 8-9
fn detect_erase_types(table: &[u8]) -> [EraseType; 4] {
    let mut erase_types = [EraseType::UNSUPPORTED; 4];

    for (i, &(size_offset, opcode_offset)) in bfpt::ERASE_TYPE_FIELDS.iter().enumerate() {
        erase_types[i] = EraseType::from_raw(table[size_offset], table[opcode_offset]);
        match erase_types[i].opcode {
            Some(opcode) => log::debug!(
                "Erase type {}: opcode 0x{:02X}, size {}",
                i + 1,
                opcode,
                erase_types[i].size
            ),
            None => log::debug!("Erase type {}: not implemented", i + 1),
        }
    }

    erase_types
}

/// Decode a Basic Flash Parameter Table
///
/// `table` holds exactly the bytes that were read (the declared length,
/// capped at [`MAX_BASIC_TABLE_SIZE`]); nothing beyond it is inspected.
/// Optional fields missing from a short table fall back to defaults: the
/// page size to 256 bytes and the erase types to the legacy 4 KiB opcode.
pub fn decode_basic_table(table: &[u8], mode: AccessMode) -> Result<BasicTable> {
    check_addressability(table, mode)?;

    let device_size = detect_density(table)?;
    let page_size = detect_page_size(table);
    let address_mode = AddressMode::from_bfpt((field_u8(table, bfpt::ADDRESS_BYTES)? >> 1) & 0x03);

    let mut basic = BasicTable {
        device_size,
        page_size,
        address_mode,
        legacy_erase_opcode: None,
        erase_types: [EraseType::UNSUPPORTED; 4],
        min_erase_size: 0,
    };

    if table.len() >= bfpt::ERASE_TYPES_END {
        basic.erase_types = detect_erase_types(table);
        basic.min_erase_size = basic
            .erase_types
            .iter()
            .filter(|et| et.is_supported())
            .map(|et| et.size)
            .min()
            .unwrap_or(0);
    } else {
        log::debug!("Erase types not available - falling back to legacy 4 KiB erase");

        let opcode = field_u8(table, bfpt::LEGACY_ERASE_OPCODE)?;
        if opcode == LEGACY_ERASE_UNSUPPORTED {
            log::error!("Legacy 4 KiB erase instruction not supported");
            return Err(Error::LegacyEraseUnsupported);
        }
        basic.legacy_erase_opcode = Some(opcode);
    }

    Ok(basic)
}

fn read_basic_table<R: SfdpReader + ?Sized>(
    reader: &mut R,
    location: TableLocation,
    mode: AccessMode,
) -> Result<BasicTable> {
    let mut buf = [0u8; MAX_BASIC_TABLE_SIZE];
    let len = core::cmp::min(location.size, buf.len());

    read_sfdp(reader, location.addr, &mut buf[..len], ReadStage::BasicTable)?;

    decode_basic_table(&buf[..len], mode)
}

// ============================================================================
// Sector Map Parameter Table
// ============================================================================

/// Lowest-index erase type present in `mask`, as its size
fn smallest_index_size(mask: EraseTypeMask, erase_types: &[EraseType; 4]) -> u32 {
    (0..4)
        .find(|&i| mask.has_index(i))
        .map(|i| erase_types[i].size)
        .unwrap_or(0)
}

/// Single region spanning the device, used when there is no sector map
pub fn default_sector_map(basic: &BasicTable) -> SectorMap {
    let mut regions = Regions::new();
    // A fresh Vec always has room for one region
    let _ = regions.push(Region {
        size: basic.device_size,
        high_boundary: basic.device_size - 1,
        erase_types: basic.supported_erase_types(),
    });

    SectorMap {
        regions,
        common_min_erase_size: basic.min_erase_size,
    }
}

/// Decode a Sector Map Parameter Table
///
/// Only a single map descriptor followed by its region descriptors is
/// supported. Each region DWORD holds the region size in 256-byte units
/// minus one in bits 31:8 and the erase type bitfield in bits 3:0.
pub fn decode_sector_map(table: &[u8], basic: &BasicTable) -> Result<SectorMap> {
    let descriptor = field_u32(table, 0)?.to_le_bytes();

    if descriptor[0] & 0x03 != 0x03 || descriptor[1] != 0 {
        log::error!("Sector map: only a single map descriptor is supported (not map commands)");
        return Err(Error::SectorMapUnsupported);
    }

    let count = descriptor[2] as usize + 1;
    if count > MAX_REGIONS {
        log::error!(
            "Sector map: supporting up to {} regions, device declares {}",
            MAX_REGIONS,
            count
        );
        return Err(Error::TooManyRegions(count));
    }

    let supported = basic.supported_erase_types();
    let mut regions = Regions::new();
    let mut common = EraseTypeMask::all();
    let mut next_low: u64 = 0;

    for i in 0..count {
        let dword = field_u32(table, (i + 1) * 4)?;
        let size = (((dword >> 8) & 0x00FF_FFFF) as u64 + 1) * 256;
        let erase_types = EraseTypeMask::from_bits_truncate((dword & 0x0F) as u8) & supported;
        let high_boundary = next_low + size - 1;

        log::debug!(
            "Region {}: 0x{:08X}-0x{:08X}, erase types {:?}",
            i,
            next_low,
            high_boundary,
            erase_types
        );

        regions
            .push(Region {
                size,
                high_boundary,
                erase_types,
            })
            .map_err(|_| Error::TooManyRegions(count))?;

        common &= erase_types;
        next_low = high_boundary + 1;
    }

    if next_low != basic.device_size {
        log::error!(
            "Sector map covers {} bytes, device has {}",
            next_low,
            basic.device_size
        );
        return Err(Error::RegionMapMismatch);
    }

    let common_min_erase_size = smallest_index_size(common, &basic.erase_types);
    if common_min_erase_size == 0 {
        log::debug!("No erase type common to all regions");
    }

    Ok(SectorMap {
        regions,
        common_min_erase_size,
    })
}

fn read_sector_map<R: SfdpReader + ?Sized>(
    reader: &mut R,
    location: TableLocation,
    basic: &BasicTable,
) -> Result<SectorMap> {
    let mut buf = [0u8; MAX_PARAMETER_TABLE_SIZE];
    let len = core::cmp::min(location.size, buf.len());

    read_sfdp(reader, location.addr, &mut buf[..len], ReadStage::SectorMapTable)?;

    decode_sector_map(&buf[..len], basic)
}

// ============================================================================
// Probe
// ============================================================================

fn run_probe<R: SfdpReader + ?Sized>(reader: &mut R, mode: AccessMode) -> Result<CapabilityRecord> {
    let header = read_header(reader)?;
    let tables = scan_param_headers(reader, &header)?;

    let basic_location = tables.basic.ok_or_else(|| {
        log::error!("No basic parameter table found");
        Error::BasicTableMissing
    })?;
    let basic = read_basic_table(reader, basic_location, mode)?;

    let map = match tables.sector_map {
        Some(location) if location.addr != 0 && location.size != 0 => {
            read_sector_map(reader, location, &basic)?
        }
        _ => {
            log::debug!("No sector map table - using a single region");
            default_sector_map(&basic)
        }
    };

    Ok(CapabilityRecord::new(
        header.revision,
        tables.header_count,
        basic,
        map,
    ))
}

/// Probe for SFDP support and build the capability record
///
/// Performs a short, fixed sequence of blocking reads: the SFDP header,
/// each parameter header, the Basic table and, if present, the Sector Map
/// table. The reader is borrowed exclusively for the whole probe, so the
/// same device cannot be probed twice concurrently. On failure no partial
/// record is returned; start over with a new probe.
///
/// # Example
///
/// ```ignore
/// use sfdprobe_core::{sfdp, AccessMode};
///
/// let caps = sfdp::probe(&mut reader, AccessMode::Qspi)?;
/// println!("Flash size: {} bytes", caps.device_size());
/// println!("Page size: {} bytes", caps.page_size());
/// ```
pub fn probe<R: SfdpReader + ?Sized>(reader: &mut R, mode: AccessMode) -> Result<CapabilityRecord> {
    match run_probe(reader, mode) {
        Ok(record) => {
            log::info!(
                "SFDP {}: {} bytes, page {} bytes, {} region(s)",
                record.revision(),
                record.device_size(),
                record.page_size(),
                record.regions().len()
            );
            Ok(record)
        }
        Err(e) => {
            log::debug!("SFDP probe failed: {}", e);
            Err(e)
        }
    }
}
