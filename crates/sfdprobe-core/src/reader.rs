//! SFDP reader capability
//!
//! The probe never talks to a bus directly. Everything it needs is fetched
//! through [`SfdpReader`], which a programmer or driver implements on top of
//! its RDSFDP (0x5A) transaction.

use core::fmt::Debug;

/// Read access to the SFDP address space of a flash device
///
/// Implementations fill `buf` entirely with the bytes starting at `addr`
/// or return an error. Reads are blocking; bounding a hung bus is the
/// implementation's responsibility.
pub trait SfdpReader {
    /// Error reported by the underlying transport
    type Error: Debug;

    /// Read `buf.len()` bytes of SFDP data starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<R: SfdpReader + ?Sized> SfdpReader for &mut R {
    type Error = R::Error;

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(addr, buf)
    }
}

/// Error from [`SliceReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Requested start address
    pub addr: u32,
    /// Requested length
    pub len: usize,
}

/// Reader over an in-memory SFDP image (e.g. a dump taken with RDSFDP)
#[derive(Debug, Clone, Copy)]
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    /// Create a reader over `data`, which starts at SFDP address 0
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl SfdpReader for SliceReader<'_> {
    type Error = OutOfBounds;

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = addr as usize;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| self.data.get(start..end))
            .ok_or(OutOfBounds {
                addr,
                len: buf.len(),
            })?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// Reader backed by a closure
///
/// Convenient for wiring the probe to an existing bus driver without a
/// dedicated type:
///
/// ```ignore
/// let mut reader = FnReader::new(|addr, buf| qspi.read_sfdp(addr, buf));
/// ```
pub struct FnReader<F> {
    read: F,
}

impl<F> FnReader<F> {
    /// Wrap a `FnMut(addr, buf) -> Result<(), E>` closure
    pub const fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F, E> SfdpReader for FnReader<F>
where
    F: FnMut(u32, &mut [u8]) -> Result<(), E>,
    E: Debug,
{
    type Error = E;

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        (self.read)(addr, buf)
    }
}
