// ABOUTME: File-level structure of a bplist00 document: magic header, trailer and offset table.
// ABOUTME: Everything here is parsed once per decode session and is immutable afterwards.

use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Magic prefix shared by every binary plist version.
pub const MAGIC: &[u8; 7] = b"bplist0";

/// Magic plus the one-byte version digit.
pub const HEADER_SIZE: usize = 8;

/// Size of the fixed footer.
pub const TRAILER_SIZE: usize = 32;

/// Check whether a buffer starts with the binary plist magic.
#[must_use]
pub fn has_binary_magic(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Check whether a stream holds a binary plist.
///
/// Reads at most 7 bytes from the start of the stream and rewinds to the
/// start before returning, whatever the outcome of the check.
pub fn is_binary_plist<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    reader.seek(SeekFrom::Start(0))?;
    let mut header = Vec::with_capacity(MAGIC.len());
    reader.by_ref().take(MAGIC.len() as u64).read_to_end(&mut header)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(header.as_slice() == MAGIC)
}

/// Read a big-endian unsigned integer of 1 to 8 bytes.
#[inline]
pub(crate) fn read_be_uint(bytes: &[u8]) -> u64 {
    debug_assert!(!bytes.is_empty() && bytes.len() <= 8);
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// The fixed 32-byte footer describing table geometry.
///
/// Layout (big-endian): 5 unused bytes, sort version, offset entry width,
/// object reference width, object count, root object number, offset table
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub sort_version: u8,
    /// Width in bytes of each offset table entry.
    pub offset_size: u8,
    /// Width in bytes of each object reference inside containers.
    pub object_ref_size: u8,
    pub object_count: u64,
    pub root_object: u64,
    /// Byte position of the offset table.
    pub offset_table_offset: u64,
}

impl Trailer {
    /// Parse the trailer from the last 32 bytes of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < TRAILER_SIZE {
            return Err(Error::TooShort { len: data.len() });
        }
        let t = &data[data.len() - TRAILER_SIZE..];
        let be_u64 = |at: usize| read_be_uint(&t[at..at + 8]);

        let trailer = Trailer {
            sort_version: t[5],
            offset_size: t[6],
            object_ref_size: t[7],
            object_count: be_u64(8),
            root_object: be_u64(16),
            offset_table_offset: be_u64(24),
        };
        trailer.validate()?;
        Ok(trailer)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.offset_size) {
            return Err(Error::InvalidTrailer(format!(
                "offset entry width {} not in 1..=8",
                self.offset_size
            )));
        }
        if !(1..=8).contains(&self.object_ref_size) {
            return Err(Error::InvalidTrailer(format!(
                "object reference width {} not in 1..=8",
                self.object_ref_size
            )));
        }
        if self.object_count == 0 {
            return Err(Error::InvalidTrailer("no objects".into()));
        }
        if self.root_object >= self.object_count {
            return Err(Error::InvalidTrailer(format!(
                "root object {} not below object count {}",
                self.root_object, self.object_count
            )));
        }
        Ok(())
    }
}

/// Object number to byte offset lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<usize>,
}

impl OffsetTable {
    /// Decode the offset table described by `trailer`.
    ///
    /// The table must lie entirely before the trailer. Each entry must point
    /// into the object area (between the header and the trailer).
    pub fn parse(data: &[u8], trailer: &Trailer) -> Result<Self> {
        let out_of_bounds = || Error::OffsetTableOutOfBounds {
            offset: trailer.offset_table_offset,
        };
        let width = usize::from(trailer.offset_size);
        let object_area_end = data.len().saturating_sub(TRAILER_SIZE);

        let start = usize::try_from(trailer.offset_table_offset).map_err(|_| out_of_bounds())?;
        let count = usize::try_from(trailer.object_count).map_err(|_| out_of_bounds())?;
        let end = count
            .checked_mul(width)
            .and_then(|len| start.checked_add(len))
            .ok_or_else(out_of_bounds)?;
        if end > object_area_end {
            return Err(out_of_bounds());
        }

        let offsets = data[start..end]
            .chunks_exact(width)
            .enumerate()
            .map(|(object, entry)| {
                let offset = read_be_uint(entry);
                match usize::try_from(offset) {
                    Ok(o) if (HEADER_SIZE..object_area_end).contains(&o) => Ok(o),
                    _ => Err(Error::OffsetOutOfRange {
                        object: object as u64,
                        offset,
                    }),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { offsets })
    }

    /// Byte offset of `object`, if it exists.
    #[inline]
    #[must_use]
    pub fn get(&self, object: u64) -> Option<usize> {
        usize::try_from(object)
            .ok()
            .and_then(|i| self.offsets.get(i).copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets.iter().copied()
    }
}
