// ABOUTME: Object decoder for bplist00 documents.
// ABOUTME: Resolves object numbers through the offset table and dispatches on the marker nibbles.

#![allow(clippy::missing_errors_doc)]

use crate::error::{Error, Result};
use crate::layout::{has_binary_magic, read_be_uint, OffsetTable, Trailer, TRAILER_SIZE};
use crate::types::{limits, marker, Date, Integer, Uid};
use crate::value::{Dictionary, Value};

/// Configuration options for the decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum container nesting depth
    pub max_depth: usize,
    /// Maximum input size in bytes
    pub max_document_size: usize,
    /// Maximum number of objects the trailer may declare
    pub max_object_count: u64,
    /// Maximum elements (or dictionary pairs) in a container
    pub max_container_size: usize,
    /// Maximum object references followed in one decode; a shared object
    /// counts once per reference
    pub max_decoded_objects: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: limits::MAX_DEPTH,
            max_document_size: limits::MAX_DOCUMENT_SIZE,
            max_object_count: limits::MAX_OBJECT_COUNT,
            max_container_size: limits::MAX_CONTAINER_SIZE,
            max_decoded_objects: limits::MAX_DECODED_OBJECTS,
        }
    }
}

/// A single decode session over one binary plist buffer.
///
/// Construction validates the header and parses the trailer and offset
/// table; objects are then decoded on demand by number.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    config: DecoderConfig,
    trailer: Trailer,
    offsets: OffsetTable,
    /// Object numbers currently being decoded, outermost first.
    path: Vec<u64>,
    /// Nesting of object references and escaped sizes.
    depth: usize,
    /// References followed since the current decode started.
    decoded: usize,
}

impl<'a> Decoder<'a> {
    /// Open a decode session with the default limits.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::with_config(data, DecoderConfig::default())
    }

    /// Open a decode session with custom limits.
    pub fn with_config(data: &'a [u8], config: DecoderConfig) -> Result<Self> {
        if !has_binary_magic(data) {
            return Err(Error::NotBinaryFormat);
        }
        if data.len() > config.max_document_size {
            return Err(Error::MaxDocumentSizeExceeded);
        }
        let trailer = Trailer::parse(data)?;
        if trailer.object_count > config.max_object_count {
            return Err(Error::MaxObjectCountExceeded);
        }
        let offsets = OffsetTable::parse(data, &trailer)?;

        log::debug!(
            "bplist: {} objects, root {}, offset width {}, ref width {}",
            trailer.object_count,
            trailer.root_object,
            trailer.offset_size,
            trailer.object_ref_size
        );

        Ok(Self {
            data,
            pos: 0,
            config,
            trailer,
            offsets,
            path: Vec::new(),
            depth: 0,
            decoded: 0,
        })
    }

    #[must_use]
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    #[must_use]
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Cursor position after the last read.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decode the object the trailer names as root.
    pub fn decode_root(&mut self) -> Result<Value> {
        self.decode_object(self.trailer.root_object)
    }

    /// Decode object number `object` and everything it references.
    pub fn decode_object(&mut self, object: u64) -> Result<Value> {
        self.path.clear();
        self.depth = 0;
        self.decoded = 0;
        let trailer_offset = self.data.len() - TRAILER_SIZE;
        self.decode_ref(object, trailer_offset)
    }

    /// Follow an object reference read at `ref_offset`.
    fn decode_ref(&mut self, object: u64, ref_offset: usize) -> Result<Value> {
        let offset = self.offsets.get(object).ok_or(Error::ObjectRefOutOfRange {
            reference: object,
            count: self.trailer.object_count,
            offset: ref_offset,
        })?;
        if self.path.contains(&object) {
            log::debug!("bplist: object {object} at offset {offset} references itself");
            return Err(Error::CyclicReference { object, offset });
        }
        if self.decoded >= self.config.max_decoded_objects {
            log::debug!(
                "bplist: decoded object limit {} hit at offset {offset}",
                self.config.max_decoded_objects
            );
            return Err(Error::MaxDecodedObjectsExceeded { offset });
        }
        self.decoded += 1;

        self.enter(offset)?;
        self.path.push(object);
        self.pos = offset;
        let result = self.read_object();
        self.path.pop();
        self.depth -= 1;
        result
    }

    #[inline]
    fn enter(&mut self, offset: usize) -> Result<()> {
        if self.depth >= self.config.max_depth {
            log::debug!("bplist: nesting limit {} hit at offset {offset}", self.config.max_depth);
            return Err(Error::MaxDepthExceeded { offset });
        }
        self.depth += 1;
        Ok(())
    }

    #[inline]
    fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(Error::Truncated { offset: self.pos })
    }

    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read exactly n bytes.
    #[inline]
    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::Truncated { offset: self.pos })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    #[inline]
    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    /// Decode the object whose marker byte is at the cursor.
    fn read_object(&mut self) -> Result<Value> {
        let start = self.pos;
        let m = self.read_byte()?;
        let extra = marker::extra(m);
        let invalid = Error::InvalidMarker {
            marker: m,
            offset: start,
        };

        match marker::kind(m) {
            marker::SIMPLE => match extra {
                // A fill byte standing in object position carries no value.
                marker::NULL | marker::FILL => Ok(Value::Null),
                marker::FALSE => Ok(Value::Bool(false)),
                marker::TRUE => Ok(Value::Bool(true)),
                _ => Err(invalid),
            },
            marker::INT => {
                let exponent = self.read_size(extra)?;
                self.read_integer(exponent, start).map(Value::Integer)
            }
            marker::REAL => {
                let exponent = self.read_size(extra)?;
                self.read_real(exponent, start).map(Value::Real)
            }
            marker::DATE if extra == marker::DATE_EXTRA => self.read_date(start).map(Value::Date),
            marker::DATA => {
                let len = self.read_size(extra)?;
                Ok(Value::Data(self.read_bytes(len)?.to_vec()))
            }
            marker::ASCII_STRING => {
                let len = self.read_size(extra)?;
                self.read_ascii(len, start).map(Value::String)
            }
            marker::UTF16_STRING => {
                let len = self.read_size(extra)?;
                self.read_utf16(len, start).map(Value::String)
            }
            marker::UID => self.read_uid(usize::from(extra) + 1).map(Value::Uid),
            marker::ARRAY => {
                let count = self.read_size(extra)?;
                log::trace!("bplist: array of {count} at offset {start}");
                self.read_array(count, start).map(Value::Array)
            }
            marker::SET => {
                let count = self.read_size(extra)?;
                log::trace!("bplist: set of {count} at offset {start}");
                self.read_array(count, start).map(Value::Set)
            }
            marker::DICT => {
                let count = self.read_size(extra)?;
                log::trace!("bplist: dict of {count} at offset {start}");
                self.read_dict(count, start).map(Value::Dict)
            }
            _ => Err(invalid),
        }
    }

    /// Resolve a low-nibble size, following the escape to an inline integer object.
    fn read_size(&mut self, extra: u8) -> Result<usize> {
        if extra != marker::EXTENDED {
            return Ok(usize::from(extra));
        }

        let at = self.pos;
        if marker::kind(self.peek_byte()?) != marker::INT {
            return Err(Error::InvalidLength { offset: at });
        }
        self.enter(at)?;
        let size = self.read_object();
        self.depth -= 1;

        size?
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(Error::InvalidLength { offset: at })
    }

    /// Read an integer of `2^exponent` bytes.
    fn read_integer(&mut self, exponent: usize, start: usize) -> Result<Integer> {
        let width = if exponent < 64 { 1u64 << exponent } else { u64::MAX };
        match width {
            1 | 2 | 4 => {
                let bytes = self.read_bytes(width as usize)?;
                Ok(Integer::from(read_be_uint(bytes)))
            }
            8 => Ok(Integer::from_i64(i64::from_be_bytes(self.read_fixed()?))),
            16 => Ok(Integer::from_u128(u128::from_be_bytes(self.read_fixed()?))),
            _ => Err(Error::IntegerTooWide {
                width,
                offset: start,
            }),
        }
    }

    /// Read a real of `2^exponent` bytes, widened to f64.
    fn read_real(&mut self, exponent: usize, start: usize) -> Result<f64> {
        match exponent {
            2 => Ok(f64::from(f32::from_be_bytes(self.read_fixed()?))),
            3 => Ok(f64::from_be_bytes(self.read_fixed()?)),
            _ => Err(Error::UnsupportedRealWidth {
                width: if exponent < 64 { 1u64 << exponent } else { u64::MAX },
                offset: start,
            }),
        }
    }

    fn read_date(&mut self, start: usize) -> Result<Date> {
        let seconds = f64::from_be_bytes(self.read_fixed()?);
        Date::from_apple_offset(seconds).ok_or(Error::InvalidDate { offset: start })
    }

    fn read_ascii(&mut self, len: usize, start: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        if !bytes.is_ascii() {
            return Err(Error::InvalidAscii { offset: start });
        }
        Ok(bytes.iter().copied().map(char::from).collect())
    }

    /// `len` is in UTF-16 code units.
    fn read_utf16(&mut self, len: usize, start: usize) -> Result<String> {
        let byte_len = len
            .checked_mul(2)
            .ok_or(Error::Truncated { offset: self.pos })?;
        let bytes = self.read_bytes(byte_len)?;
        let units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        char::decode_utf16(units)
            .collect::<std::result::Result<String, _>>()
            .map_err(|_| Error::InvalidUtf16 { offset: start })
    }

    /// Read an unsigned UID of `width` (1 to 16) bytes.
    fn read_uid(&mut self, width: usize) -> Result<Uid> {
        let bytes = self.read_bytes(width)?;
        let value = bytes.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b));
        Ok(Uid::new(value))
    }

    /// Read `count` object references at the cursor, paired with their positions.
    fn read_refs(&mut self, count: usize, start: usize) -> Result<Vec<(u64, usize)>> {
        if count > self.config.max_container_size {
            log::debug!("bplist: container of {count} at offset {start} exceeds limit");
            return Err(Error::MaxContainerSizeExceeded { offset: start });
        }
        let width = usize::from(self.trailer.object_ref_size);
        let total = count
            .checked_mul(width)
            .ok_or(Error::Truncated { offset: self.pos })?;
        let base = self.pos;
        let bytes = self.read_bytes(total)?;
        Ok(bytes
            .chunks_exact(width)
            .enumerate()
            .map(|(i, chunk)| (read_be_uint(chunk), base + i * width))
            .collect())
    }

    fn read_array(&mut self, count: usize, start: usize) -> Result<Vec<Value>> {
        let refs = self.read_refs(count, start)?;
        refs.into_iter()
            .map(|(object, at)| self.decode_ref(object, at))
            .collect()
    }

    /// Key references come first as one block, then value references.
    fn read_dict(&mut self, count: usize, start: usize) -> Result<Dictionary> {
        let keys = self.read_refs(count, start)?;
        let values = self.read_refs(count, start)?;

        let mut dict = Dictionary::with_capacity(count);
        for ((key_ref, key_at), (value_ref, value_at)) in keys.into_iter().zip(values) {
            let key = self.decode_ref(key_ref, key_at)?;
            let value = self.decode_ref(value_ref, value_at)?;
            dict.insert(key, value);
        }
        Ok(dict)
    }
}
