// ABOUTME: Minimal bplist00 writer used to build fixtures for tests and benchmarks.
// ABOUTME: Emits one object per value without uniquing; reference and offset widths are configurable.

#![allow(dead_code)]

use serde_bplist::{Integer, Value};

/// Builds a document object by object, then lays out the offset table and trailer.
pub struct PlistBuilder {
    objects: Vec<Vec<u8>>,
    ref_size: u8,
    offset_size: Option<u8>,
}

impl PlistBuilder {
    pub fn new() -> Self {
        Self::with_ref_size(2)
    }

    pub fn with_ref_size(ref_size: u8) -> Self {
        assert!((1..=8).contains(&ref_size));
        Self {
            objects: Vec::new(),
            ref_size,
            offset_size: None,
        }
    }

    /// Use a fixed offset table width instead of the smallest one that fits.
    pub fn offset_size(mut self, width: u8) -> Self {
        assert!((1..=8).contains(&width));
        self.offset_size = Some(width);
        self
    }

    pub fn object_count(&self) -> u64 {
        self.objects.len() as u64
    }

    /// Append pre-encoded object bytes and return their object number.
    pub fn raw(&mut self, encoded: Vec<u8>) -> u64 {
        self.objects.push(encoded);
        self.objects.len() as u64 - 1
    }

    /// Encode a reference the way container objects store it.
    pub fn reference(&self, object: u64) -> Vec<u8> {
        let width = usize::from(self.ref_size);
        object.to_be_bytes()[8 - width..].to_vec()
    }

    /// Append `value` (children first) and return its object number.
    pub fn add(&mut self, value: &Value) -> u64 {
        let encoded = match value {
            Value::Null => vec![0x00],
            Value::Bool(false) => vec![0x08],
            Value::Bool(true) => vec![0x09],
            Value::Integer(n) => encode_integer(n),
            Value::Real(f) => {
                let mut out = vec![0x23];
                out.extend_from_slice(&f.to_be_bytes());
                out
            }
            Value::Date(d) => {
                let mut out = vec![0x33];
                out.extend_from_slice(&d.to_apple_offset().to_be_bytes());
                out
            }
            Value::Data(bytes) => {
                let mut out = header(0x4, bytes.len());
                out.extend_from_slice(bytes);
                out
            }
            Value::String(s) if s.is_ascii() => {
                let mut out = header(0x5, s.len());
                out.extend_from_slice(s.as_bytes());
                out
            }
            Value::String(s) => {
                let units: Vec<u16> = s.encode_utf16().collect();
                let mut out = header(0x6, units.len());
                for unit in units {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
                out
            }
            Value::Uid(uid) => {
                let bytes = uid.get().to_be_bytes();
                let skip = bytes.iter().take(15).take_while(|&&b| b == 0).count();
                let width = 16 - skip;
                let mut out = vec![0x80 | (width as u8 - 1)];
                out.extend_from_slice(&bytes[skip..]);
                out
            }
            Value::Array(items) => self.container(0xa, items),
            Value::Set(items) => self.container(0xc, items),
            Value::Dict(dict) => {
                let keys: Vec<u64> = dict.keys().map(|k| self.add(k)).collect();
                let values: Vec<u64> = dict.values().map(|v| self.add(v)).collect();
                let mut out = header(0xd, dict.len());
                for object in keys.into_iter().chain(values) {
                    out.extend(self.reference(object));
                }
                out
            }
        };
        self.raw(encoded)
    }

    fn container(&mut self, kind: u8, items: &[Value]) -> Vec<u8> {
        let refs: Vec<u64> = items.iter().map(|item| self.add(item)).collect();
        let mut out = header(kind, items.len());
        for object in refs {
            out.extend(self.reference(object));
        }
        out
    }

    /// Lay out header, objects, offset table and trailer.
    pub fn finish(self, root: u64) -> Vec<u8> {
        let mut out = b"bplist00".to_vec();
        let mut offsets = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            offsets.push(out.len() as u64);
            out.extend_from_slice(object);
        }
        let table = out.len() as u64;
        let width = self.offset_size.unwrap_or_else(|| smallest_width(table));
        for offset in offsets {
            out.extend_from_slice(&offset.to_be_bytes()[8 - usize::from(width)..]);
        }
        out.extend_from_slice(&[0, 0, 0, 0, 0, 0, width, self.ref_size]);
        out.extend_from_slice(&(self.objects.len() as u64).to_be_bytes());
        out.extend_from_slice(&root.to_be_bytes());
        out.extend_from_slice(&table.to_be_bytes());
        out
    }
}

/// Encode a whole value tree with default widths.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut builder = PlistBuilder::new();
    let root = builder.add(value);
    builder.finish(root)
}

fn smallest_width(max: u64) -> u8 {
    match max {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    }
}

/// Marker byte plus, for counts of 15 or more, the trailing integer object.
pub fn header(kind: u8, count: usize) -> Vec<u8> {
    if count < 15 {
        vec![(kind << 4) | count as u8]
    } else {
        let mut out = vec![(kind << 4) | 0x0f];
        out.extend(encode_uint(count as u64));
        out
    }
}

fn encode_uint(n: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    if n <= 0xff {
        out.push(0x10);
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0x11);
        out.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0x12);
        out.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        out.push(0x13);
        out.extend_from_slice(&n.to_be_bytes());
    }
    out
}

fn encode_integer(n: &Integer) -> Vec<u8> {
    match (n.as_u64(), n.as_i64()) {
        (Some(u), _) if u <= i64::MAX as u64 => encode_uint(u),
        (None, Some(i)) => {
            let mut out = vec![0x13];
            out.extend_from_slice(&i.to_be_bytes());
            out
        }
        _ => {
            let mut out = vec![0x14];
            out.extend_from_slice(&n.magnitude().to_be_bytes());
            out
        }
    }
}

/// Convert a hex string (whitespace ignored) into bytes.
pub fn hex_to_bytes(s: &str) -> Vec<u8> {
    let hex: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}
