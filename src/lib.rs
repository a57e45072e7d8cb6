// ABOUTME: Decoder for Apple binary property lists (bplist00) for Rust.
// ABOUTME: Provides a dynamic Value tree, serde integration and hardened validation.

//! # serde_bplist
//!
//! A strict decoder for Apple's binary property list format (`bplist00`),
//! the offset-indexed serialization used for `Info.plist` files inside
//! application bundles, preference files and keyed archives.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Debug)]
//! struct Info {
//!     #[serde(rename = "CFBundleIdentifier")]
//!     bundle_identifier: String,
//!     #[serde(rename = "CFBundleVersion")]
//!     bundle_version: String,
//! }
//!
//! let bytes = std::fs::read("Info.plist").unwrap();
//! let info: Info = serde_bplist::from_slice(&bytes).unwrap();
//! println!("{} {}", info.bundle_identifier, info.bundle_version);
//! ```
//!
//! ## Working with Dynamic Values
//!
//! ```rust,no_run
//! use serde_bplist::{decode_value, Error};
//!
//! # let bytes: Vec<u8> = Vec::new();
//! match decode_value(&bytes) {
//!     Ok(value) => println!("{}", value),
//!     // Not binary: hand the bytes to an XML plist parser instead.
//!     Err(Error::NotBinaryFormat) => {}
//!     Err(e) => eprintln!("broken plist: {e}"),
//! }
//! ```
//!
//! ## Scope
//!
//! Decoding only. XML plists are reported as [`Error::NotBinaryFormat`] so the
//! caller can dispatch to another parser. Keyed-archiver UIDs are surfaced as
//! [`Uid`] values and not resolved.
//!
//! ## Resource Limits
//!
//! Default limits (see [`DecoderConfig`]):
//! - Maximum document size: 512 MiB
//! - Maximum nesting depth: 512
//! - Maximum object count: 16,777,216
//! - Maximum container size: 4,194,304 elements
//! - Maximum references followed per decode: 16,777,216
//!
//! Objects that contain themselves are rejected rather than recursed into.

pub mod de;
pub mod decoder;
pub mod error;
pub mod layout;
pub mod types;
pub mod value;

// Re-export commonly used items at the crate root
pub use de::{from_reader, from_slice, from_slice_with_config, from_value};
pub use decoder::{Decoder, DecoderConfig};
pub use error::{Error, ErrorKind, Result};
pub use layout::{has_binary_magic, is_binary_plist, OffsetTable, Trailer};
pub use types::{limits, marker, Date, Integer, Uid};
pub use value::{Dictionary, Value};

// The plist! macro is automatically exported at crate root via #[macro_export]

use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};

/// Decode a binary plist into a `Value`.
///
/// # Example
///
/// ```rust
/// use serde_bplist::{decode_value, Error};
///
/// assert_eq!(decode_value(b"<?xml version=\"1.0\"?>"), Err(Error::NotBinaryFormat));
/// ```
pub fn decode_value(data: &[u8]) -> Result<Value> {
    Decoder::new(data)?.decode_root()
}

/// Decode a binary plist into a `Value` with custom limits.
pub fn decode_value_with_config(data: &[u8], config: DecoderConfig) -> Result<Value> {
    Decoder::with_config(data, config)?.decode_root()
}

/// Decode a binary plist from a seekable stream.
///
/// If the stream is not a binary plist, `Error::NotBinaryFormat` is returned
/// and the stream is left positioned at its start, ready for another parser.
pub fn read_value<R: Read + Seek>(reader: &mut R) -> Result<Value> {
    if !is_binary_plist(reader)? {
        return Err(Error::NotBinaryFormat);
    }
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode_value(&data)
}

// Dates become RFC 3339 strings and UIDs plain integers, so values can be
// re-encoded by formats that lack those types.
impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => {
                if let Some(i) = n.as_i64() {
                    serializer.serialize_i64(i)
                } else if let Some(u) = n.as_u64() {
                    serializer.serialize_u64(u)
                } else if let Some(u) = n.as_u128() {
                    serializer.serialize_u128(u)
                } else {
                    serializer.serialize_f64(n.as_f64())
                }
            }
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Date(d) => serializer.serialize_str(&d.to_rfc3339()),
            Value::Data(bytes) => serializer.serialize_bytes(bytes),
            Value::String(s) => serializer.serialize_str(s),
            Value::Uid(u) => match u.as_u64() {
                Some(small) => serializer.serialize_u64(small),
                None => serializer.serialize_u128(u.get()),
            },
            Value::Array(items) | Value::Set(items) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(dict) => {
                use serde::ser::SerializeMap;
                let mut m = serializer.serialize_map(Some(dict.len()))?;
                for (key, val) in dict {
                    m.serialize_entry(key, val)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> serde::de::Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "any valid plist value")
            }

            fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
                Ok(Value::from(v))
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
                Ok(Value::from(v))
            }

            fn visit_u128<E>(self, v: u128) -> std::result::Result<Value, E> {
                Ok(Value::Integer(Integer::from_u128(v)))
            }

            fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E> {
                Ok(Value::Real(v))
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
                Ok(Value::String(v.to_owned()))
            }

            fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
                Ok(Value::String(v))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Value, E> {
                Ok(Value::Data(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
                Ok(Value::Data(v))
            }

            fn visit_unit<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D: serde::Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> std::result::Result<Value, D::Error> {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Value, A::Error> {
                let mut arr = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    arr.push(elem);
                }
                Ok(Value::Array(arr))
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Value, A::Error> {
                let mut dict = Dictionary::new();
                while let Some((key, val)) = map.next_entry::<Value, Value>()? {
                    dict.insert(key, val);
                }
                Ok(Value::Dict(dict))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // {"name": "demo", "n": 3} with 1-byte offsets and references
    fn sample() -> Vec<u8> {
        let mut data = b"bplist00".to_vec();
        let objects: [&[u8]; 5] = [
            &[0xd2, 0x01, 0x02, 0x03, 0x04],
            &[0x54, b'n', b'a', b'm', b'e'],
            &[0x51, b'n'],
            &[0x54, b'd', b'e', b'm', b'o'],
            &[0x10, 0x03],
        ];
        let mut offsets = Vec::new();
        for object in objects {
            offsets.push(data.len() as u8);
            data.extend_from_slice(object);
        }
        let table = data.len() as u64;
        data.extend_from_slice(&offsets);
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1, 1]);
        data.extend_from_slice(&5u64.to_be_bytes());
        data.extend_from_slice(&0u64.to_be_bytes());
        data.extend_from_slice(&table.to_be_bytes());
        data
    }

    #[test]
    fn test_decode_value() {
        let value = decode_value(&sample()).unwrap();
        assert_eq!(value, plist!({ "name": "demo", "n": 3 }));
    }

    #[test]
    fn test_read_value_from_stream() {
        let mut cursor = Cursor::new(sample());
        cursor.set_position(3);
        let value = read_value(&mut cursor).unwrap();
        assert_eq!(value.get_key("name").and_then(Value::as_str), Some("demo"));
    }

    #[test]
    fn test_read_value_leaves_non_binary_stream_at_start() {
        let mut cursor = Cursor::new(b"<?xml version=\"1.0\"?><plist/>".to_vec());
        assert_eq!(read_value(&mut cursor), Err(Error::NotBinaryFormat));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_serialize_to_json() {
        let value = decode_value(&sample()).unwrap();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"name":"demo","n":3}"#);
    }

    #[test]
    fn test_value_from_json() {
        let value: Value = serde_json::from_str(r#"{"a": [1, -2, 2.5, null, true]}"#).unwrap();
        assert_eq!(
            value,
            plist!({ "a": [1, (-2), 2.5, null, true] })
        );
    }
}
