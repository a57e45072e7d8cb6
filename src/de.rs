// ABOUTME: Serde Deserializer over decoded plist values.
// ABOUTME: Lets binary plists be decoded straight into any serde-deserializable Rust type.

use crate::decoder::{Decoder, DecoderConfig};
use crate::error::{Error, Result};
use crate::value::{Dictionary, Value};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use std::io::{Read, Seek};

/// Deserialize a value from a binary plist byte slice.
///
/// # Errors
///
/// Returns an error if:
/// - The input is not a binary plist (`Error::NotBinaryFormat`)
/// - The document is malformed or exceeds the default limits
/// - The data doesn't match the expected type `T`
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    from_slice_with_config(data, DecoderConfig::default())
}

/// Deserialize a value from a binary plist byte slice with custom limits.
pub fn from_slice_with_config<T: DeserializeOwned>(data: &[u8], config: DecoderConfig) -> Result<T> {
    let value = Decoder::with_config(data, config)?.decode_root()?;
    from_value(value)
}

/// Deserialize a value from a seekable binary plist stream.
pub fn from_reader<R: Read + Seek, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    from_value(crate::read_value(reader)?)
}

/// Interpret an already decoded value as `T`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(value)
}

impl<'de> de::Deserializer<'de> for Value {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Integer(n) => {
                if let Some(i) = n.as_i64() {
                    visitor.visit_i64(i)
                } else if let Some(u) = n.as_u64() {
                    visitor.visit_u64(u)
                } else if let Some(u) = n.as_u128() {
                    visitor.visit_u128(u)
                } else {
                    visitor.visit_f64(n.as_f64())
                }
            }
            Value::Real(f) => visitor.visit_f64(f),
            Value::Date(d) => visitor.visit_string(d.to_rfc3339()),
            Value::Data(bytes) => visitor.visit_byte_buf(bytes),
            Value::String(s) => visitor.visit_string(s),
            Value::Uid(u) => match u.as_u64() {
                Some(small) => visitor.visit_u64(small),
                None => visitor.visit_u128(u.get()),
            },
            Value::Array(items) | Value::Set(items) => visitor.visit_seq(SeqDeserializer::new(items)),
            Value::Dict(dict) => visitor.visit_map(MapDeserializer::new(dict)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Null => visitor.visit_unit(),
            other => Err(Error::Custom(format!("expected null, got {other:?}"))),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            Value::Data(bytes) => visitor.visit_byte_buf(bytes),
            Value::String(s) => visitor.visit_string(s),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self {
            // Unit variant: just a string
            Value::String(variant) => visitor.visit_enum(variant.into_deserializer()),
            // Other variants: dict with a single key
            Value::Dict(dict) => {
                let mut entries = dict.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((variant, value)), None) => visitor.visit_enum(EnumDeserializer { variant, value }),
                    _ => Err(Error::Custom("expected dict with a single key for enum".into())),
                }
            }
            other => Err(Error::Custom(format!("expected string or dict for enum, got {other:?}"))),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

impl IntoDeserializer<'_, Error> for Value {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
}

impl SeqDeserializer {
    fn new(items: Vec<Value>) -> Self {
        SeqDeserializer {
            iter: items.into_iter(),
        }
    }
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        self.iter.next().map(|item| seed.deserialize(item)).transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: std::vec::IntoIter<(Value, Value)>,
    pending: Option<Value>,
}

impl MapDeserializer {
    fn new(dict: Dictionary) -> Self {
        MapDeserializer {
            iter: dict.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| Error::Custom("value requested before key".into()))?;
        seed.deserialize(value)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: Value,
    value: Value,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(self.variant)?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer {
    value: Value,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            Value::Null => Ok(()),
            _ => Err(Error::Custom("expected unit variant".into())),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(self.value)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Array(items) => visitor.visit_seq(SeqDeserializer::new(items)),
            _ => Err(Error::Custom("expected array for tuple variant".into())),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::Dict(dict) => visitor.visit_map(MapDeserializer::new(dict)),
            _ => Err(Error::Custom("expected dict for struct variant".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plist;
    use crate::types::{Date, Uid};
    use serde::Deserialize;

    #[test]
    fn test_deserialize_primitives() {
        assert!(from_value::<bool>(Value::Bool(true)).unwrap());
        assert_eq!(from_value::<i32>(Value::from(42)).unwrap(), 42);
        assert_eq!(from_value::<u8>(Value::from(200u8)).unwrap(), 200);
        assert_eq!(from_value::<f64>(Value::Real(2.5)).unwrap(), 2.5);
        assert_eq!(from_value::<String>(Value::from("hello")).unwrap(), "hello");
        assert!(from_value::<u8>(Value::from(-1)).is_err());
    }

    #[test]
    fn test_deserialize_option() {
        assert_eq!(from_value::<Option<i32>>(Value::Null).unwrap(), None);
        assert_eq!(from_value::<Option<i32>>(Value::from(7)).unwrap(), Some(7));
    }

    #[test]
    fn test_deserialize_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "PascalCase")]
        struct Info {
            #[serde(rename = "CFBundleIdentifier")]
            bundle_identifier: String,
            #[serde(rename = "CFBundleDisplayName")]
            display_name: Option<String>,
            minimum_version: Option<String>,
            device_family: Vec<u8>,
        }

        let value = plist!({
            "CFBundleIdentifier": "com.example.app",
            "DeviceFamily": [1, 2],
            "Unrelated": { "x": 1 },
        });
        let info: Info = from_value(value).unwrap();
        assert_eq!(
            info,
            Info {
                bundle_identifier: "com.example.app".into(),
                display_name: None,
                minimum_version: None,
                device_family: vec![1, 2],
            }
        );
    }

    #[test]
    fn test_deserialize_special_scalars() {
        let date = Date::from_apple_offset(0.0).unwrap();
        assert_eq!(
            from_value::<String>(Value::Date(date)).unwrap(),
            "2001-01-01T00:00:00Z"
        );
        assert_eq!(from_value::<u64>(Value::Uid(Uid::new(12))).unwrap(), 12);

        #[derive(Deserialize)]
        struct Blob {
            #[serde(with = "bytes_as_vec")]
            payload: Vec<u8>,
        }
        mod bytes_as_vec {
            pub fn deserialize<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
                struct V;
                impl serde::de::Visitor<'_> for V {
                    type Value = Vec<u8>;
                    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                        write!(f, "bytes")
                    }
                    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
                        Ok(v)
                    }
                }
                d.deserialize_byte_buf(V)
            }
        }
        let blob: Blob = from_value(plist!({ "payload": (Value::Data(vec![1, 2, 3])) })).unwrap();
        assert_eq!(blob.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_deserialize_enum() {
        #[derive(Debug, Deserialize, PartialEq)]
        enum Shape {
            Empty,
            Circle(f64),
            Rect { w: i32, h: i32 },
        }

        assert_eq!(from_value::<Shape>(Value::from("Empty")).unwrap(), Shape::Empty);
        assert_eq!(
            from_value::<Shape>(plist!({ "Circle": 1.5 })).unwrap(),
            Shape::Circle(1.5)
        );
        assert_eq!(
            from_value::<Shape>(plist!({ "Rect": { "w": 2, "h": 3 } })).unwrap(),
            Shape::Rect { w: 2, h: 3 }
        );
        assert!(from_value::<Shape>(Value::from(1)).is_err());
    }

    #[test]
    fn test_deserialize_set_as_vec() {
        let value = Value::Set(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(from_value::<Vec<String>>(value).unwrap(), vec!["a", "b"]);
    }
}
