// ABOUTME: Marker nibbles of the bplist00 object encoding plus the scalar types they decode to.
// ABOUTME: Integer, Uid and Date live here; resource ceilings live in `limits`.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::cmp::Ordering;
use std::fmt;

/// Object marker layout.
///
/// Every object starts with one marker byte: the high nibble selects the
/// object type, the low nibble carries a value, a size, or [`EXTENDED`]
/// when the size follows as a separate integer object.
///
/// [`EXTENDED`]: marker::EXTENDED
pub mod marker {
    // High nibbles
    pub const SIMPLE: u8 = 0x0;
    pub const INT: u8 = 0x1;
    pub const REAL: u8 = 0x2;
    pub const DATE: u8 = 0x3;
    pub const DATA: u8 = 0x4;
    pub const ASCII_STRING: u8 = 0x5;
    pub const UTF16_STRING: u8 = 0x6;
    pub const UID: u8 = 0x8;
    pub const ARRAY: u8 = 0xa;
    pub const SET: u8 = 0xc;
    pub const DICT: u8 = 0xd;

    // Low nibbles of SIMPLE
    pub const NULL: u8 = 0x0;
    pub const FALSE: u8 = 0x8;
    pub const TRUE: u8 = 0x9;
    pub const FILL: u8 = 0xf;

    /// The only valid low nibble for DATE.
    pub const DATE_EXTRA: u8 = 0x3;

    /// Low nibble meaning "size is the next object".
    pub const EXTENDED: u8 = 0xf;

    /// Type nibble of a marker byte.
    #[inline]
    pub const fn kind(marker: u8) -> u8 {
        marker >> 4
    }

    /// Value/size nibble of a marker byte.
    #[inline]
    pub const fn extra(marker: u8) -> u8 {
        marker & 0x0f
    }
}

/// An integer as stored in a binary plist.
///
/// 1, 2 and 4 byte integers are unsigned, 8 byte integers are signed and
/// 16 byte integers are an unsigned magnitude, so no single primitive holds
/// every value. Zero is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Integer {
    negative: bool,
    magnitude: u128,
}

impl Integer {
    /// Create an Integer from a signed 64-bit value.
    #[inline]
    pub const fn from_i64(value: i64) -> Self {
        Self {
            negative: value < 0,
            magnitude: value.unsigned_abs() as u128,
        }
    }

    /// Create an Integer from an unsigned magnitude.
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            negative: false,
            magnitude: value,
        }
    }

    /// Check if this Integer is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// Absolute value.
    #[inline]
    pub const fn magnitude(&self) -> u128 {
        self.magnitude
    }

    #[allow(clippy::cast_possible_wrap)] // 2^127 wraps to i128::MIN, which is the intended value
    pub fn as_i128(&self) -> Option<i128> {
        if !self.negative {
            return i128::try_from(self.magnitude).ok();
        }
        if self.magnitude > i128::MAX as u128 + 1 {
            return None;
        }
        Some((self.magnitude as i128).wrapping_neg())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        if self.negative {
            return None;
        }
        u64::try_from(self.magnitude).ok()
    }

    pub fn as_u128(&self) -> Option<u128> {
        if self.negative {
            None
        } else {
            Some(self.magnitude)
        }
    }

    /// Convert to f64. May lose precision for large magnitudes.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        let value = self.magnitude as f64;
        if self.negative {
            -value
        } else {
            value
        }
    }
}

impl Ord for Integer {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Integer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{}", self.magnitude)
    }
}

macro_rules! integer_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Integer {
            fn from(n: $t) -> Self {
                Integer::from_i64(i64::from(n))
            }
        })*
    };
}

macro_rules! integer_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Integer {
            fn from(n: $t) -> Self {
                Integer::from_u128(u128::from(n))
            }
        })*
    };
}

integer_from_signed!(i8, i16, i32, i64);
integer_from_unsigned!(u8, u16, u32, u64, u128);

/// A keyed-archiver back-reference (`CF$UID`).
///
/// Stored as an unsigned integer of 1 to 16 bytes. Equality and ordering
/// are those of the wrapped integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Uid(u128);

impl Uid {
    #[inline]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(&self) -> u128 {
        self.0
    }

    /// The value, if it fits in 64 bits (true of every archive seen in practice).
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }
}

impl From<u128> for Uid {
    fn from(value: u128) -> Self {
        Uid(value)
    }
}

impl From<Uid> for u128 {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

/// A point in time, stored on disk as seconds relative to 2001-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(DateTime<Utc>);

impl Date {
    /// Seconds between the Unix epoch and the Apple reference date.
    pub const APPLE_EPOCH_UNIX_SECONDS: i64 = 978_307_200;

    /// 2001-01-01T00:00:00Z.
    pub fn apple_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(Self::APPLE_EPOCH_UNIX_SECONDS)
    }

    /// Build a date from a (possibly negative, possibly fractional) offset in
    /// seconds from the Apple reference date.
    ///
    /// Returns `None` for NaN, infinities and offsets outside chrono's range.
    #[allow(clippy::cast_possible_truncation)] // range checked before cast
    #[allow(clippy::cast_precision_loss)]
    pub fn from_apple_offset(seconds: f64) -> Option<Date> {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        if whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
            return None;
        }
        let mut secs = whole as i64;
        let mut nanos = ((seconds - whole) * 1e9).round() as i64;
        if nanos >= 1_000_000_000 {
            secs = secs.checked_add(1)?;
            nanos -= 1_000_000_000;
        }
        let delta = TimeDelta::try_seconds(secs)?.checked_add(&TimeDelta::nanoseconds(nanos))?;
        Self::apple_epoch().checked_add_signed(delta).map(Date)
    }

    /// Seconds relative to the Apple reference date.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_apple_offset(&self) -> f64 {
        let delta = self.0 - Self::apple_epoch();
        delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// RFC 3339 text, e.g. `2001-01-01T00:00:00Z`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        Date(dt)
    }
}

impl From<Date> for DateTime<Utc> {
    fn from(date: Date) -> Self {
        date.0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// Default resource ceilings applied by the decoder.
pub mod limits {
    /// Maximum input size in bytes (512 MiB)
    pub const MAX_DOCUMENT_SIZE: usize = 512 * 1024 * 1024;

    /// Maximum container nesting depth
    pub const MAX_DEPTH: usize = 512;

    /// Maximum number of objects declared by the trailer
    pub const MAX_OBJECT_COUNT: u64 = 1 << 24;

    /// Maximum elements (or pairs) in a single container
    pub const MAX_CONTAINER_SIZE: usize = 1 << 22;

    /// Maximum object references followed in one decode, shared ones counted
    /// each time they are reached
    pub const MAX_DECODED_OBJECTS: usize = 1 << 24;
}
