// ABOUTME: Error types for binary property list decoding.
// ABOUTME: Variants are grouped into kinds so callers can tell "not a bplist" from "broken bplist".

use std::fmt;

/// The result type for bplist operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input does not start with the binary plist magic.
    /// Recoverable: the caller may retry with an XML plist decoder.
    NotBinaryFormat,
    /// The input claims to be a binary plist but is structurally invalid.
    MalformedInput,
    /// Reading the input from a stream failed.
    Io,
    /// The decoded value did not fit the requested Rust type.
    Custom,
}

/// Errors that can occur while decoding a binary plist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Header magic is not `bplist0`.
    NotBinaryFormat,

    /// Input is shorter than the fixed-size trailer.
    TooShort { len: usize },

    /// Trailer geometry is unusable.
    InvalidTrailer(String),

    /// The offset table does not fit inside the input.
    OffsetTableOutOfBounds { offset: u64 },

    /// An object's offset points outside the object area.
    OffsetOutOfRange { object: u64, offset: u64 },

    /// A container references an object number that does not exist.
    ObjectRefOutOfRange { reference: u64, count: u64, offset: usize },

    /// An object body runs past the end of the input.
    Truncated { offset: usize },

    /// Unknown marker byte, or a known high nibble with an invalid low nibble.
    InvalidMarker { marker: u8, offset: usize },

    /// An escaped size was not a non-negative integer.
    InvalidLength { offset: usize },

    /// Integer encoding wider than 16 bytes.
    IntegerTooWide { width: u64, offset: usize },

    /// Real with a width other than 4 or 8 bytes.
    UnsupportedRealWidth { width: u64, offset: usize },

    /// Date offset is not finite or cannot be represented.
    InvalidDate { offset: usize },

    /// Non-ASCII byte inside an ASCII string object.
    InvalidAscii { offset: usize },

    /// Unpaired surrogate inside a UTF-16 string object.
    InvalidUtf16 { offset: usize },

    /// An object (transitively) contains itself.
    CyclicReference { object: u64, offset: usize },

    /// Container nesting too deep.
    MaxDepthExceeded { offset: usize },

    /// Container has too many elements.
    MaxContainerSizeExceeded { offset: usize },

    /// Shared references expand to more objects than allowed.
    MaxDecodedObjectsExceeded { offset: usize },

    /// Input exceeds the configured document size.
    MaxDocumentSizeExceeded,

    /// Trailer declares more objects than allowed.
    MaxObjectCountExceeded,

    /// IO error while reading a stream.
    Io(String),

    /// Custom error message (for serde integration).
    Custom(String),
}

impl Error {
    /// Returns a stable snake_case name for the error.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::NotBinaryFormat => "not_binary_format",
            Error::TooShort { .. } => "too_short",
            Error::InvalidTrailer(_) => "invalid_trailer",
            Error::OffsetTableOutOfBounds { .. } => "offset_table_out_of_bounds",
            Error::OffsetOutOfRange { .. } => "offset_out_of_range",
            Error::ObjectRefOutOfRange { .. } => "object_ref_out_of_range",
            Error::Truncated { .. } => "truncated",
            Error::InvalidMarker { .. } => "invalid_marker",
            Error::InvalidLength { .. } => "invalid_length",
            Error::IntegerTooWide { .. } => "integer_too_wide",
            Error::UnsupportedRealWidth { .. } => "unsupported_real_width",
            Error::InvalidDate { .. } => "invalid_date",
            Error::InvalidAscii { .. } => "invalid_ascii",
            Error::InvalidUtf16 { .. } => "invalid_utf16",
            Error::CyclicReference { .. } => "cyclic_reference",
            Error::MaxDepthExceeded { .. } => "max_depth_exceeded",
            Error::MaxContainerSizeExceeded { .. } => "max_container_size_exceeded",
            Error::MaxDecodedObjectsExceeded { .. } => "max_decoded_objects_exceeded",
            Error::MaxDocumentSizeExceeded => "max_document_size_exceeded",
            Error::MaxObjectCountExceeded => "max_object_count_exceeded",
            Error::Io(_) => "io_error",
            Error::Custom(_) => "custom",
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotBinaryFormat => ErrorKind::NotBinaryFormat,
            Error::Io(_) => ErrorKind::Io,
            Error::Custom(_) => ErrorKind::Custom,
            _ => ErrorKind::MalformedInput,
        }
    }

    /// True when the input simply is not a binary plist.
    #[must_use]
    pub fn is_not_binary(&self) -> bool {
        self.kind() == ErrorKind::NotBinaryFormat
    }

    /// True when the input is a binary plist that failed validation.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.kind() == ErrorKind::MalformedInput
    }

    /// Byte offset of the violation, when known.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::ObjectRefOutOfRange { offset, .. }
            | Error::Truncated { offset }
            | Error::InvalidMarker { offset, .. }
            | Error::InvalidLength { offset }
            | Error::IntegerTooWide { offset, .. }
            | Error::UnsupportedRealWidth { offset, .. }
            | Error::InvalidDate { offset }
            | Error::InvalidAscii { offset }
            | Error::InvalidUtf16 { offset }
            | Error::CyclicReference { offset, .. }
            | Error::MaxDepthExceeded { offset }
            | Error::MaxContainerSizeExceeded { offset }
            | Error::MaxDecodedObjectsExceeded { offset } => Some(*offset),
            Error::OffsetTableOutOfBounds { offset } | Error::OffsetOutOfRange { offset, .. } => {
                usize::try_from(*offset).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotBinaryFormat => write!(f, "not a binary plist"),
            Error::TooShort { len } => write!(f, "input too short: {len} bytes"),
            Error::InvalidTrailer(msg) => write!(f, "invalid trailer: {msg}"),
            Error::OffsetTableOutOfBounds { offset } => {
                write!(f, "offset table at {offset} does not fit in input")
            }
            Error::OffsetOutOfRange { object, offset } => {
                write!(f, "object {object} has out-of-range offset {offset}")
            }
            Error::ObjectRefOutOfRange {
                reference,
                count,
                offset,
            } => write!(
                f,
                "object reference {reference} at offset {offset} exceeds object count {count}"
            ),
            Error::Truncated { offset } => write!(f, "unexpected end of input at offset {offset}"),
            Error::InvalidMarker { marker, offset } => {
                write!(f, "invalid object marker 0x{marker:02x} at offset {offset}")
            }
            Error::InvalidLength { offset } => write!(f, "invalid length at offset {offset}"),
            Error::IntegerTooWide { width, offset } => {
                write!(f, "{width}-byte integer at offset {offset} is wider than 16 bytes")
            }
            Error::UnsupportedRealWidth { width, offset } => {
                write!(f, "unsupported {width}-byte real at offset {offset}")
            }
            Error::InvalidDate { offset } => write!(f, "invalid date at offset {offset}"),
            Error::InvalidAscii { offset } => write!(f, "non-ASCII string data at offset {offset}"),
            Error::InvalidUtf16 { offset } => write!(f, "invalid UTF-16 string at offset {offset}"),
            Error::CyclicReference { object, offset } => {
                write!(f, "object {object} at offset {offset} contains itself")
            }
            Error::MaxDepthExceeded { offset } => {
                write!(f, "maximum nesting depth exceeded at offset {offset}")
            }
            Error::MaxContainerSizeExceeded { offset } => {
                write!(f, "maximum container size exceeded at offset {offset}")
            }
            Error::MaxDecodedObjectsExceeded { offset } => {
                write!(f, "maximum decoded object count exceeded at offset {offset}")
            }
            Error::MaxDocumentSizeExceeded => write!(f, "maximum document size exceeded"),
            Error::MaxObjectCountExceeded => write!(f, "maximum object count exceeded"),
            Error::Io(msg) => write!(f, "I/O error: {msg}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
