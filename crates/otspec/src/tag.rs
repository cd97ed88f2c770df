//! OpenType tags.

use crate::{DeserializationError, Deserialize, ReaderContext};
use std::{borrow::Borrow, str::FromStr};

/// An OpenType tag.
///
/// On the wire a tag is any four bytes; well-formed tags are printable
/// ascii (0x20..=0x7E), padded with spaces. Tags read from a font are kept
/// byte for byte, while tags built from strings are validated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; 4]);

impl Tag {
    /// Create a tag from a raw byte array, without validation.
    pub const fn new(raw: &[u8; 4]) -> Self {
        Tag(*raw)
    }

    /// Attempt to create a `Tag` from raw bytes.
    ///
    /// The argument may be a slice of bytes, a `&str`, or any other type that
    /// impls `AsRef<[u8]>`.
    ///
    /// The slice must contain between 1 and 4 characters, each in the printable
    /// ascii range (`0x20..=0x7E`).
    ///
    /// If the input has fewer than four bytes, spaces will be appended.
    pub fn from_raw(src: impl AsRef<[u8]>) -> Result<Self, InvalidTag> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > 4 {
            return Err(InvalidTag::InvalidLength(src.len()));
        }
        if let Some(pos) = src.iter().position(|b| !(0x20..=0x7E).contains(b)) {
            let byte = src[pos];

            return Err(InvalidTag::InvalidByte { pos, byte });
        }
        let mut out = [b' '; 4];
        out[..src.len()].copy_from_slice(src);
        Ok(Tag(out))
    }

    /// This tag as raw bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// This tag as a `&str`, if it is valid utf-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Whether every byte is printable ascii.
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| (0x20..=0x7E).contains(b))
    }
}

/// An error representing an invalid tag.
#[derive(Clone, PartialEq, Eq)]
pub enum InvalidTag {
    InvalidLength(usize),
    InvalidByte { pos: usize, byte: u8 },
}

impl FromStr for Tag {
    type Err = InvalidTag;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        Tag::from_raw(src)
    }
}

impl Borrow<[u8; 4]> for Tag {
    fn borrow(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Tag {
    fn from(raw: [u8; 4]) -> Self {
        Tag(raw)
    }
}

impl PartialEq<[u8; 4]> for Tag {
    fn eq(&self, other: &[u8; 4]) -> bool {
        &self.0 == other
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        other.as_bytes() == &self.0[..]
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Deserialize for Tag {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
        let bytes = c.consume(4)?;
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(bytes);
        Ok(Tag(raw))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for &b in &self.0 {
            if (0x20..=0x7E).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "'{}'", self)
    }
}

impl std::fmt::Display for InvalidTag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::InvalidLength(len) => write!(f, "length {} not in accepted range (1..=4)", len),
            Self::InvalidByte { pos, byte } => {
                write!(f, "invalid byte '0x{:02X}' at position {}", byte, pos)
            }
        }
    }
}

impl std::fmt::Debug for InvalidTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength(arg0) => f.debug_tuple("InvalidLength").field(arg0).finish(),
            Self::InvalidByte { pos, byte } => f
                .debug_struct("InvalidByte")
                .field("pos", pos)
                .field("byte", &format!("{:02X}", byte))
                .finish(),
        }
    }
}

impl std::error::Error for InvalidTag {}
