//! Low-level reading machinery for OpenType binary structures.
//!
//! This crate is used by the `otlayout` crate. It knows how to pull
//! big-endian scalars out of a byte source, follow 16-bit offsets relative to
//! the table that declares them, and decode declarative table layouts
//! ([`schema::Schema`]) into ordered [`schema::Record`]s.
#![allow(non_camel_case_types)]
#[macro_use]
extern crate shrinkwraprs;

use std::mem;

mod error;
pub mod offsets;
pub mod packed;
pub mod schema;
pub mod tag;
pub mod types;

pub use crate::error::{DeserializationError, OffsetProblem};
pub use crate::tag::Tag;
use crate::types::uint16;

/// How many offsets may be nested inside one another before the reader gives up.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
struct Frame {
    table: &'static str,
    base: usize,
    field: &'static str,
}

/// A cursor over a font's bytes.
///
/// Besides the read position, the context keeps a stack of the tables
/// currently being decoded. The top of that stack supplies the base that
/// offsets are measured from, and the table and field names used in error
/// messages. It also remembers which tables are being resolved along the
/// current chain of offsets, so that malicious data cannot make the decoder
/// recurse forever.
pub struct ReaderContext<'a> {
    input: &'a [u8],
    pub ptr: usize,
    frames: Vec<Frame>,
    resolving: Vec<(&'static str, usize)>,
    max_depth: usize,
}

impl<'a> ReaderContext<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        ReaderContext {
            input,
            ptr: 0,
            frames: vec![Frame {
                table: "<source>",
                base: 0,
                field: "",
            }],
            resolving: vec![],
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Start reading at an absolute position within `input`.
    pub fn at(input: &'a [u8], ptr: usize) -> Self {
        let mut rc = ReaderContext::new(input);
        rc.ptr = ptr;
        rc
    }

    /// Limit how many offsets may be followed inside one another.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub(crate) fn consume(&mut self, bytes: usize) -> Result<&'a [u8], DeserializationError> {
        let available = self.input.len().saturating_sub(self.ptr);
        if bytes > available {
            Err(DeserializationError::TruncatedSource {
                table: self.table_name(),
                field: self.field_name(),
                offset: self.ptr,
                needed: bytes,
                available,
            })
        } else {
            let input = self.input;
            let subslice = &input[self.ptr..self.ptr + bytes];
            self.ptr += bytes;
            Ok(subslice)
        }
    }

    /// Mark the current position as the start of a new table.
    pub fn push(&mut self, table: &'static str) {
        self.frames.push(Frame {
            table,
            base: self.ptr,
            field: "",
        });
    }

    /// Enter a record embedded in the current table. Offsets inside it stay
    /// relative to the enclosing table.
    pub fn push_embedded(&mut self, table: &'static str) {
        let base = self.top_of_table();
        self.frames.push(Frame {
            table,
            base,
            field: "",
        });
    }

    /// Run `f` inside a table starting at the current position, leaving the
    /// table stack as it was whether or not `f` succeeds.
    pub fn table<T, F>(&mut self, table: &'static str, f: F) -> Result<T, DeserializationError>
    where
        F: FnOnce(&mut Self) -> Result<T, DeserializationError>,
    {
        let depth = self.frames.len();
        self.push(table);
        let result = f(self);
        self.frames.truncate(depth);
        result
    }

    /// Like [`ReaderContext::table`], for a record embedded in its parent.
    pub fn embedded<T, F>(&mut self, table: &'static str, f: F) -> Result<T, DeserializationError>
    where
        F: FnOnce(&mut Self) -> Result<T, DeserializationError>,
    {
        let depth = self.frames.len();
        self.push_embedded(table);
        let result = f(self);
        self.frames.truncate(depth);
        result
    }

    /// The base position offsets in the current table are measured from.
    pub fn top_of_table(&self) -> usize {
        self.frames.last().map_or(0, |f| f.base)
    }

    pub fn table_name(&self) -> &'static str {
        self.frames.last().map_or("<source>", |f| f.table)
    }

    pub fn field_name(&self) -> &'static str {
        self.frames.last().map_or("", |f| f.field)
    }

    /// Record which field of the current table is being decoded.
    pub fn set_field(&mut self, field: &'static str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.field = field;
        }
    }

    /// Build a `MalformedOffset` error for the field currently being read.
    pub fn offset_error(
        &self,
        base: usize,
        displacement: uint16,
        problem: OffsetProblem,
    ) -> DeserializationError {
        DeserializationError::MalformedOffset {
            table: self.table_name(),
            field: self.field_name(),
            base,
            displacement,
            target: base + displacement as usize,
            problem,
        }
    }

    /// Decode the table `table` found `displacement` bytes after `base`.
    ///
    /// The read position is restored afterwards, so the caller carries on
    /// with its own fields. Fails with `MalformedOffset` if the target is out
    /// of bounds, is already being decoded on the current path, or would nest
    /// deeper than the configured limit.
    pub fn follow<T, F>(
        &mut self,
        table: &'static str,
        base: usize,
        displacement: uint16,
        f: F,
    ) -> Result<T, DeserializationError>
    where
        F: FnOnce(&mut Self) -> Result<T, DeserializationError>,
    {
        let target = base + displacement as usize;
        let problem = if target >= self.input.len() {
            Some(OffsetProblem::OutOfBounds {
                len: self.input.len(),
            })
        } else if self.resolving.contains(&(table, target)) {
            Some(OffsetProblem::Cycle)
        } else if self.resolving.len() >= self.max_depth {
            Some(OffsetProblem::TooDeep {
                limit: self.max_depth,
            })
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(self.offset_error(base, displacement, problem));
        }
        log::trace!(
            "{}.{}: following offset {} from {} to {} at {}",
            self.table_name(),
            self.field_name(),
            displacement,
            base,
            table,
            target
        );
        let saved_ptr = self.ptr;
        let saved_frames = self.frames.len();
        self.resolving.push((table, target));
        self.ptr = target;
        let result = f(self);
        self.resolving.pop();
        self.frames.truncate(saved_frames);
        self.ptr = saved_ptr;
        result
    }
}

pub trait Deserializer<T>
where
    T: Deserialize,
{
    fn de(&mut self) -> Result<T, DeserializationError>;
}

impl<'a, T> Deserializer<T> for ReaderContext<'a>
where
    T: Deserialize,
{
    fn de(&mut self) -> Result<T, DeserializationError> {
        T::from_bytes(self)
    }
}

pub trait Deserialize {
    fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError>
    where
        Self: std::marker::Sized;
}

macro_rules! deserialize_primitive {
    ($t: ty) => {
        impl Deserialize for $t {
            fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
                let bytes: &[u8] = c.consume(mem::size_of::<$t>())?;
                let mut bytes_array = [0_u8; mem::size_of::<$t>()];
                bytes_array.copy_from_slice(bytes);
                Ok(<$t>::from_be_bytes(bytes_array))
            }
        }
    };
}

deserialize_primitive!(u16);
deserialize_primitive!(u32);
deserialize_primitive!(i32);

/* Provide a serde-style interface */
pub mod de {
    pub use crate::{DeserializationError, Deserialize, Deserializer, ReaderContext};
    pub fn from_bytes<T: Deserialize>(data: &[u8]) -> Result<T, DeserializationError> {
        let mut rc = ReaderContext::new(data);
        rc.de()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn de_primitive() {
        let data = [0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x04];
        let mut rc = ReaderContext::new(&data);
        let first: u16 = rc.de().unwrap();
        let second: u16 = rc.de().unwrap();
        let third: u32 = rc.de().unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(third, 4);
        assert_eq!(rc.ptr, 8);
    }

    #[test]
    fn de_tag() {
        let t: Tag = de::from_bytes(&[0x47, 0x53, 0x55, 0x42]).unwrap();
        assert_eq!(t, "GSUB");
    }

    #[test]
    fn truncated_read_reports_position() {
        let data = [0x00, 0x01, 0x00];
        let mut rc = ReaderContext::new(&data);
        rc.push("Thing");
        rc.set_field("second");
        let _: u16 = rc.de().unwrap();
        let err = Deserializer::<u16>::de(&mut rc).unwrap_err();
        assert_eq!(
            err,
            DeserializationError::TruncatedSource {
                table: "Thing",
                field: "second",
                offset: 2,
                needed: 2,
                available: 1,
            }
        );
        // a failed read does not move the cursor
        assert_eq!(rc.ptr, 2);
    }

    #[test]
    fn follow_restores_position_and_tables() {
        let data = [0x00, 0x04, 0xff, 0xff, 0x00, 0x2a];
        let mut rc = ReaderContext::new(&data);
        rc.push("Outer");
        let off: u16 = rc.de().unwrap();
        let inner: u16 = rc
            .follow("Inner", rc.top_of_table(), off, |c| {
                c.push("Inner");
                assert_eq!(c.top_of_table(), 4);
                c.de()
            })
            .unwrap();
        assert_eq!(inner, 0x2a);
        assert_eq!(rc.ptr, 2);
        assert_eq!(rc.table_name(), "Outer");
        assert_eq!(rc.top_of_table(), 0);
    }

    #[test]
    fn follow_out_of_bounds() {
        let data = [0x00, 0x10];
        let mut rc = ReaderContext::new(&data);
        let err = rc
            .follow("Missing", 0, 0x10, |c| Deserializer::<u16>::de(c))
            .unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::MalformedOffset {
                target: 16,
                problem: OffsetProblem::OutOfBounds { len: 2 },
                ..
            }
        ));
    }

    struct Loop;

    impl Deserialize for Loop {
        fn from_bytes(c: &mut ReaderContext<'_>) -> Result<Self, DeserializationError> {
            // Always jumps to the same absolute position.
            c.follow("Loop", 0, 2, Loop::from_bytes)
        }
    }

    #[test]
    fn cycles_are_rejected() {
        let data = [0x00, 0x00, 0x00, 0x00];
        let err = de::from_bytes::<Loop>(&data).err().unwrap();
        assert!(matches!(
            err,
            DeserializationError::MalformedOffset {
                problem: OffsetProblem::Cycle,
                target: 2,
                ..
            }
        ));
    }

    #[test]
    fn depth_is_bounded() {
        // Each step moves two bytes further on, so no position repeats.
        fn step(c: &mut ReaderContext<'_>) -> Result<u16, DeserializationError> {
            let here = c.ptr;
            c.follow("Step", here, 2, step)
        }
        let data = vec![0_u8; 200];
        let mut rc = ReaderContext::new(&data).with_max_depth(10);
        let err = step(&mut rc).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::MalformedOffset {
                problem: OffsetProblem::TooDeep { limit: 10 },
                ..
            }
        ));
    }
}
